use chrono::{DateTime, Local};
use log::{debug, info, warn};

use crate::config::schedule::RenewSchedule;
use crate::cups_client::Spooler;

/// The spooler subscription that keeps notifier signals coming.
///
/// An id of zero or below means there is no subscription.
#[derive(Debug)]
pub struct SubscriptionLease {
    id: i32,
    expires_at: Option<DateTime<Local>>,
    schedule: RenewSchedule,
}

impl SubscriptionLease {
    pub fn new(schedule: RenewSchedule) -> Self {
        Self { id: 0, expires_at: None, schedule }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.id > 0
    }

    pub fn expires_at(&self) -> Option<DateTime<Local>> {
        self.expires_at
    }

    pub fn schedule(&self) -> &RenewSchedule {
        &self.schedule
    }

    /// Creates a fresh subscription. On failure the lease stays inactive with id 0.
    pub fn create(&mut self, spooler: &impl Spooler) {
        match spooler.create_subscription(self.schedule.lease_seconds()) {
            Ok(id) if id > 0 => {
                info!("Subscribed to spooler notifications with id {id}");
                self.activate(id);
            }
            Ok(id) => {
                warn!("Spooler returned invalid subscription id {id}");
                self.clear();
            }
            Err(e) => {
                warn!("Could not subscribe to spooler notifications: {e}");
                self.clear();
            }
        }
    }

    /// Extends the lease, or creates a new subscription when there is none or the spooler
    /// forgot about ours.
    pub fn renew(&mut self, spooler: &impl Spooler) {
        if !self.is_active() {
            self.create(spooler);
            return;
        }

        match spooler.renew_subscription(self.id, self.schedule.lease_seconds()) {
            Ok(()) => {
                debug!("Renewed subscription {}", self.id);
                self.activate(self.id);
            }
            Err(e) => {
                debug!("Renewing subscription {} failed ({e}), creating a new one", self.id);
                self.create(spooler);
            }
        }
    }

    /// Best effort; does nothing without an active subscription.
    pub fn cancel(&mut self, spooler: &impl Spooler) {
        if !self.is_active() {
            return;
        }

        if let Err(e) = spooler.cancel_subscription(self.id) {
            warn!("Could not cancel subscription {}: {e}", self.id);
        }
        self.clear();
    }

    fn activate(&mut self, id: i32) {
        self.id = id;
        self.expires_at = self.schedule.expiry_from(Local::now());
    }

    fn clear(&mut self) {
        self.id = 0;
        self.expires_at = None;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::FakeSpooler;

    fn lease() -> SubscriptionLease {
        SubscriptionLease::new(RenewSchedule::new(Duration::from_secs(900), Duration::from_secs(60)).unwrap())
    }

    #[test]
    fn create_activates_the_lease() {
        let spooler = FakeSpooler::default();
        let mut lease = lease();
        lease.create(&spooler);

        assert_eq!(lease.id(), 1);
        assert!(lease.expires_at().is_some());
        assert_eq!(spooler.calls().created, vec![900]);
    }

    #[test]
    fn failed_create_leaves_id_zero() {
        let spooler = FakeSpooler::default();
        spooler.fail_subscriptions(true);
        let mut lease = lease();
        lease.create(&spooler);

        assert_eq!(lease.id(), 0);
        assert!(!lease.is_active());
        assert!(lease.expires_at().is_none());
    }

    #[test]
    fn cancel_without_subscription_makes_no_call() {
        let spooler = FakeSpooler::default();
        spooler.fail_subscriptions(true);
        let mut lease = lease();
        lease.create(&spooler);
        lease.cancel(&spooler);

        assert!(spooler.calls().cancelled.is_empty());
    }

    #[test]
    fn cancel_releases_active_subscription() {
        let spooler = FakeSpooler::default();
        let mut lease = lease();
        lease.create(&spooler);
        lease.cancel(&spooler);

        assert_eq!(spooler.calls().cancelled, vec![1]);
        assert_eq!(lease.id(), 0);
    }

    #[test]
    fn renew_keeps_the_id() {
        let spooler = FakeSpooler::default();
        let mut lease = lease();
        lease.create(&spooler);
        lease.renew(&spooler);

        assert_eq!(lease.id(), 1);
        assert_eq!(spooler.calls().renewed, vec![1]);
        assert_eq!(spooler.calls().created.len(), 1);
    }

    #[test]
    fn failed_renew_recreates() {
        let spooler = FakeSpooler::default();
        let mut lease = lease();
        lease.create(&spooler);
        spooler.fail_renewals(true);
        lease.renew(&spooler);

        assert_eq!(lease.id(), 2);
        assert_eq!(spooler.calls().created.len(), 2);
    }

    #[test]
    fn renew_without_subscription_creates() {
        let spooler = FakeSpooler::default();
        let mut lease = lease();
        lease.renew(&spooler);

        assert_eq!(lease.id(), 1);
        assert!(spooler.calls().renewed.is_empty());
    }
}
