use std::time::Duration;

use chrono::{DateTime, Local};
use snafu::{ensure, Snafu};

use super::models::Subscription;

/// Smallest renewal period we accept, so a tiny lease can't spin the event loop.
const MIN_RENEW_PERIOD: Duration = Duration::from_secs(5);

/// When to renew a subscription lease of a given duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewSchedule {
    lease: Duration,
    period: Duration,
}

impl RenewSchedule {
    pub fn new(lease: Duration, renew_margin: Duration) -> Result<Self, ScheduleError> {
        ensure!(!lease.is_zero(), ZeroLeaseSnafu);
        ensure!(renew_margin < lease, MarginTooLargeSnafu { lease, renew_margin });

        let period = (lease - renew_margin).max(MIN_RENEW_PERIOD);
        Ok(Self { lease, period })
    }

    pub fn from_settings(settings: &Subscription) -> Result<Self, ScheduleError> {
        Self::new(settings.lease, settings.renew_margin)
    }

    /// Time between two renewals.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Lease duration as sent to the spooler, in whole seconds.
    pub fn lease_seconds(&self) -> i32 {
        i32::try_from(self.lease.as_secs()).unwrap_or(i32::MAX)
    }

    pub fn expiry_from(&self, start: DateTime<Local>) -> Option<DateTime<Local>> {
        chrono::Duration::from_std(self.lease).ok().and_then(|lease| start.checked_add_signed(lease))
    }
}

// ////// //
// Errors //
// ////// //

#[derive(Debug, Snafu)]
pub enum ScheduleError {
    #[snafu(display("Subscription lease must not be zero"))]
    ZeroLease,
    #[snafu(display("Renew margin {} must be shorter than the lease {}", humantime::format_duration(*renew_margin), humantime::format_duration(*lease)))]
    MarginTooLarge { lease: Duration, renew_margin: Duration },
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn renews_one_margin_before_expiry() {
        let schedule = RenewSchedule::new(Duration::from_secs(900), Duration::from_secs(60)).unwrap();
        assert_eq!(schedule.period(), Duration::from_secs(840));
        assert_eq!(schedule.lease_seconds(), 900);
    }

    #[test]
    fn period_has_a_floor() {
        let schedule = RenewSchedule::new(Duration::from_secs(10), Duration::from_secs(8)).unwrap();
        assert_eq!(schedule.period(), MIN_RENEW_PERIOD);
    }

    #[test]
    fn rejects_bad_leases() {
        assert!(matches!(RenewSchedule::new(Duration::ZERO, Duration::ZERO), Err(ScheduleError::ZeroLease)));
        assert!(matches!(
            RenewSchedule::new(Duration::from_secs(60), Duration::from_secs(60)),
            Err(ScheduleError::MarginTooLarge { .. })
        ));
    }

    #[test]
    fn expiry_is_start_plus_lease() {
        let schedule = RenewSchedule::new(Duration::from_secs(900), Duration::from_secs(60)).unwrap();
        let start = Local.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(schedule.expiry_from(start), Local.with_ymd_and_hms(2024, 3, 1, 12, 15, 0).single());
    }
}
