use std::future::Future;

use futures::{Stream, StreamExt};
use log::{debug, info, warn};
use tokio::{
    sync::mpsc::UnboundedReceiver,
    time::{interval_at, Instant, MissedTickBehavior},
};

use crate::config::schedule::RenewSchedule;
use crate::cups_client::Spooler;
use crate::launcher::SettingsLauncher;
use crate::notifier::events::SpoolerEvent;
use crate::notifier::subscription::SubscriptionLease;
use crate::publisher::{AlertSink, MenuPublisher};
use crate::state::alerts::{reason_messages, AlertDeduplicator};
use crate::state::menu::{rebuild_header, rebuild_printers_section, Activation, MenuModel, Profile, PRINTERS_SECTION};
use crate::state::reconciler::{ReconciliationResult, StateReconciler};

/// Owns the printer state and keeps the published menu in line with it.
///
/// Everything runs on the thread driving [`IndicatorService::run`].
pub struct IndicatorService<S: Spooler> {
    spooler: S,
    reconciler: StateReconciler,
    deduplicator: AlertDeduplicator,
    model: MenuModel,
    lease: SubscriptionLease,
    publisher: Box<dyn MenuPublisher>,
    alerts: Option<Box<dyn AlertSink>>,
    launcher: Box<dyn SettingsLauncher>,
}

impl<S: Spooler> IndicatorService<S> {
    pub fn new(
        spooler: S,
        schedule: RenewSchedule,
        publisher: Box<dyn MenuPublisher>,
        alerts: Option<Box<dyn AlertSink>>,
        launcher: Box<dyn SettingsLauncher>,
    ) -> Self {
        Self {
            spooler,
            reconciler: StateReconciler::default(),
            deduplicator: AlertDeduplicator::new(reason_messages()),
            model: MenuModel::new(),
            lease: SubscriptionLease::new(schedule),
            publisher,
            alerts,
            launcher,
        }
    }

    /// Subscribes to the spooler and publishes the initial menu.
    pub fn start(&mut self) {
        self.lease.create(&self.spooler);
        self.reconciler.rescan(&self.spooler);
        self.rebuild_menu();
    }

    pub fn handle_event(&mut self, event: SpoolerEvent) {
        debug!("Handling {event:?}");
        let result = match event {
            SpoolerEvent::PrinterStateChanged { printer, state, state_reasons } => {
                let result = self.reconciler.observe(&self.spooler, &printer, state, &state_reasons);
                if let Some(alerts) = self.alerts.as_mut() {
                    for alert in self.deduplicator.process(&self.spooler, &printer, &state_reasons) {
                        alerts.alert(&alert);
                    }
                }
                result
            }
            // The printer named by these isn't reliable, look at all of them.
            SpoolerEvent::JobChanged { job_id, job_state, .. } if job_state.is_terminal() => {
                debug!("Job {job_id} ended, rescanning all printers");
                self.reconciler.rescan(&self.spooler)
            }
            SpoolerEvent::JobChanged { printer, printer_state, printer_state_reasons, .. } => {
                self.reconciler.observe(&self.spooler, &printer, printer_state, &printer_state_reasons)
            }
            SpoolerEvent::RegistryChanged => self.reconciler.rescan(&self.spooler),
        };
        self.apply(result);
    }

    pub fn handle_activation(&mut self, activation: Activation) {
        match activation {
            Activation::Printer(printer) => self.launcher.open_settings(Some(&printer)),
            Activation::Settings => self.launcher.open_settings(None),
        }
    }

    pub fn renew_subscription(&mut self) {
        self.lease.renew(&self.spooler);
        if let Some(expiry) = self.lease.expires_at() {
            debug!("Subscription {} expires at {expiry}", self.lease.id());
        }
    }

    /// Cancels the subscription and takes the menu off the bus.
    pub fn shutdown(&mut self) {
        self.lease.cancel(&self.spooler);
        self.publisher.unpublish();
    }

    fn apply(&mut self, result: ReconciliationResult) {
        if result.any_changed() {
            debug!("Changed printers: {:?}", result.changed_printers().collect::<Vec<_>>());
            self.rebuild_menu();
        } else {
            self.refresh_header();
        }
    }

    fn rebuild_menu(&mut self) {
        let (section, _any_visible) = rebuild_printers_section(&self.reconciler);
        for profile in Profile::ALL {
            let Some(handle) = self.model.replace_section(profile, PRINTERS_SECTION, section.clone()) else {
                continue;
            };
            if let Some(published) = self.model.section(handle) {
                self.publisher.replace_section(profile, PRINTERS_SECTION, published);
            }
        }
        self.refresh_header();
    }

    fn refresh_header(&mut self) {
        let header = rebuild_header(self.reconciler.any_visible());
        self.model.set_header(header.clone());
        self.publisher.update_header(&header);
    }

    /// Runs until `shutdown` resolves or the spooler stops sending events.
    pub async fn run<E, F>(mut self, events: E, mut activations: UnboundedReceiver<Activation>, shutdown: F)
    where
        E: Stream<Item = SpoolerEvent>,
        F: Future<Output = ()>,
    {
        tokio::pin!(events);
        tokio::pin!(shutdown);

        self.start();

        let period = self.lease.schedule().period();
        let mut renewal = interval_at(Instant::now() + period, period);
        renewal.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        warn!("Spooler notifications ended");
                        break;
                    }
                },
                Some(activation) = activations.recv() => self.handle_activation(activation),
                _ = renewal.tick() => self.renew_subscription(),
                () = &mut shutdown => {
                    info!("Shutting down");
                    break;
                }
            }
        }

        self.shutdown();
    }
}
