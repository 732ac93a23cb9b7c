//! In-memory stand-ins for the spooler and the outer surfaces.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::cups_client::models::{Destination, StateCode};
use crate::cups_client::{Spooler, SpoolerError};
use crate::launcher::SettingsLauncher;
use crate::publisher::{AlertSink, MenuPublisher};
use crate::state::alerts::Alert;
use crate::state::menu::{HeaderState, Profile, Section};

#[derive(Debug, Clone, Default)]
pub struct SpoolerCalls {
    pub listed: usize,
    pub counted: Vec<String>,
    pub created: Vec<i32>,
    pub renewed: Vec<i32>,
    pub cancelled: Vec<i32>,
}

#[derive(Debug, Default)]
pub struct FakeSpooler {
    destinations: RefCell<Vec<Destination>>,
    jobs: RefCell<HashMap<String, u32>>,
    fail_listing: Cell<bool>,
    fail_subscriptions: Cell<bool>,
    fail_renewals: Cell<bool>,
    last_subscription: Cell<i32>,
    calls: RefCell<SpoolerCalls>,
}

impl FakeSpooler {
    pub fn with_printer(self, name: &str, state: StateCode, state_reasons: &str, jobs: u32) -> Self {
        self.set_printer(name, state, state_reasons, jobs);
        self
    }

    pub fn set_printer(&self, name: &str, state: StateCode, state_reasons: &str, jobs: u32) {
        let mut destinations = self.destinations.borrow_mut();
        destinations.retain(|destination| destination.name != name);
        destinations.push(Destination::new(name, state, state_reasons));
        self.jobs.borrow_mut().insert(name.to_string(), jobs);
    }

    pub fn set_jobs(&self, name: &str, jobs: u32) {
        self.jobs.borrow_mut().insert(name.to_string(), jobs);
    }

    pub fn remove_printer(&self, name: &str) {
        self.destinations.borrow_mut().retain(|destination| destination.name != name);
        self.jobs.borrow_mut().remove(name);
    }

    pub fn fail_listing(&self, fail: bool) {
        self.fail_listing.set(fail);
    }

    pub fn fail_subscriptions(&self, fail: bool) {
        self.fail_subscriptions.set(fail);
    }

    pub fn fail_renewals(&self, fail: bool) {
        self.fail_renewals.set(fail);
    }

    pub fn calls(&self) -> SpoolerCalls {
        self.calls.borrow().clone()
    }
}

fn fake_failure(what: &str) -> SpoolerError {
    SpoolerError::Whatever { message: format!("fake {what} failure"), source: None }
}

impl Spooler for FakeSpooler {
    fn list_destinations(&self) -> Result<Vec<Destination>, SpoolerError> {
        self.calls.borrow_mut().listed += 1;
        if self.fail_listing.get() {
            return Err(fake_failure("listing"));
        }
        Ok(self.destinations.borrow().clone())
    }

    fn count_active_jobs(&self, printer: &str) -> Result<u32, SpoolerError> {
        self.calls.borrow_mut().counted.push(printer.to_string());
        self.jobs
            .borrow()
            .get(printer)
            .copied()
            .ok_or_else(|| SpoolerError::UnknownPrinter { printer: printer.to_string() })
    }

    fn create_subscription(&self, lease_seconds: i32) -> Result<i32, SpoolerError> {
        self.calls.borrow_mut().created.push(lease_seconds);
        if self.fail_subscriptions.get() {
            return Err(fake_failure("subscription"));
        }
        self.last_subscription.set(self.last_subscription.get() + 1);
        Ok(self.last_subscription.get())
    }

    fn renew_subscription(&self, id: i32, _lease_seconds: i32) -> Result<(), SpoolerError> {
        self.calls.borrow_mut().renewed.push(id);
        if self.fail_renewals.get() {
            return Err(fake_failure("renewal"));
        }
        Ok(())
    }

    fn cancel_subscription(&self, id: i32) -> Result<(), SpoolerError> {
        self.calls.borrow_mut().cancelled.push(id);
        Ok(())
    }
}

impl<T: Spooler> Spooler for Rc<T> {
    fn list_destinations(&self) -> Result<Vec<Destination>, SpoolerError> {
        (**self).list_destinations()
    }

    fn count_active_jobs(&self, printer: &str) -> Result<u32, SpoolerError> {
        (**self).count_active_jobs(printer)
    }

    fn create_subscription(&self, lease_seconds: i32) -> Result<i32, SpoolerError> {
        (**self).create_subscription(lease_seconds)
    }

    fn renew_subscription(&self, id: i32, lease_seconds: i32) -> Result<(), SpoolerError> {
        (**self).renew_subscription(id, lease_seconds)
    }

    fn cancel_subscription(&self, id: i32) -> Result<(), SpoolerError> {
        (**self).cancel_subscription(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Published {
    Section(Profile, usize, Section),
    Header(HeaderState),
    Unpublished,
}

/// Records everything handed to the outer surfaces.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    pub published: Rc<RefCell<Vec<Published>>>,
    pub alerts: Rc<RefCell<Vec<Alert>>>,
    pub launched: Rc<RefCell<Vec<Option<String>>>>,
}

impl Recorder {
    pub fn last_header(&self) -> Option<HeaderState> {
        self.published.borrow().iter().rev().find_map(|published| match published {
            Published::Header(header) => Some(header.clone()),
            _ => None,
        })
    }

    pub fn last_section(&self, profile: Profile) -> Option<Section> {
        self.published.borrow().iter().rev().find_map(|published| match published {
            Published::Section(p, _, section) if *p == profile => Some(section.clone()),
            _ => None,
        })
    }

    pub fn section_updates(&self) -> usize {
        self.published.borrow().iter().filter(|published| matches!(published, Published::Section(..))).count()
    }
}

impl MenuPublisher for Recorder {
    fn replace_section(&mut self, profile: Profile, position: usize, section: &Section) {
        self.published.borrow_mut().push(Published::Section(profile, position, section.clone()));
    }

    fn update_header(&mut self, header: &HeaderState) {
        self.published.borrow_mut().push(Published::Header(header.clone()));
    }

    fn unpublish(&mut self) {
        self.published.borrow_mut().push(Published::Unpublished);
    }
}

impl AlertSink for Recorder {
    fn alert(&mut self, alert: &Alert) {
        self.alerts.borrow_mut().push(alert.clone());
    }
}

impl SettingsLauncher for Recorder {
    fn open_settings(&mut self, printer: Option<&str>) {
        self.launched.borrow_mut().push(printer.map(str::to_string));
    }
}
