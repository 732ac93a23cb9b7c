use std::collections::BTreeMap;

use log::{debug, warn};
use serde_derive::Serialize;

use crate::cups_client::models::{split_state_reasons, Destination, StateCode};
use crate::cups_client::Spooler;

/// What we last saw of one printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrinterRecord {
    pub name: String,
    pub state: StateCode,
    pub active_jobs: u32,
    pub state_reasons: Vec<String>,
}

impl PrinterRecord {
    /// Printers only show up in the menu while the user has jobs queued on them.
    pub fn is_visible(&self) -> bool {
        self.active_jobs > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterChange {
    pub printer: String,
    pub changed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationResult {
    pub changes: Vec<PrinterChange>,
}

impl ReconciliationResult {
    pub fn any_changed(&self) -> bool {
        self.changes.iter().any(|change| change.changed)
    }

    pub fn changed_printers(&self) -> impl Iterator<Item = &str> {
        self.changes.iter().filter(|change| change.changed).map(|change| change.printer.as_str())
    }
}

/// Canonical printer name to state mapping, kept in line with the spooler.
#[derive(Debug, Default)]
pub struct StateReconciler {
    printers: BTreeMap<String, PrinterRecord>,
}

impl StateReconciler {
    /// Applies a state change reported for a single printer.
    ///
    /// The job count is always asked from the spooler, event payloads don't carry a reliable one.
    /// Printers the spooler doesn't know are left alone.
    pub fn observe(&mut self, spooler: &impl Spooler, printer: &str, state: StateCode, state_reasons: &str) -> ReconciliationResult {
        if printer.is_empty() {
            warn!("Ignoring state change for a printer without name");
            return ReconciliationResult::default();
        }

        let active_jobs = match spooler.count_active_jobs(printer) {
            Ok(count) => count,
            Err(e) => {
                warn!("Ignoring state change for {printer}: {e}");
                return ReconciliationResult::default();
            }
        };

        let record = PrinterRecord {
            name: printer.to_string(),
            state,
            active_jobs,
            state_reasons: split_state_reasons(state_reasons),
        };
        let changed = self.printers.get(printer) != Some(&record);
        debug!("Observed {record:?} (changed: {changed})");
        self.printers.insert(printer.to_string(), record);

        ReconciliationResult { changes: vec![PrinterChange { printer: printer.to_string(), changed }] }
    }

    /// Recomputes every record from a full registry scan.
    ///
    /// Printers that disappeared from the spooler are dropped and reported as changed.
    /// If the spooler can't be listed the previous state is kept.
    pub fn rescan(&mut self, spooler: &impl Spooler) -> ReconciliationResult {
        let destinations = match spooler.list_destinations() {
            Ok(destinations) => destinations,
            Err(e) => {
                warn!("Could not list printers, keeping previous state: {e}");
                return ReconciliationResult::default();
            }
        };

        let mut printers = BTreeMap::new();
        for Destination { name, state, state_reasons } in destinations {
            match spooler.count_active_jobs(&name) {
                Ok(active_jobs) => {
                    let state_reasons = split_state_reasons(&state_reasons);
                    printers.insert(name.clone(), PrinterRecord { name, state, active_jobs, state_reasons });
                }
                Err(e) => debug!("Skipping {name}: {e}"),
            }
        }

        let mut changes: Vec<PrinterChange> = printers
            .values()
            .map(|record| PrinterChange {
                printer: record.name.clone(),
                changed: self.printers.get(&record.name) != Some(record),
            })
            .collect();
        changes.extend(
            self.printers
                .keys()
                .filter(|name| !printers.contains_key(*name))
                .map(|name| PrinterChange { printer: name.clone(), changed: true }),
        );

        self.printers = printers;
        ReconciliationResult { changes }
    }

    #[cfg(test)]
    pub fn get(&self, printer: &str) -> Option<&PrinterRecord> {
        self.printers.get(printer)
    }

    /// All records, ordered by printer name.
    pub fn records(&self) -> impl Iterator<Item = &PrinterRecord> {
        self.printers.values()
    }

    pub fn any_visible(&self) -> bool {
        self.records().any(PrinterRecord::is_visible)
    }
}
