use std::collections::HashMap;
use std::sync::OnceLock;

use log::{debug, warn};

use crate::cups_client::models::split_state_reasons;
use crate::cups_client::Spooler;

pub const ALERT_TITLE: &str = "Printing Problem";
pub const ALERT_ICON: &str = "printer";

/// State reason to user visible message, `{printer}` is replaced by the printer name.
pub struct ReasonMessages {
    messages: HashMap<&'static str, &'static str>,
}

impl ReasonMessages {
    fn new() -> Self {
        let messages = HashMap::from([
            ("media-low", "The printer “{printer}” is low on paper."),
            ("media-empty", "The printer “{printer}” is out of paper."),
            ("toner-low", "The printer “{printer}” is low on toner."),
            ("toner-empty", "The printer “{printer}” is out of toner."),
            ("cover-open", "A cover is open on the printer “{printer}”."),
            ("door-open", "A door is open on the printer “{printer}”."),
            ("cups-missing-filter", "The printer “{printer}” can’t be used, because required software is missing."),
            ("offline", "The printer “{printer}” is currently off-line."),
        ]);
        Self { messages }
    }

    pub fn message_for(&self, reason: &str, printer: &str) -> Option<String> {
        self.messages.get(reason).map(|template| template.replace("{printer}", printer))
    }
}

pub fn reason_messages() -> &'static ReasonMessages {
    static REASON_MESSAGES: OnceLock<ReasonMessages> = OnceLock::new();
    REASON_MESSAGES.get_or_init(ReasonMessages::new)
}

/// Explanation shown below an alert message.
pub fn queued_jobs_text(job_count: u32) -> String {
    if job_count == 1 {
        "You have 1 job queued to print on this printer.".to_string()
    } else {
        format!("You have {job_count} jobs queued to print on this printer.")
    }
}

/// A printer problem the user should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub printer: String,
    pub reason: String,
    pub message: String,
    pub detail: String,
    pub job_count: u32,
}

/// Remembers which state reasons of each printer were already announced this session.
pub struct AlertDeduplicator {
    notified: HashMap<String, Vec<String>>,
    messages: &'static ReasonMessages,
}

impl AlertDeduplicator {
    pub fn new(messages: &'static ReasonMessages) -> Self {
        Self { notified: HashMap::new(), messages }
    }

    /// Returns the reasons in `new_reasons` that weren't part of the previous snapshot for
    /// `printer`, then makes `new_reasons` the stored snapshot.
    pub fn diff_reasons(&mut self, printer: &str, new_reasons: Vec<String>) -> Vec<String> {
        let introduced = match self.notified.get(printer) {
            Some(known) => new_reasons.iter().filter(|reason| !known.contains(reason)).cloned().collect(),
            None => new_reasons.clone(),
        };
        self.notified.insert(printer.to_string(), new_reasons);
        introduced
    }

    /// Alerts for the reasons of a state change that are new and worth telling about.
    ///
    /// Nothing is announced for printers without queued jobs, their snapshot is still replaced.
    /// Printers the spooler doesn't know are skipped entirely.
    pub fn process(&mut self, spooler: &impl Spooler, printer: &str, state_reasons: &str) -> Vec<Alert> {
        let job_count = match spooler.count_active_jobs(printer) {
            Ok(count) => count,
            Err(e) => {
                warn!("Not checking alerts for {printer}: {e}");
                return Vec::new();
            }
        };

        let reasons = split_state_reasons(state_reasons);
        if job_count == 0 {
            self.notified.insert(printer.to_string(), reasons);
            return Vec::new();
        }

        self.diff_reasons(printer, reasons)
            .into_iter()
            .filter_map(|reason| {
                let Some(message) = self.messages.message_for(&reason, printer) else {
                    debug!("No alert for state reason {reason} of {printer}");
                    return None;
                };
                Some(Alert { printer: printer.to_string(), reason, message, detail: queued_jobs_text(job_count), job_count })
            })
            .collect()
    }

    #[cfg(test)]
    pub fn notified(&self, printer: &str) -> Option<&[String]> {
        self.notified.get(printer).map(Vec::as_slice)
    }
}
