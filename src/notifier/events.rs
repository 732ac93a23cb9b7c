use futures::{Stream, StreamExt};
use log::{debug, warn};
use zbus::{message::Type, Connection, MatchRule, Message, MessageStream};

use crate::cups_client::models::{JobState, StateCode};

pub const NOTIFIER_INTERFACE: &str = "org.cups.cupsd.Notifier";
pub const NOTIFIER_PATH: &str = "/org/cups/cupsd/Notifier";

/// text, printer-uri, printer-name, printer-state, printer-state-reasons, printer-is-accepting-jobs
pub type PrinterSignal = (String, String, String, u32, String, bool);

/// The printer part followed by job-id, job-state, job-state-reasons, job-name, job-impressions-completed.
pub type JobSignal = (String, String, String, u32, String, bool, u32, u32, String, String, u32);

/// A change reported by the spooler, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpoolerEvent {
    PrinterStateChanged {
        printer: String,
        state: StateCode,
        state_reasons: String,
    },
    JobChanged {
        printer: String,
        job_id: u32,
        job_state: JobState,
        printer_state: StateCode,
        printer_state_reasons: String,
    },
    /// Printers were added or removed, or the spooler restarted.
    RegistryChanged,
}

impl SpoolerEvent {
    pub fn from_printer_signal(member: &str, (_text, _uri, printer, state, state_reasons, _accepting): PrinterSignal) -> Option<Self> {
        match member {
            "PrinterAdded" | "PrinterDeleted" | "PrinterModified" => Some(SpoolerEvent::RegistryChanged),
            "PrinterStateChanged" | "PrinterRestarted" | "PrinterShutdown" | "PrinterStopped" | "PrinterMediaChanged"
            | "PrinterFinishingsChanged" => Some(SpoolerEvent::PrinterStateChanged {
                printer,
                state: StateCode::from_notifier(state),
                state_reasons,
            }),
            _ => None,
        }
    }

    pub fn from_job_signal(member: &str, signal: JobSignal) -> Option<Self> {
        let (_text, _uri, printer, printer_state, printer_state_reasons, _accepting, job_id, job_state, ..) = signal;
        let job_state = match member {
            // Some spoolers report a stale state on completion.
            "JobCompleted" if !JobState::from_ipp(job_state).is_terminal() => JobState::Completed,
            "JobCreated" | "JobCompleted" | "JobStopped" | "JobConfigChanged" | "JobProgress" | "JobState" => JobState::from_ipp(job_state),
            _ => return None,
        };
        Some(SpoolerEvent::JobChanged {
            printer,
            job_id,
            job_state,
            printer_state: StateCode::from_notifier(printer_state),
            printer_state_reasons,
        })
    }

    fn from_message(msg: &Message) -> Option<Self> {
        let header = msg.header();
        let member = header.member()?.as_str();
        let body = msg.body();

        let event = if member.starts_with("Printer") {
            body.deserialize::<PrinterSignal>().map(|signal| Self::from_printer_signal(member, signal))
        } else if member.starts_with("Job") {
            body.deserialize::<JobSignal>().map(|signal| Self::from_job_signal(member, signal))
        } else if member.starts_with("Server") {
            Ok(Some(SpoolerEvent::RegistryChanged))
        } else {
            Ok(None)
        };

        match event {
            Ok(event) => event,
            Err(e) => {
                warn!("Cannot parse {member} signal args: {e}");
                None
            }
        }
    }
}

/// Subscribes to the spooler's notifier signals on `connection`.
pub async fn spooler_events(connection: &Connection) -> zbus::Result<impl Stream<Item = SpoolerEvent>> {
    let rule = MatchRule::builder()
        .msg_type(Type::Signal)
        .interface(NOTIFIER_INTERFACE)?
        .path(NOTIFIER_PATH)?
        .build();
    let messages = MessageStream::for_match_rule(rule, connection, None).await?;

    Ok(messages.filter_map(|msg| async move {
        match msg {
            Ok(msg) => {
                let event = SpoolerEvent::from_message(&msg);
                debug!("Spooler event: {event:?}");
                event
            }
            Err(e) => {
                warn!("Broken notifier message: {e}");
                None
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn printer_signal(printer: &str, state: u32, reasons: &str) -> PrinterSignal {
        ("".into(), "ipp://localhost/printers/x".into(), printer.into(), state, reasons.into(), true)
    }

    fn job_signal(printer: &str, job_state: u32) -> JobSignal {
        ("".into(), "".into(), printer.into(), 4, "none".into(), true, 17, job_state, "".into(), "report.pdf".into(), 0)
    }

    #[test]
    fn decodes_printer_state_changes() {
        let event = SpoolerEvent::from_printer_signal("PrinterStateChanged", printer_signal("kitchen", 5, "toner-low"));
        assert_eq!(
            event,
            Some(SpoolerEvent::PrinterStateChanged {
                printer: "kitchen".into(),
                state: StateCode::Stopped,
                state_reasons: "toner-low".into(),
            })
        );
    }

    #[test]
    fn added_and_deleted_printers_change_the_registry() {
        for member in ["PrinterAdded", "PrinterDeleted", "PrinterModified"] {
            assert_eq!(SpoolerEvent::from_printer_signal(member, printer_signal("kitchen", 3, "")), Some(SpoolerEvent::RegistryChanged));
        }
    }

    #[test]
    fn job_completed_is_always_terminal() {
        let event = SpoolerEvent::from_job_signal("JobCompleted", job_signal("kitchen", 5)).unwrap();
        assert!(matches!(event, SpoolerEvent::JobChanged { job_state: JobState::Completed, .. }));

        let event = SpoolerEvent::from_job_signal("JobState", job_signal("kitchen", 8)).unwrap();
        assert!(matches!(event, SpoolerEvent::JobChanged { job_state: JobState::Aborted, job_id: 17, .. }));
    }

    #[test]
    fn ignores_unknown_members() {
        assert_eq!(SpoolerEvent::from_printer_signal("PrinterExploded", printer_signal("kitchen", 3, "")), None);
        assert_eq!(SpoolerEvent::from_job_signal("JobTeleported", job_signal("kitchen", 3)), None);
    }
}
