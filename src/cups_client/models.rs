use serde_derive::Serialize;

/// Primary printer state as reported by the spooler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StateCode {
    Idle,
    Processing,
    Stopped,
    Other,
}

impl StateCode {
    /// Maps an IPP `printer-state` enum value.
    pub fn from_ipp(value: i32) -> Self {
        match value {
            3 => StateCode::Idle,
            4 => StateCode::Processing,
            5 => StateCode::Stopped,
            _ => StateCode::Other,
        }
    }

    pub fn from_notifier(value: u32) -> Self {
        i32::try_from(value).map_or(StateCode::Other, StateCode::from_ipp)
    }
}

/// IPP `job-state` values the event loop cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Held,
    Processing,
    Stopped,
    Cancelled,
    Aborted,
    Completed,
    Unknown(u32),
}

impl JobState {
    pub fn from_ipp(value: u32) -> Self {
        match value {
            3 => JobState::Pending,
            4 => JobState::Held,
            5 => JobState::Processing,
            6 => JobState::Stopped,
            7 => JobState::Cancelled,
            8 => JobState::Aborted,
            9 => JobState::Completed,
            other => JobState::Unknown(other),
        }
    }

    /// Events for these states don't reliably name the printer the job ran on.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Cancelled | JobState::Aborted | JobState::Completed)
    }
}

/// A printer known to the spooler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub name: String,
    pub state: StateCode,
    /// Space separated `printer-state-reasons` keywords.
    pub state_reasons: String,
}

impl Destination {
    #[cfg(test)]
    pub fn new(name: impl Into<String>, state: StateCode, state_reasons: impl Into<String>) -> Self {
        Self { name: name.into(), state, state_reasons: state_reasons.into() }
    }
}

/// Splits a raw `printer-state-reasons` string into its keywords, in order and without duplicates.
/// The spooler reports `none` when there is nothing to say.
pub fn split_state_reasons(raw: &str) -> Vec<String> {
    let mut reasons: Vec<String> = Vec::new();
    for token in raw.split_whitespace().filter(|token| *token != "none") {
        if !reasons.iter().any(|known| known == token) {
            reasons.push(token.to_string());
        }
    }
    reasons
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_printer_states() {
        assert_eq!(StateCode::from_ipp(3), StateCode::Idle);
        assert_eq!(StateCode::from_ipp(4), StateCode::Processing);
        assert_eq!(StateCode::from_ipp(5), StateCode::Stopped);
        assert_eq!(StateCode::from_ipp(42), StateCode::Other);
        assert_eq!(StateCode::from_notifier(u32::MAX), StateCode::Other);
    }

    #[test]
    fn only_finished_jobs_are_terminal() {
        for state in [7, 8, 9] {
            assert!(JobState::from_ipp(state).is_terminal());
        }
        for state in [3, 4, 5, 6, 12] {
            assert!(!JobState::from_ipp(state).is_terminal());
        }
    }

    #[test]
    fn splits_reasons() {
        assert_eq!(split_state_reasons("toner-low  cover-open toner-low"), vec!["toner-low", "cover-open"]);
        assert!(split_state_reasons("none").is_empty());
        assert!(split_state_reasons("").is_empty());
    }
}
