use snafu::Snafu;

use crate::state::alerts::Alert;
use crate::state::menu::{HeaderState, Profile, Section};

pub mod bus;
pub mod notifications;

/// Where the menu model goes for rendering.
pub trait MenuPublisher {
    /// Replaces the published section at `position` of the `profile` menu wholesale.
    fn replace_section(&mut self, profile: Profile, position: usize, section: &Section);

    fn update_header(&mut self, header: &HeaderState);

    fn unpublish(&mut self);
}

/// Side channel for printer problems.
pub trait AlertSink {
    fn alert(&mut self, alert: &Alert);
}

// ////// //
// Errors //
// ////// //

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PublishError {
    #[snafu(display("Could not export the menu as {name} at {path}"))]
    Export { name: String, path: String, source: zbus::Error },
    #[snafu(display("Could not update the menu at {path}"))]
    Update { path: String, source: zbus::Error },
    #[snafu(display("Could not encode the header state"))]
    Encode { source: serde_json::Error },
    #[snafu(display("Could not show alert"))]
    Notify { source: zbus::Error },
}
