use snafu::Snafu;

pub mod client;
pub mod models;
pub mod subscriptions;

use models::Destination;

/// Read and subscription access to the print spooler.
///
/// Calls block the caller; the spooler is local and trusted, so no timeouts are applied.
pub trait Spooler {
    /// All destinations currently known to the spooler.
    fn list_destinations(&self) -> Result<Vec<Destination>, SpoolerError>;

    /// Number of not yet completed jobs of the current user on `printer`.
    /// Fails with [`SpoolerError::UnknownPrinter`] when the spooler doesn't know the printer.
    fn count_active_jobs(&self, printer: &str) -> Result<u32, SpoolerError>;

    /// Creates a change notification subscription and returns its id.
    fn create_subscription(&self, lease_seconds: i32) -> Result<i32, SpoolerError>;

    fn renew_subscription(&self, id: i32, lease_seconds: i32) -> Result<(), SpoolerError>;

    fn cancel_subscription(&self, id: i32) -> Result<(), SpoolerError>;
}

// ////// //
// Errors //
// ////// //

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SpoolerError {
    #[snafu(display("Printer {printer} is not known to the spooler"))]
    UnknownPrinter { printer: String },
    #[snafu(display("Spooler answered {operation} with {status}"))]
    Status { operation: String, status: String },
    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error + Send + Sync>, Some)))]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}
