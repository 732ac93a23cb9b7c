use ipp::prelude::*;
use log::debug;
use snafu::{ensure, OptionExt, ResultExt};
use url::Url;

use crate::config::models::{Cups, Subscription};

use super::models::*;
use super::subscriptions::{self, SubscriptionRequest, CANCEL_SUBSCRIPTION, CREATE_PRINTER_SUBSCRIPTIONS, RENEW_SUBSCRIPTION};
use super::{Spooler, SpoolerError, StatusSnafu};

/// Events the notifier subscription asks the spooler for.
const NOTIFY_EVENTS: [&str; 8] = [
    "job-created",
    "job-completed",
    "job-state-changed",
    "job-state",
    "printer-added",
    "printer-deleted",
    "printer-stopped",
    "printer-state-changed",
];

pub fn build_cups_url(cups_settings: &Cups, queue_id: Option<&str>) -> Result<String, SpoolerError> {
    let mut cups_url = Url::parse(&cups_settings.uri).with_whatever_context(|_| format!("Invalid CUPS uri {}", cups_settings.uri))?;
    if !cups_settings.username.is_empty() && !cups_settings.password.is_empty() {
        cups_url.set_username(&cups_settings.username).ok().whatever_context("CUPS uri can't carry a username")?;
        cups_url.set_password(Some(&cups_settings.password)).ok().whatever_context("CUPS uri can't carry a password")?;
    }

    let url = match queue_id {
        Some(queue_id) => cups_url
            .join("printers/")
            .and_then(|printers| printers.join(queue_id))
            .with_whatever_context(|_| format!("Can't build printer uri for {queue_id}"))?,
        None => cups_url,
    };
    Ok(url.to_string())
}

/// Flattens an attribute value into the space separated form the notifier uses.
fn value_to_keywords(value: &IppValue) -> String {
    match value {
        IppValue::Array(values) => values.iter().map(ToString::to_string).collect::<Vec<_>>().join(" "),
        other => other.to_string(),
    }
}

/// Spooler access over IPP.
#[derive(Debug, Clone)]
pub struct CupsClient {
    settings: Cups,
    recipient: String,
    requesting_user: String,
}

impl CupsClient {
    pub fn new(settings: &Cups, subscription: &Subscription) -> Self {
        Self {
            settings: settings.clone(),
            recipient: subscription.recipient.clone(),
            requesting_user: settings.requesting_user(),
        }
    }

    /// Send an IPP request built by `prepare` to do `op` on `uri` and get the response.
    ///
    /// # Arguments
    ///
    /// * `uri`: Printer or server URI
    /// * `op`: Operation
    /// * `prepare`: Adds operation specific attributes to the request
    ///
    /// returns: Result<IppRequestResponse, SpoolerError>
    fn send_ipp_request(&self, uri: String, op: Operation, prepare: impl FnOnce(&mut IppRequestResponse)) -> Result<IppRequestResponse, SpoolerError> {
        let operation = format!("{op:?}");
        let uri_p: Uri = uri.parse().with_whatever_context(|_| format!("Invalid IPP uri {uri}"))?;
        let mut req = IppRequestResponse::new(
            IppVersion::v1_1(),
            op,
            Some(uri_p.clone())
        );
        req.attributes_mut().add(
            DelimiterTag::OperationAttributes,
            IppAttribute::new("requesting-user-name", IppValue::NameWithoutLanguage(self.requesting_user.clone().into())),
        );
        prepare(&mut req);

        let client = IppClient::builder(uri_p).ignore_tls_errors(self.settings.ignore_tls_errors).build();
        let resp = client.send(req).with_whatever_context(|_| format!("IPP request {operation} to {uri} failed"))?;
        ensure!(resp.header().status_code().is_success(), StatusSnafu {
            operation,
            status: format!("{:?}", resp.header().status_code()),
        });
        Ok(resp)
    }

    fn server_url(&self) -> Result<String, SpoolerError> {
        build_cups_url(&self.settings, None)
    }

    fn server_uri(&self) -> Result<Uri, SpoolerError> {
        let url = self.server_url()?;
        url.parse().with_whatever_context(|_| format!("Invalid IPP uri {url}"))
    }

    fn subscription_request(&self, operation: u16) -> Result<SubscriptionRequest, SpoolerError> {
        Ok(SubscriptionRequest::new(operation, &self.server_uri()?, &self.requesting_user))
    }
}

impl Spooler for CupsClient {
    fn list_destinations(&self) -> Result<Vec<Destination>, SpoolerError> {
        let resp = self.send_ipp_request(self.server_url()?, Operation::CupsGetPrinters, |_| {})?;
        let mut vec: Vec<Destination> = Vec::new();

        for printer in resp.attributes().groups_of(DelimiterTag::PrinterAttributes) {
            let group = printer.attributes();
            let Some(name) = group.get("printer-name").map(|attr| attr.value().to_string()) else {
                debug!("Skipping printer group without a name");
                continue;
            };
            let state = group
                .get("printer-state")
                .and_then(|attr| attr.value().as_enum())
                .map_or(StateCode::Other, |v| StateCode::from_ipp(*v));
            let state_reasons = group
                .get("printer-state-reasons")
                .map(|attr| value_to_keywords(attr.value()))
                .unwrap_or_default();
            vec.push(Destination { name, state, state_reasons });
        }

        Ok(vec)
    }

    fn count_active_jobs(&self, printer: &str) -> Result<u32, SpoolerError> {
        let uri = build_cups_url(&self.settings, Some(printer))?;
        let resp = self
            .send_ipp_request(uri, Operation::GetJobs, |req| {
                let attributes = req.attributes_mut();
                attributes.add(DelimiterTag::OperationAttributes, IppAttribute::new("which-jobs", IppValue::Keyword("not-completed".into())));
                attributes.add(DelimiterTag::OperationAttributes, IppAttribute::new("my-jobs", IppValue::Boolean(true)));
                attributes.add(DelimiterTag::OperationAttributes, IppAttribute::new("requested-attributes", IppValue::Keyword("job-id".into())));
            })
            .map_err(|e| match e {
                SpoolerError::Status { .. } => SpoolerError::UnknownPrinter { printer: printer.to_string() },
                other => other,
            })?;

        let count = resp.attributes().groups_of(DelimiterTag::JobAttributes).count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    fn create_subscription(&self, lease_seconds: i32) -> Result<i32, SpoolerError> {
        let events = NOTIFY_EVENTS.iter().map(|event| IppValue::Keyword((*event).into())).collect();
        let request = self
            .subscription_request(CREATE_PRINTER_SUBSCRIPTIONS)?
            .subscription_attribute("notify-events", IppValue::Array(events))
            .subscription_attribute("notify-recipient-uri", IppValue::Uri(self.recipient.clone()))
            .subscription_attribute("notify-lease-duration", IppValue::Integer(lease_seconds));

        subscriptions::send(&self.server_uri()?, self.settings.ignore_tls_errors, &request)?
            .subscription_id
            .whatever_context("Spooler did not return a subscription id")
    }

    fn renew_subscription(&self, id: i32, lease_seconds: i32) -> Result<(), SpoolerError> {
        let request = self
            .subscription_request(RENEW_SUBSCRIPTION)?
            .operation_attribute("notify-subscription-id", IppValue::Integer(id))
            .operation_attribute("notify-lease-duration", IppValue::Integer(lease_seconds));
        subscriptions::send(&self.server_uri()?, self.settings.ignore_tls_errors, &request)?;
        Ok(())
    }

    fn cancel_subscription(&self, id: i32) -> Result<(), SpoolerError> {
        let request = self
            .subscription_request(CANCEL_SUBSCRIPTION)?
            .operation_attribute("notify-subscription-id", IppValue::Integer(id));
        subscriptions::send(&self.server_uri()?, self.settings.ignore_tls_errors, &request)?;
        Ok(())
    }
}
