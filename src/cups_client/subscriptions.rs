//! Subscription operations. `ipp` has neither their operation codes nor the subscription
//! attributes group, and its parser rejects responses carrying that group.

use std::time::Duration;

use ipp::prelude::*;
use ipp::util::canonicalize_uri;
use log::debug;
use snafu::{ensure, OptionExt, ResultExt};
use ureq::tls::{RootCerts, TlsConfig, TlsProvider};
use ureq::Agent;

use super::{SpoolerError, StatusSnafu};

pub const CREATE_PRINTER_SUBSCRIPTIONS: u16 = 0x0016;
pub const RENEW_SUBSCRIPTION: u16 = 0x0019;
pub const CANCEL_SUBSCRIPTION: u16 = 0x001B;

/// Delimiter tag opening the subscription attributes group.
pub const SUBSCRIPTION_ATTRIBUTES_TAG: u8 = 0x06;

const NOTIFY_SUBSCRIPTION_ID: &str = "notify-subscription-id";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

fn operation_name(operation: u16) -> &'static str {
    match operation {
        CREATE_PRINTER_SUBSCRIPTIONS => "Create-Printer-Subscriptions",
        RENEW_SUBSCRIPTION => "Renew-Subscription",
        CANCEL_SUBSCRIPTION => "Cancel-Subscription",
        _ => "unknown operation",
    }
}

/// A subscription operation with its operation and subscription attribute groups.
#[derive(Debug, Clone)]
pub struct SubscriptionRequest {
    operation: u16,
    operation_attributes: Vec<IppAttribute>,
    subscription_attributes: Vec<IppAttribute>,
}

impl SubscriptionRequest {
    pub fn new(operation: u16, uri: &Uri, requesting_user: &str) -> Self {
        let operation_attributes = vec![
            IppAttribute::new(IppAttribute::ATTRIBUTES_CHARSET, IppValue::Charset("utf-8".to_string())),
            IppAttribute::new(IppAttribute::ATTRIBUTES_NATURAL_LANGUAGE, IppValue::NaturalLanguage("en".to_string())),
            IppAttribute::new(IppAttribute::PRINTER_URI, IppValue::Uri(canonicalize_uri(uri).to_string())),
            IppAttribute::new(IppAttribute::REQUESTING_USER_NAME, IppValue::NameWithoutLanguage(requesting_user.to_string())),
        ];
        Self { operation, operation_attributes, subscription_attributes: Vec::new() }
    }

    pub fn operation_attribute(mut self, name: &str, value: IppValue) -> Self {
        self.operation_attributes.push(IppAttribute::new(name, value));
        self
    }

    pub fn subscription_attribute(mut self, name: &str, value: IppValue) -> Self {
        self.subscription_attributes.push(IppAttribute::new(name, value));
        self
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = IppHeader::new(IppVersion::v1_1(), self.operation, 1).to_bytes().to_vec();

        buffer.push(DelimiterTag::OperationAttributes as u8);
        for attribute in &self.operation_attributes {
            buffer.extend_from_slice(&attribute.to_bytes());
        }
        if !self.subscription_attributes.is_empty() {
            buffer.push(SUBSCRIPTION_ATTRIBUTES_TAG);
            for attribute in &self.subscription_attributes {
                buffer.extend_from_slice(&attribute.to_bytes());
            }
        }
        buffer.push(DelimiterTag::EndOfAttributes as u8);
        buffer
    }
}

/// The parts of a subscription operation response we look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionResponse {
    pub status: StatusCode,
    pub subscription_id: Option<i32>,
}

struct Cursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let bytes = self.data.get(self.position..self.position.checked_add(len)?)?;
        self.position += len;
        Some(bytes)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|bytes| bytes[0])
    }

    fn u16(&mut self) -> Option<u16> {
        self.take(2).map(|bytes| u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }
}

impl SubscriptionResponse {
    pub fn parse(data: &[u8]) -> Result<Self, SpoolerError> {
        let mut cursor = Cursor { data, position: 0 };
        let header = cursor.take(8).whatever_context("IPP response is shorter than its header")?;
        let status = StatusCode::from_u16(u16::from_be_bytes([header[2], header[3]])).unwrap_or(StatusCode::UnknownStatusCode);

        let mut subscription_id = None;
        while !cursor.is_empty() {
            let tag = cursor.u8().whatever_context("Truncated IPP response")?;
            if tag == DelimiterTag::EndOfAttributes as u8 {
                break;
            }
            // Group delimiters carry no name or value.
            if tag < 0x10 {
                continue;
            }

            let name_len = cursor.u16().whatever_context("Truncated IPP attribute name")?;
            let name = cursor.take(name_len.into()).whatever_context("Truncated IPP attribute name")?;
            let value_len = cursor.u16().whatever_context("Truncated IPP attribute value")?;
            let value = cursor.take(value_len.into()).whatever_context("Truncated IPP attribute value")?;

            if name == NOTIFY_SUBSCRIPTION_ID.as_bytes() && tag == ValueTag::Integer as u8 {
                if let Ok(bytes) = <[u8; 4]>::try_from(value) {
                    subscription_id = Some(i32::from_be_bytes(bytes));
                }
            }
        }

        Ok(Self { status, subscription_id })
    }
}

/// Maps `ipp://` and `ipps://` to the HTTP URL the request is posted to.
pub fn http_url(uri: &Uri) -> String {
    let (scheme, default_port) = match uri.scheme_str() {
        Some("ipps") => ("https", 443),
        Some("ipp") => ("http", 631),
        _ => return uri.to_string(),
    };
    let Some(authority) = uri.authority() else {
        return uri.to_string();
    };
    let authority = match authority.port_u16() {
        Some(_) => authority.to_string(),
        None => format!("{authority}:{default_port}"),
    };
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    format!("{scheme}://{authority}{path}")
}

/// Posts `request` to the spooler at `uri` and checks the response status.
pub fn send(uri: &Uri, ignore_tls_errors: bool, request: &SubscriptionRequest) -> Result<SubscriptionResponse, SpoolerError> {
    let operation = operation_name(request.operation);
    let url = http_url(uri);
    debug!("Sending {operation} to {url}");

    let tls_config = TlsConfig::builder()
        .provider(TlsProvider::NativeTls)
        .root_certs(RootCerts::PlatformVerifier)
        .disable_verification(ignore_tls_errors)
        .build();
    let agent: Agent = Agent::config_builder()
        .timeout_global(Some(REQUEST_TIMEOUT))
        .tls_config(tls_config)
        .build()
        .into();

    let mut response = agent
        .post(&url)
        .header("content-type", "application/ipp")
        .send(request.to_bytes())
        .with_whatever_context(|_| format!("IPP request {operation} to {url} failed"))?;
    let body = response
        .body_mut()
        .read_to_vec()
        .with_whatever_context(|_| format!("Could not read {operation} response from {url}"))?;

    let response = SubscriptionResponse::parse(&body)?;
    ensure!(response.status.is_success(), StatusSnafu {
        operation,
        status: format!("{:?}", response.status),
    });
    Ok(response)
}
