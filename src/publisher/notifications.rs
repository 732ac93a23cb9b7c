use std::collections::HashMap;

use futures::StreamExt;
use log::{debug, error, warn};
use snafu::ResultExt;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use zbus::{message::Type, proxy, zvariant::Value, Connection, MatchRule, Message, MessageStream};

use crate::state::alerts::{Alert, ALERT_ICON, ALERT_TITLE};
use crate::state::menu::Activation;

use super::{AlertSink, NotifySnafu, PublishError};

const APP_NAME: &str = "indicator-printers";
const SETTINGS_ACTION_KEY: &str = "settings";
const CRITICAL_URGENCY: u8 = 2;
const NOTIFICATIONS_INTERFACE: &str = "org.freedesktop.Notifications";
const NOTIFICATIONS_PATH: &str = "/org/freedesktop/Notifications";

#[proxy(
    default_service = "org.freedesktop.Notifications",
    interface = "org.freedesktop.Notifications",
    default_path = "/org/freedesktop/Notifications"
)]
trait Notifications {
    fn notify(
        &self,
        app_name: &str,
        replaces_id: u32,
        app_icon: &str,
        summary: &str,
        body: &str,
        actions: &[&str],
        hints: HashMap<&str, Value<'_>>,
        expire_timeout: i32,
    ) -> zbus::Result<u32>;
}

/// What the notification server tells us about a shown alert.
#[derive(Debug, Clone, PartialEq, Eq)]
enum NotificationSignal {
    ActionInvoked { id: u32, action_key: String },
    Closed { id: u32 },
}

impl NotificationSignal {
    fn from_message(msg: &Message) -> Option<Self> {
        let header = msg.header();
        let body = msg.body();
        match header.member()?.as_str() {
            "ActionInvoked" => body
                .deserialize::<(u32, String)>()
                .ok()
                .map(|(id, action_key)| NotificationSignal::ActionInvoked { id, action_key }),
            "NotificationClosed" => body.deserialize::<(u32, u32)>().ok().map(|(id, _reason)| NotificationSignal::Closed { id }),
            _ => None,
        }
    }
}

/// Printers of the alerts still on screen, by notification id.
#[derive(Debug, Default)]
struct ShownAlerts {
    printers: HashMap<u32, String>,
}

impl ShownAlerts {
    fn shown(&mut self, id: u32, printer: String) {
        self.printers.insert(id, printer);
    }

    /// Forgets closed notifications and turns a click on "Settings…" into an activation.
    fn handle(&mut self, signal: NotificationSignal) -> Option<Activation> {
        match signal {
            NotificationSignal::ActionInvoked { id, action_key } if action_key == SETTINGS_ACTION_KEY => {
                self.printers.remove(&id).map(Activation::Printer)
            }
            NotificationSignal::ActionInvoked { .. } => None,
            NotificationSignal::Closed { id } => {
                self.printers.remove(&id);
                None
            }
        }
    }
}

/// Shows alerts as desktop notifications with a button to the printer's settings.
pub struct DesktopAlerts {
    alerts: UnboundedSender<Alert>,
}

impl DesktopAlerts {
    pub fn spawn(activations: UnboundedSender<Activation>) -> Self {
        let (alerts, receiver) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            if let Err(e) = serve(receiver, activations).await {
                error!("{e}, printer problems won't be shown");
            }
        });
        Self { alerts }
    }
}

impl AlertSink for DesktopAlerts {
    fn alert(&mut self, alert: &Alert) {
        if self.alerts.send(alert.clone()).is_err() {
            warn!("Alerts are unavailable, dropping: {}", alert.message);
        }
    }
}

async fn show(proxy: &NotificationsProxy<'_>, alert: &Alert) -> Result<u32, PublishError> {
    let hints = HashMap::from([("urgency", Value::U8(CRITICAL_URGENCY))]);
    let summary = format!("{ALERT_TITLE}: {}", alert.message);
    proxy
        .notify(APP_NAME, 0, ALERT_ICON, &summary, &alert.detail, &[SETTINGS_ACTION_KEY, "Settings…"], hints, -1)
        .await
        .context(NotifySnafu)
}

async fn serve(mut alerts: UnboundedReceiver<Alert>, activations: UnboundedSender<Activation>) -> Result<(), PublishError> {
    let connection = Connection::session().await.context(NotifySnafu)?;
    let proxy = NotificationsProxy::new(&connection).await.context(NotifySnafu)?;

    // One stream for both signals, a click is followed by the close of the same notification.
    let rule = MatchRule::builder()
        .msg_type(Type::Signal)
        .interface(NOTIFICATIONS_INTERFACE)
        .context(NotifySnafu)?
        .path(NOTIFICATIONS_PATH)
        .context(NotifySnafu)?
        .build();
    let mut signals = MessageStream::for_match_rule(rule, &connection, None).await.context(NotifySnafu)?;

    let mut shown = ShownAlerts::default();

    loop {
        tokio::select! {
            alert = alerts.recv() => {
                let Some(alert) = alert else { break };
                match show(&proxy, &alert).await {
                    Ok(id) => {
                        debug!("Alert {id} for {} ({}, {} jobs): {}", alert.printer, alert.reason, alert.job_count, alert.message);
                        shown.shown(id, alert.printer);
                    }
                    Err(e) => warn!("{e}: {}", alert.message),
                }
            }
            Some(msg) = signals.next() => {
                let Some(signal) = msg.ok().as_ref().and_then(NotificationSignal::from_message) else { continue };
                if let Some(activation) = shown.handle(signal) {
                    if activations.send(activation).is_err() {
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoked(id: u32, action_key: &str) -> NotificationSignal {
        NotificationSignal::ActionInvoked { id, action_key: action_key.to_string() }
    }

    #[test]
    fn settings_click_opens_the_printer() {
        let mut shown = ShownAlerts::default();
        shown.shown(3, "kitchen".into());

        assert_eq!(shown.handle(invoked(3, "settings")), Some(Activation::Printer("kitchen".into())));
        assert_eq!(shown.handle(NotificationSignal::Closed { id: 3 }), None);
        assert!(shown.printers.is_empty());
    }

    #[test]
    fn closed_alerts_are_forgotten() {
        let mut shown = ShownAlerts::default();
        shown.shown(3, "kitchen".into());
        shown.shown(4, "office".into());

        assert_eq!(shown.handle(NotificationSignal::Closed { id: 3 }), None);
        assert_eq!(shown.printers.len(), 1);
        // A late click on a closed alert does nothing.
        assert_eq!(shown.handle(invoked(3, "settings")), None);
        assert_eq!(shown.handle(invoked(4, "default")), None);
        assert_eq!(shown.printers.keys().collect::<Vec<_>>(), vec![&4]);
    }
}
