use std::time::Duration;

use serde_derive::Deserialize;

// When changing anything here, make sure to add
// #[serde(alias = "ihavenounderscores")]
// where needed, so it can be read from the ENV vars.

#[derive(Debug, Clone, Deserialize)]
pub struct Cups {
    pub uri: String,
    #[serde(alias = "ignoretlserrors")]
    pub ignore_tls_errors: bool,
    pub username: String,
    pub password: String,
    /// Jobs of this user count as active jobs. Empty means the current user.
    #[serde(alias = "requestinguser")]
    pub requesting_user: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    #[serde(with = "humantime_serde")]
    pub lease: Duration,
    #[serde(alias = "renewmargin", with = "humantime_serde")]
    pub renew_margin: Duration,
    pub recipient: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Bus {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Launcher {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Alerts {
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub cups: Cups,
    pub subscription: Subscription,
    pub bus: Bus,
    pub launcher: Launcher,
    pub alerts: Alerts,
    #[serde(alias = "sentrydsn")]
    pub sentry_dsn: Option<String>,
}

impl Cups {
    pub fn requesting_user(&self) -> String {
        if !self.requesting_user.is_empty() {
            return self.requesting_user.clone();
        }
        std::env::var("USER").unwrap_or_else(|_| "anonymous".to_string())
    }
}
