use config::{Config, ConfigError, Environment};
use log::info;

use super::models::Settings;

pub fn load_config() -> Result<Settings, ConfigError> {
    // As Rust has no native support for .env files,
    // we use the dotenv_flow crate to import to actual ENV vars.
    if let Ok(dotenv_path) = dotenv_flow::dotenv_flow() {
        info!("Loaded dotenv file: {:?}", dotenv_path);
    }

    build_config(Environment::default()
        .prefix("INDICATOR")
        .separator("_")
        .prefix_separator("_")
        .try_parsing(true)
        .with_list_parse_key("launcher.args")
        .list_separator(","))
}

fn build_config(environment: Environment) -> Result<Settings, ConfigError> {
    Config::builder()
        .add_source(environment)
        .set_default("cups.uri", "http://localhost:631/")?
        .set_default("cups.ignoretlserrors", "true")?
        .set_default("cups.username", "")?
        .set_default("cups.password", "")?
        .set_default("cups.requestinguser", "")?
        .set_default("subscription.lease", "15m")?
        .set_default("subscription.renewmargin", "1m")?
        .set_default("subscription.recipient", "dbus://")?
        .set_default("bus.name", "org.ayatana.indicator.printers")?
        .set_default("bus.path", "/org/ayatana/indicator/printers")?
        .set_default("launcher.program", "gnome-control-center")?
        .set_default("launcher.args", vec!["printers"])?
        .set_default("alerts.enabled", "true")?
        .set_default("sentrydsn", "")?
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use super::*;

    fn environment(vars: &[(&str, &str)]) -> Environment {
        let source: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Environment::default()
            .prefix("INDICATOR")
            .separator("_")
            .prefix_separator("_")
            .try_parsing(true)
            .with_list_parse_key("launcher.args")
            .list_separator(",")
            .source(Some(source))
    }

    #[test]
    fn defaults_apply_without_environment() {
        let settings = build_config(environment(&[])).unwrap();
        assert_eq!(settings.cups.uri, "http://localhost:631/");
        assert_eq!(settings.subscription.lease, Duration::from_secs(15 * 60));
        assert_eq!(settings.subscription.renew_margin, Duration::from_secs(60));
        assert_eq!(settings.launcher.program, "gnome-control-center");
        assert_eq!(settings.launcher.args, vec!["printers".to_string()]);
        assert!(settings.alerts.enabled);
    }

    #[test]
    fn environment_overrides_defaults() {
        let settings = build_config(environment(&[
            ("INDICATOR_CUPS_URI", "https://print.local:631/"),
            ("INDICATOR_SUBSCRIPTION_LEASE", "5m"),
            ("INDICATOR_LAUNCHER_ARGS", "printers,--verbose"),
            ("INDICATOR_ALERTS_ENABLED", "false"),
        ]))
        .unwrap();
        assert_eq!(settings.cups.uri, "https://print.local:631/");
        assert_eq!(settings.subscription.lease, Duration::from_secs(5 * 60));
        assert_eq!(settings.launcher.args, vec!["printers".to_string(), "--verbose".to_string()]);
        assert!(!settings.alerts.enabled);
    }
}
