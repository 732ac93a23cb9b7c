use log::{debug, warn};
use tokio::process::Command;

use crate::config::models::Launcher;

/// Opens the printer settings, optionally on one printer.
pub trait SettingsLauncher {
    fn open_settings(&mut self, printer: Option<&str>);
}

/// Launches the configured settings application and doesn't wait for it.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: String,
    args: Vec<String>,
}

impl CommandLauncher {
    pub fn new(settings: &Launcher) -> Self {
        Self { program: settings.program.clone(), args: settings.args.clone() }
    }

    pub fn arguments(&self, printer: Option<&str>) -> Vec<String> {
        let mut args = self.args.clone();
        if let Some(printer) = printer {
            args.push("show-printer".to_string());
            args.push(printer.to_string());
        }
        args
    }
}

impl SettingsLauncher for CommandLauncher {
    fn open_settings(&mut self, printer: Option<&str>) {
        let args = self.arguments(printer);
        debug!("Launching {} {}", self.program, args.join(" "));

        match Command::new(&self.program).args(&args).spawn() {
            Ok(mut child) => {
                // Prevent zombie process
                tokio::spawn(async move { child.wait().await });
            }
            Err(e) => warn!("Could not spawn printer settings: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launcher() -> CommandLauncher {
        CommandLauncher::new(&Launcher { program: "gnome-control-center".into(), args: vec!["printers".into()] })
    }

    #[test]
    fn unscoped_settings() {
        assert_eq!(launcher().arguments(None), vec!["printers"]);
    }

    #[test]
    fn settings_for_one_printer() {
        assert_eq!(launcher().arguments(Some("kitchen")), vec!["printers", "show-printer", "kitchen"]);
    }

    #[tokio::test]
    async fn missing_program_is_not_fatal() {
        let mut launcher = CommandLauncher::new(&Launcher { program: "/nonexistent/settings-app".into(), args: vec![] });
        launcher.open_settings(Some("kitchen"));
    }
}
