use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use config::models::Settings;
use config::schedule::RenewSchedule;
use cups_client::client::CupsClient;
use launcher::CommandLauncher;
use log::{error, warn, LevelFilter};
use publisher::bus::BusPublisher;
use publisher::notifications::DesktopAlerts;
use publisher::AlertSink;
use service::IndicatorService;
use state::menu::{rebuild_header, rebuild_printers_section, MenuModel, Profile, PRINTERS_SECTION};
use state::reconciler::StateReconciler;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

mod cli;
mod config;
mod cups_client;
mod launcher;
mod notifier;
mod publisher;
mod service;
mod state;
#[cfg(test)]
mod testing;

/// How long the menu publisher gets to take the menu off the bus.
const UNPUBLISH_TIMEOUT: Duration = Duration::from_secs(2);

fn main() -> ExitCode {
    let cli = Cli::parse();
    colog::default_builder()
        .filter_level(if cli.verbose { LevelFilter::Debug } else { LevelFilter::Info })
        .parse_default_env()
        .init();

    let settings = match config::loading::load_config() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _sentry = settings.sentry_dsn.as_deref().filter(|dsn| !dsn.is_empty()).map(|dsn| {
        sentry::init((dsn, sentry::ClientOptions { release: sentry::release_name!(), ..Default::default() }))
    });

    let result = match cli.command.unwrap_or_default() {
        Commands::Run => tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Cannot start the event loop")
            .and_then(|runtime| runtime.block_on(run(settings))),
        Commands::Dump => dump(&settings),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(settings: Settings) -> Result<()> {
    let schedule = RenewSchedule::from_settings(&settings.subscription)?;

    // Without spooler notifications the indicator would never change.
    let system_bus = zbus::Connection::system().await.context("Cannot connect to the system bus")?;
    let events = notifier::events::spooler_events(&system_bus)
        .await
        .context("Cannot listen to spooler notifications")?;

    let (activation_sender, activations) = mpsc::unbounded_channel();
    let (publisher, publisher_task) = BusPublisher::spawn(settings.bus.clone(), activation_sender.clone());
    let alerts = settings
        .alerts
        .enabled
        .then(|| Box::new(DesktopAlerts::spawn(activation_sender)) as Box<dyn AlertSink>);

    let service = IndicatorService::new(
        CupsClient::new(&settings.cups, &settings.subscription),
        schedule,
        Box::new(publisher),
        alerts,
        Box::new(CommandLauncher::new(&settings.launcher)),
    );
    service.run(events, activations, shutdown_signal()).await;

    if tokio::time::timeout(UNPUBLISH_TIMEOUT, publisher_task).await.is_err() {
        warn!("Menu publisher did not finish in time");
    }
    Ok(())
}

async fn shutdown_signal() {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            warn!("Cannot listen for SIGTERM: {e}");
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = terminate.recv() => {},
    }
}

fn dump(settings: &Settings) -> Result<()> {
    let spooler = CupsClient::new(&settings.cups, &settings.subscription);
    let mut reconciler = StateReconciler::default();
    reconciler.rescan(&spooler);

    let (section, any_visible) = rebuild_printers_section(&reconciler);
    let mut model = MenuModel::new();
    for profile in Profile::ALL {
        model.replace_section(profile, PRINTERS_SECTION, section.clone());
    }
    model.set_header(rebuild_header(any_visible));

    let printers: Vec<_> = reconciler.records().collect();
    let dump = serde_json::json!({ "printers": printers, "menu": model });
    println!("{}", serde_json::to_string_pretty(&dump)?);
    Ok(())
}
