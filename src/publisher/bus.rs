use std::collections::BTreeMap;

use backon::{ExponentialBuilder, Retryable};
use log::{debug, error, info, warn};
use snafu::ResultExt;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use zbus::{connection, interface, Connection, SignalContext};

use crate::config::models::Bus;
use crate::state::menu::{
    rebuild_header, settings_section, Activation, HeaderState, Profile, Section, HEADER_ACTION, PRINTER_ACTION,
    SETTINGS_ACTION,
};

use super::{EncodeSnafu, ExportSnafu, MenuPublisher, PublishError, UpdateSnafu};

#[derive(Debug)]
enum PublishCommand {
    ReplaceSection { profile: Profile, position: usize, section: Section },
    UpdateHeader(HeaderState),
    Unpublish,
}

/// Published menu, as seen by renderers.
#[derive(Debug)]
pub struct MenuExporter {
    menus: BTreeMap<Profile, Vec<Section>>,
    revision: u32,
}

impl Default for MenuExporter {
    fn default() -> Self {
        let menus = Profile::ALL.into_iter().map(|profile| (profile, vec![Section::default(), settings_section()])).collect();
        Self { menus, revision: 0 }
    }
}

impl MenuExporter {
    fn replace_section(&mut self, profile: Profile, position: usize, section: Section) -> Option<u32> {
        let sections = self.menus.get_mut(&profile)?;
        if position >= sections.len() {
            return None;
        }
        sections.remove(position);
        sections.insert(position, section);
        self.revision += 1;
        Some(self.revision)
    }
}

#[interface(name = "org.ayatana.indicator.printers.Menu")]
impl MenuExporter {
    /// Sections of the menu for `profile`, as JSON.
    fn get_layout(&self, profile: &str) -> zbus::fdo::Result<(u32, String)> {
        let sections = Profile::parse(profile)
            .and_then(|profile| self.menus.get(&profile))
            .ok_or_else(|| zbus::fdo::Error::InvalidArgs(format!("Unknown profile {profile}")))?;
        let layout = serde_json::to_string(sections).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        Ok((self.revision, layout))
    }

    #[zbus(signal)]
    async fn layout_changed(ctxt: &SignalContext<'_>, profile: &str, position: u32, revision: u32) -> zbus::Result<()>;
}

/// Actions the menu items are bound to. `_header` is stateful, its state is what the panel renders.
pub struct ActionExporter {
    activations: UnboundedSender<Activation>,
    header: HeaderState,
}

impl ActionExporter {
    fn new(activations: UnboundedSender<Activation>) -> Self {
        Self { activations, header: rebuild_header(false) }
    }

    fn header_state(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.header)
    }
}

#[interface(name = "org.ayatana.indicator.printers.Actions")]
impl ActionExporter {
    fn list(&self) -> Vec<&'static str> {
        vec![PRINTER_ACTION, SETTINGS_ACTION, HEADER_ACTION]
    }

    /// State of a stateful action, as JSON.
    fn get_state(&self, action: &str) -> zbus::fdo::Result<String> {
        if action != HEADER_ACTION {
            return Err(zbus::fdo::Error::InvalidArgs(format!("Action {action} has no state")));
        }
        self.header_state().map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    fn activate(&self, action: &str, target: &str) -> zbus::fdo::Result<()> {
        if action == HEADER_ACTION {
            return Ok(());
        }
        let activation = Activation::parse(action, target)
            .ok_or_else(|| zbus::fdo::Error::InvalidArgs(format!("Can't activate {action} with target {target:?}")))?;
        self.activations
            .send(activation)
            .map_err(|_| zbus::fdo::Error::Failed("Indicator is shutting down".to_string()))
    }

    #[zbus(signal)]
    async fn state_changed(ctxt: &SignalContext<'_>, action: &str, state: &str) -> zbus::Result<()>;
}

/// Hands menu updates to a task that owns the session bus connection.
pub struct BusPublisher {
    commands: UnboundedSender<PublishCommand>,
}

impl BusPublisher {
    pub fn spawn(settings: Bus, activations: UnboundedSender<Activation>) -> (Self, JoinHandle<()>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(serve(settings, receiver, activations));
        (Self { commands }, task)
    }

    fn send(&self, command: PublishCommand) {
        if self.commands.send(command).is_err() {
            debug!("Menu publisher is gone, dropping update");
        }
    }
}

impl MenuPublisher for BusPublisher {
    fn replace_section(&mut self, profile: Profile, position: usize, section: &Section) {
        self.send(PublishCommand::ReplaceSection { profile, position, section: section.clone() });
    }

    fn update_header(&mut self, header: &HeaderState) {
        self.send(PublishCommand::UpdateHeader(header.clone()));
    }

    fn unpublish(&mut self) {
        self.send(PublishCommand::Unpublish);
    }
}

async fn connect(settings: &Bus, activations: UnboundedSender<Activation>) -> Result<Connection, PublishError> {
    let context = || ExportSnafu { name: settings.name.clone(), path: settings.path.clone() };
    connection::Builder::session()
        .context(context())?
        .name(settings.name.as_str())
        .context(context())?
        .serve_at(settings.path.as_str(), MenuExporter::default())
        .context(context())?
        .serve_at(settings.path.as_str(), ActionExporter::new(activations))
        .context(context())?
        .build()
        .await
        .context(context())
}

async fn apply(connection: &Connection, path: &str, command: PublishCommand) -> Result<(), PublishError> {
    let object_server = connection.object_server();

    match command {
        PublishCommand::ReplaceSection { profile, position, section } => {
            let menu = object_server.interface::<_, MenuExporter>(path).await.context(UpdateSnafu { path })?;
            let revision = menu.get_mut().await.replace_section(profile, position, section);
            match revision {
                Some(revision) => MenuExporter::layout_changed(menu.signal_context(), profile.as_str(), position as u32, revision)
                    .await
                    .context(UpdateSnafu { path })?,
                None => warn!("No section {position} in the {} menu", profile.as_str()),
            }
        }
        PublishCommand::UpdateHeader(header) => {
            let actions = object_server.interface::<_, ActionExporter>(path).await.context(UpdateSnafu { path })?;
            let state = {
                let mut actions = actions.get_mut().await;
                actions.header = header;
                actions.header_state().context(EncodeSnafu)?
            };
            ActionExporter::state_changed(actions.signal_context(), HEADER_ACTION, &state)
                .await
                .context(UpdateSnafu { path })?;
        }
        PublishCommand::Unpublish => {
            object_server.remove::<MenuExporter, _>(path).await.context(UpdateSnafu { path })?;
            object_server.remove::<ActionExporter, _>(path).await.context(UpdateSnafu { path })?;
        }
    }
    Ok(())
}

async fn serve(settings: Bus, mut commands: UnboundedReceiver<PublishCommand>, activations: UnboundedSender<Activation>) {
    let connection = (|| connect(&settings, activations.clone()))
        .retry(ExponentialBuilder::default())
        .notify(|e, after| warn!("{e}, retrying in {after:?}"))
        .await;

    let connection = match connection {
        Ok(connection) => {
            info!("Exported menu as {} at {}", settings.name, settings.path);
            Some(connection)
        }
        Err(e) => {
            error!("{e}, the indicator won't have a menu");
            None
        }
    };

    while let Some(command) = commands.recv().await {
        let unpublish = matches!(command, PublishCommand::Unpublish);
        if let Some(connection) = &connection {
            if let Err(e) = apply(connection, &settings.path, command).await {
                warn!("{e}");
            }
        }
        if unpublish {
            break;
        }
    }
}
