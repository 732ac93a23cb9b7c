use serde_derive::Serialize;

use crate::cups_client::models::StateCode;

use super::reconciler::{PrinterRecord, StateReconciler};

pub const PRINTER_ACTION: &str = "printer";
pub const SETTINGS_ACTION: &str = "settings";
pub const HEADER_ACTION: &str = "_header";

pub const PRINTER_ICON: &str = "printer";
pub const HEADER_ICON: &str = "printer-symbolic";

/// Position of the printers section in every profile menu.
pub const PRINTERS_SECTION: usize = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Phone,
    Desktop,
}

impl Profile {
    pub const ALL: [Profile; 2] = [Profile::Phone, Profile::Desktop];

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Phone => "phone",
            Profile::Desktop => "desktop",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Profile::ALL.into_iter().find(|profile| profile.as_str() == name)
    }
}

/// Text or count shown at the right side of a printer item. Never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Secondary {
    Text(String),
    Count(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuItem {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<Secondary>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Section {
    pub items: Vec<MenuItem>,
}

/// State of the stateful header action, which is what the panel renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderState {
    pub title: String,
    pub tooltip: String,
    pub visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(rename = "accessible-desc", skip_serializing_if = "Option::is_none")]
    pub accessible_desc: Option<String>,
}

/// Something a menu item asked us to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    Printer(String),
    Settings,
}

impl Activation {
    pub fn parse(action: &str, target: &str) -> Option<Self> {
        match action {
            PRINTER_ACTION if !target.is_empty() => Some(Activation::Printer(target.to_string())),
            SETTINGS_ACTION => Some(Activation::Settings),
            _ => None,
        }
    }
}

// /////// //
// Builder //
// /////// //

fn printer_item(record: &PrinterRecord) -> Option<MenuItem> {
    if !record.is_visible() {
        return None;
    }

    let secondary = match record.state {
        StateCode::Stopped => Some(Secondary::Text("Paused".to_string())),
        StateCode::Processing => Some(Secondary::Count(record.active_jobs)),
        StateCode::Idle | StateCode::Other => None,
    };

    Some(MenuItem {
        label: record.name.clone(),
        icon: Some(PRINTER_ICON.to_string()),
        action: PRINTER_ACTION.to_string(),
        target: Some(record.name.clone()),
        secondary,
    })
}

/// Builds the printers section from every known printer, and tells whether it shows anything.
pub fn rebuild_printers_section(reconciler: &StateReconciler) -> (Section, bool) {
    let items: Vec<MenuItem> = reconciler.records().filter_map(printer_item).collect();
    let any_visible = !items.is_empty();
    (Section { items }, any_visible)
}

/// The header is always there; the icon only shows while printers are listed.
pub fn rebuild_header(any_visible: bool) -> HeaderState {
    HeaderState {
        title: "Printers".to_string(),
        tooltip: "Printers with queued jobs".to_string(),
        visible: true,
        icon: any_visible.then(|| HEADER_ICON.to_string()),
        accessible_desc: any_visible.then(|| "Printers".to_string()),
    }
}

pub fn settings_section() -> Section {
    Section {
        items: vec![MenuItem {
            label: "Printers…".to_string(),
            icon: None,
            action: SETTINGS_ACTION.to_string(),
            target: None,
            secondary: None,
        }],
    }
}

// ///// //
// Model //
// ///// //

/// Refers to one published version of a section. Replacing the section invalidates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionHandle {
    pub profile: Profile,
    pub position: usize,
    revision: u64,
}

#[derive(Debug, Clone, Serialize)]
struct PublishedSection {
    #[serde(skip)]
    revision: u64,
    #[serde(flatten)]
    section: Section,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileMenu {
    pub profile: Profile,
    sections: Vec<PublishedSection>,
}

/// Menu for every profile, plus the header shared by all of them.
#[derive(Debug, Clone, Serialize)]
pub struct MenuModel {
    header: HeaderState,
    menus: Vec<ProfileMenu>,
    #[serde(skip)]
    next_revision: u64,
}

impl Default for MenuModel {
    fn default() -> Self {
        Self::new()
    }
}

impl MenuModel {
    pub fn new() -> Self {
        let mut next_revision = 0;
        let menus = Profile::ALL
            .into_iter()
            .map(|profile| {
                let sections = [Section::default(), settings_section()]
                    .into_iter()
                    .map(|section| {
                        next_revision += 1;
                        PublishedSection { revision: next_revision, section }
                    })
                    .collect();
                ProfileMenu { profile, sections }
            })
            .collect();

        Self { header: rebuild_header(false), menus, next_revision }
    }

    fn menu(&self, profile: Profile) -> Option<&ProfileMenu> {
        self.menus.iter().find(|menu| menu.profile == profile)
    }

    /// Removes the section at `position` and inserts `section` in its place.
    pub fn replace_section(&mut self, profile: Profile, position: usize, section: Section) -> Option<SectionHandle> {
        let menu = self.menus.iter_mut().find(|menu| menu.profile == profile)?;
        if position >= menu.sections.len() {
            return None;
        }

        self.next_revision += 1;
        menu.sections.remove(position);
        menu.sections.insert(position, PublishedSection { revision: self.next_revision, section });
        Some(SectionHandle { profile, position, revision: self.next_revision })
    }

    #[cfg(test)]
    pub fn handle(&self, profile: Profile, position: usize) -> Option<SectionHandle> {
        let published = self.menu(profile)?.sections.get(position)?;
        Some(SectionHandle { profile, position, revision: published.revision })
    }

    /// The section behind `handle`, or `None` if it has been replaced since.
    pub fn section(&self, handle: SectionHandle) -> Option<&Section> {
        let published = self.menu(handle.profile)?.sections.get(handle.position)?;
        (published.revision == handle.revision).then_some(&published.section)
    }

    #[cfg(test)]
    pub fn sections(&self, profile: Profile) -> Vec<&Section> {
        self.menu(profile).map(|menu| menu.sections.iter().map(|published| &published.section).collect()).unwrap_or_default()
    }

    #[cfg(test)]
    pub fn header(&self) -> &HeaderState {
        &self.header
    }

    pub fn set_header(&mut self, header: HeaderState) {
        self.header = header;
    }
}
