use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivationMode {
    /// Archive + content directory + config entry.
    #[default]
    Workshop,
    /// A single file, disabled by a filename suffix.
    Pirate,
}

/// One piece of content as observed by the last scan.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Addon {
    pub id: String,
    pub mode: ActivationMode,
    pub archive_present: bool,
    pub directory_present: bool,
    pub config_active: bool,
    pub display_name: Option<String>,
    pub description: Option<String>,
}

impl Addon {
    pub fn new(id: impl Into<String>, mode: ActivationMode) -> Self {
        Self {
            id: id.into(),
            mode,
            archive_present: false,
            directory_present: false,
            config_active: false,
            display_name: None,
            description: None,
        }
    }

    /// Derived from the presence flags, never stored.
    pub fn enabled(&self) -> bool {
        match self.mode {
            ActivationMode::Workshop => self.archive_present && self.directory_present,
            ActivationMode::Pirate => self.directory_present,
        }
    }

    /// Content is in place but the game config does not reference it.
    pub fn is_unconfigured(&self) -> bool {
        self.mode == ActivationMode::Workshop && self.enabled() && !self.config_active
    }
}

/// Non-fatal findings collected while scanning.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum ScanIssue {
    Unreadable { path: Utf8PathBuf, reason: String },
    PresentButInactive { id: String },
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ScanOutcome {
    pub addons: Vec<Addon>,
    pub issues: Vec<ScanIssue>,
}

impl ScanOutcome {
    pub fn get(&self, id: &str) -> Option<&Addon> {
        self.addons.iter().find(|a| a.id == id)
    }

    pub fn enabled_count(&self) -> usize {
        self.addons.iter().filter(|a| a.enabled()).count()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionOutcome {
    Unchanged,
    Enabled,
    Disabled,
}
