pub mod catalog;
pub mod downloader;

use crate::models::addon::ActivationMode;
use crate::models::error::SError;
use crate::models::paths::{GameLayout, DEFAULT_SEARCH_PATH_PREFIX};
use camino::{Utf8Path, Utf8PathBuf};
use catalog::CatalogSettings;
use directories::ProjectDirs;
use downloader::DownloaderSettings;
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "addon_keeper";

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct EngineSettings {
    pub version: u8,
    pub game_root: Utf8PathBuf,
    pub mode: ActivationMode,
    pub search_path_prefix: String,
    /// Where enabled workshop content is materialised; defaults to the workshop dir.
    pub content_dir: Option<Utf8PathBuf>,
    pub guard_running_game: bool,
    pub name_cache: Utf8PathBuf,
    pub downloader: DownloaderSettings,
    pub catalog: CatalogSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let data_dir = data_dir();
        Self {
            version: 0,
            game_root: Utf8PathBuf::new(),
            mode: ActivationMode::Workshop,
            search_path_prefix: DEFAULT_SEARCH_PATH_PREFIX.to_string(),
            content_dir: None,
            guard_running_game: true,
            name_cache: data_dir.join("names.json"),
            downloader: DownloaderSettings::default(),
            catalog: CatalogSettings::default(),
        }
    }
}

impl EngineSettings {
    pub fn load() -> Result<EngineSettings, SError> {
        Ok(confy::load(APP_NAME, None)?)
    }

    pub fn save(&self) -> Result<(), SError> {
        Ok(confy::store(APP_NAME, None, self)?)
    }

    pub fn load_path(path: &Utf8Path) -> Result<EngineSettings, SError> {
        Ok(confy::load_path(path)?)
    }

    pub fn layout(&self) -> GameLayout {
        let layout =
            GameLayout::from_game_root(&self.game_root).with_prefix(self.search_path_prefix.clone());
        match &self.content_dir {
            Some(dir) => layout.with_content_dir(dir.clone()),
            None => layout,
        }
    }
}

/// Per-user data directory for caches and logs.
pub fn data_dir() -> Utf8PathBuf {
    ProjectDirs::from("com", "martes", APP_NAME)
        .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.data_local_dir().to_path_buf()).ok())
        .or_else(|| {
            std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
                .and_then(|p| Utf8PathBuf::from_path_buf(p).ok())
        })
        .unwrap_or_else(|| Utf8PathBuf::from("."))
}
