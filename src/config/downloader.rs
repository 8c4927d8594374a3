use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::paths::DownloaderPathRules;

pub const L4D2_APP_ID: u32 = 550;

/// Knobs for driving the external workshop downloader (steamcmd).
/// Verification windows are empirically tuned; keep them adjustable.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DownloaderSettings {
    pub binary: Utf8PathBuf,
    /// Passed as `+force_install_dir`; downloads land below it.
    pub install_dir: Utf8PathBuf,
    pub app_id: u32,
    pub tick_ms: u64,
    pub size_poll_ms: u64,
    /// Post-exit wait when byte growth was observed during the download.
    pub verify_active_secs: u64,
    /// Post-exit wait when no activity was ever observed.
    pub verify_idle_secs: u64,
    /// Kill the downloader after this long without output or byte growth.
    pub stall_secs: u64,
    pub line_queue: usize,
    pub content_extensions: Vec<String>,
}

impl Default for DownloaderSettings {
    fn default() -> Self {
        let install_dir = super::data_dir().join("steamcmd");
        Self {
            binary: Utf8PathBuf::from(if cfg!(windows) { "steamcmd.exe" } else { "steamcmd" }),
            install_dir,
            app_id: L4D2_APP_ID,
            tick_ms: 50,
            size_poll_ms: 1000,
            verify_active_secs: 30,
            verify_idle_secs: 180,
            stall_secs: 600,
            line_queue: 256,
            content_extensions: vec!["vpk".into(), "bin".into()],
        }
    }
}

impl DownloaderSettings {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn size_poll(&self) -> Duration {
        Duration::from_millis(self.size_poll_ms)
    }

    pub fn verify_window(&self, saw_activity: bool) -> Duration {
        Duration::from_secs(if saw_activity {
            self.verify_active_secs
        } else {
            self.verify_idle_secs
        })
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_secs)
    }

    /// Directory the finished item `id` ends up in.
    pub fn item_dir(&self, id: &str) -> Utf8PathBuf {
        DownloaderPathRules::new(&self.install_dir)
            .workshop_content
            .join(self.app_id.to_string())
            .join(id)
    }

    /// Directory item `id` is staged in while downloading, before steamcmd
    /// moves it to `item_dir`.
    pub fn staging_dir(&self, id: &str) -> Utf8PathBuf {
        DownloaderPathRules::new(&self.install_dir)
            .workshop_downloads
            .join(self.app_id.to_string())
            .join(id)
    }

    pub fn args(&self, id: &str) -> Vec<String> {
        vec![
            "+force_install_dir".into(),
            self.install_dir.to_string(),
            "+login".into(),
            "anonymous".into(),
            "+workshop_download_item".into(),
            self.app_id.to_string(),
            id.to_string(),
            "+quit".into(),
        ]
    }

    pub fn with_binary(mut self, binary: &Utf8Path) -> Self {
        self.binary = binary.to_path_buf();
        self
    }
}
