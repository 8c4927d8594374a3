use crate::core::content_store::{is_numeric_id, is_plain_stem, ContentStore};
use crate::core::game_config::GameConfigEditor;
use crate::core::name_cache::NameCache;
use crate::models::addon::{ActivationMode, Addon, ScanIssue, ScanOutcome, TransitionOutcome};
use crate::models::error::{SError, TransitionHalf};
use crate::models::paths::{GameLayout, ARCHIVE_EXT, DISABLED_SUFFIX};
use crate::models::task_status::TaskStatus;
use crate::utils::context::TaskContext;
use camino::Utf8PathBuf;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Per-id results of a bulk toggle.
pub type BulkReport = BTreeMap<String, Result<TransitionOutcome, SError>>;

/// Derives addon state from the archive set, the content directory set and
/// the game config, and moves addons between enabled and disabled.
pub struct Reconciler {
    layout: GameLayout,
    mode: ActivationMode,
    editor: GameConfigEditor,
    names: Arc<RwLock<NameCache>>,
}

impl Reconciler {
    pub fn new(layout: GameLayout, mode: ActivationMode, names: Arc<RwLock<NameCache>>) -> Self {
        let editor = GameConfigEditor::new(
            layout.config_path.clone(),
            layout.search_path_prefix.clone(),
        );
        Self {
            layout,
            mode,
            editor,
            names,
        }
    }

    pub fn layout(&self) -> &GameLayout {
        &self.layout
    }

    pub fn mode(&self) -> ActivationMode {
        self.mode
    }

    #[instrument(skip(self), fields(mode = ?self.mode))]
    pub fn scan(&self) -> Result<ScanOutcome, SError> {
        let outcome = match self.mode {
            ActivationMode::Workshop => self.scan_workshop(),
            ActivationMode::Pirate => self.scan_pirate(),
        };
        TaskContext::report(TaskStatus::Progress {
            value: 100.0,
            message: format!("{} addons", outcome.addons.len()),
        });
        info!(
            "scan found {} addons, {} enabled, {} issues",
            outcome.addons.len(),
            outcome.enabled_count(),
            outcome.issues.len()
        );
        Ok(outcome)
    }

    fn scan_workshop(&self) -> ScanOutcome {
        let mut issues = Vec::new();

        progress(0.0, "reading archives");
        let archives = ContentStore::list_archives(&self.layout.source_dir, &mut issues);
        progress(33.0, "reading content directories");
        let directories = ContentStore::list_directories(&self.layout.content_dir, &mut issues);
        progress(66.0, "reading game config");
        let active = match ContentStore::read_active_ids(
            &self.layout.config_path,
            &self.layout.search_path_prefix,
        ) {
            Ok(active) => active,
            Err(e) => {
                warn!("could not read {}: {e}", self.layout.config_path);
                issues.push(ScanIssue::Unreadable {
                    path: self.layout.config_path.clone(),
                    reason: e.to_string(),
                });
                BTreeSet::new()
            }
        };

        let names = self.names.read();
        let ids: BTreeSet<&String> = archives.iter().chain(&directories).chain(&active).collect();
        let addons: Vec<Addon> = ids
            .into_iter()
            .map(|id| {
                let mut addon = Addon::new(id.as_str(), ActivationMode::Workshop);
                addon.archive_present = archives.contains(id);
                addon.directory_present = directories.contains(id);
                addon.config_active = active.contains(id);
                if let Some(entry) = names.get(id) {
                    addon.display_name = Some(entry.name.clone());
                    addon.description =
                        (!entry.description.is_empty()).then(|| entry.description.clone());
                }
                addon
            })
            .collect();

        for addon in addons.iter().filter(|a| a.is_unconfigured()) {
            warn!("{} has content in place but no config entry", addon.id);
            issues.push(ScanIssue::PresentButInactive {
                id: addon.id.clone(),
            });
        }

        ScanOutcome { addons, issues }
    }

    fn scan_pirate(&self) -> ScanOutcome {
        let mut issues = Vec::new();
        progress(0.0, "reading addons");
        let (enabled, disabled) =
            ContentStore::list_loose_archives(&self.layout.addons_dir, &mut issues);

        let names = self.names.read();
        let addons = enabled
            .union(&disabled)
            .map(|stem| {
                let mut addon = Addon::new(stem.as_str(), ActivationMode::Pirate);
                addon.archive_present = true;
                addon.directory_present = enabled.contains(stem);
                addon.display_name = names.name(stem).map(str::to_string);
                addon
            })
            .collect();

        ScanOutcome { addons, issues }
    }

    /// Moves `id` to the wanted state. Repeating a call is a no-op.
    /// Workshop ids must be numeric; pirate stems must name a file directly
    /// inside the addons dir.
    #[instrument(skip(self))]
    pub fn set_enabled(&mut self, id: &str, want: bool) -> Result<TransitionOutcome, SError> {
        let valid = match self.mode {
            ActivationMode::Workshop => is_numeric_id(id),
            ActivationMode::Pirate => is_plain_stem(id),
        };
        if !valid {
            return Err(SError::InvalidId(id.to_string()));
        }

        let outcome = match (self.mode, want) {
            (ActivationMode::Workshop, true) => self.enable_workshop(id)?,
            (ActivationMode::Workshop, false) => self.disable_workshop(id)?,
            (ActivationMode::Pirate, want) => self.toggle_pirate(id, want)?,
        };
        if outcome != TransitionOutcome::Unchanged {
            info!("{id}: {outcome:?}");
        }
        Ok(outcome)
    }

    fn enable_workshop(&mut self, id: &str) -> Result<TransitionOutcome, SError> {
        let archive = self.layout.archive_path(id).is_file();
        if archive && self.layout.content_path(id).is_dir() {
            debug!("{id} already enabled");
            return Ok(TransitionOutcome::Unchanged);
        }
        if !archive {
            return Err(SError::AddonNotFound(id.to_string()));
        }

        ContentStore::move_archive_into_content_dir(
            &self.layout.source_dir,
            &self.layout.content_dir,
            id,
        )
        .map_err(|e| SError::partial(id, TransitionHalf::Filesystem, e))?;

        // Content stays in place if this fails; the next scan reports it.
        self.editor
            .add_entry(id)
            .map_err(|e| SError::partial(id, TransitionHalf::Config, e))?;

        Ok(TransitionOutcome::Enabled)
    }

    fn disable_workshop(&mut self, id: &str) -> Result<TransitionOutcome, SError> {
        // Config first: the game must never reference a directory being deleted.
        let removed_entry = self
            .editor
            .remove_entry(id)
            .map_err(|e| SError::partial(id, TransitionHalf::Config, e))?;
        let removed_dir = ContentStore::remove_content_dir(&self.layout.content_dir, id)
            .map_err(|e| SError::partial(id, TransitionHalf::Filesystem, e))?;

        Ok(if removed_entry || removed_dir {
            TransitionOutcome::Disabled
        } else {
            TransitionOutcome::Unchanged
        })
    }

    fn pirate_paths(&self, stem: &str) -> (Utf8PathBuf, Utf8PathBuf) {
        let enabled = self.layout.addons_dir.join(format!("{stem}.{ARCHIVE_EXT}"));
        let disabled = self
            .layout
            .addons_dir
            .join(format!("{stem}.{ARCHIVE_EXT}{DISABLED_SUFFIX}"));
        (enabled, disabled)
    }

    fn toggle_pirate(&mut self, stem: &str, want: bool) -> Result<TransitionOutcome, SError> {
        let (enabled, disabled) = self.pirate_paths(stem);
        match (enabled.is_file(), disabled.is_file()) {
            (true, true) => Err(SError::FileCollision(vec![
                enabled.to_string(),
                disabled.to_string(),
            ])),
            (false, false) => Err(SError::AddonNotFound(stem.to_string())),
            (true, false) if want => Ok(TransitionOutcome::Unchanged),
            (false, true) if !want => Ok(TransitionOutcome::Unchanged),
            (false, true) => {
                fs::rename(&disabled, &enabled)?;
                Ok(TransitionOutcome::Enabled)
            }
            (true, false) => {
                fs::rename(&enabled, &disabled)?;
                Ok(TransitionOutcome::Disabled)
            }
        }
    }

    /// Applies `set_enabled` to every scanned addon; one failure does not stop the rest.
    pub fn set_all_enabled(&mut self, want: bool) -> Result<BulkReport, SError> {
        let ids: Vec<String> = self.scan()?.addons.into_iter().map(|a| a.id).collect();
        let report: BulkReport = ids
            .into_iter()
            .map(|id| {
                let result = self.set_enabled(&id, want);
                if let Err(e) = &result {
                    warn!("{id}: {e}");
                }
                (id, result)
            })
            .collect();
        let failed = report.values().filter(|r| r.is_err()).count();
        info!("bulk toggle to {want}: {} addons, {failed} failed", report.len());
        Ok(report)
    }

    /// Ids from `expected` that the game will not load: either the config
    /// entry is missing or the content is not in place. Nothing is corrected.
    pub fn resync(&self, expected: &BTreeSet<String>) -> Result<BTreeSet<String>, SError> {
        let missing: BTreeSet<String> = match self.mode {
            ActivationMode::Workshop => {
                let active = ContentStore::read_active_ids(
                    &self.layout.config_path,
                    &self.layout.search_path_prefix,
                )?;
                expected
                    .iter()
                    .filter(|id| {
                        let on_disk = self.layout.archive_path(id).is_file()
                            && self.layout.content_path(id).is_dir();
                        !active.contains(*id) || !on_disk
                    })
                    .cloned()
                    .collect()
            }
            ActivationMode::Pirate => expected
                .iter()
                .filter(|stem| !self.pirate_paths(stem).0.is_file())
                .cloned()
                .collect(),
        };
        if !missing.is_empty() {
            warn!("{} expected addons are not active: {missing:?}", missing.len());
        }
        Ok(missing)
    }

    pub fn restore_backup(&mut self) -> Result<(), SError> {
        self.editor.restore_backup()
    }
}

fn progress(value: f32, message: &str) {
    TaskContext::report(TaskStatus::Progress {
        value,
        message: message.to_string(),
    });
}
