use crate::config::EngineSettings;
use crate::core::catalog::SteamCatalog;
use crate::core::name_cache::NameCache;
use crate::core::reconciler::Reconciler;
use crate::models::error::SError;
use crate::models::paths::GameLayout;
use crate::utils::process::ProcessChecker;
use crate::utils::thread::CancelFlag;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use sysinfo::System;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::warn;

/// Everything the engine shares between operations. Transitions and batch
/// downloads both go through `acquire`, so at most one of them runs at a time.
pub struct EngineState {
    pub settings: EngineSettings,
    pub names: Arc<RwLock<NameCache>>,
    pub cancel: CancelFlag,
    reconciler: Arc<AsyncMutex<Reconciler>>,
    system: Arc<Mutex<System>>,
}

impl EngineState {
    pub fn new(settings: EngineSettings) -> Self {
        let names = Arc::new(RwLock::new(NameCache::load(&settings.name_cache)));
        let reconciler = Reconciler::new(settings.layout(), settings.mode, names.clone());
        Self {
            settings,
            names,
            cancel: CancelFlag::default(),
            reconciler: Arc::new(AsyncMutex::new(reconciler)),
            system: Arc::new(Mutex::new(System::new())),
        }
    }

    pub fn layout(&self) -> GameLayout {
        self.settings.layout()
    }

    /// Takes the advisory lock, failing fast if another operation holds it.
    pub fn acquire(&self) -> Result<OwnedMutexGuard<Reconciler>, SError> {
        self.reconciler
            .clone()
            .try_lock_owned()
            .map_err(|_| SError::OperationInProgress)
    }

    /// A reconciler for read-only work that must not wait on the lock.
    pub fn reader(&self) -> Reconciler {
        Reconciler::new(self.layout(), self.settings.mode, self.names.clone())
    }

    pub fn catalog(&self) -> SteamCatalog {
        SteamCatalog::from_settings(self.settings.catalog.clone())
    }

    pub fn ensure_game_stopped(&self) -> Result<(), SError> {
        if !self.settings.guard_running_game {
            return Ok(());
        }
        let exe = self.layout().game_exe;
        let mut sys = self.system.lock();
        if ProcessChecker::is_running(&mut sys, &[exe.as_std_path()]) {
            warn!("refusing to touch addons while {exe} is running");
            return Err(SError::GameRunning);
        }
        Ok(())
    }

    pub fn save_names(&self) -> Result<(), SError> {
        self.names.read().save()
    }
}
