use crate::core::reconciler::BulkReport;
use crate::core::registry::EngineState;
use crate::models::addon::{ScanOutcome, TransitionOutcome};
use crate::models::error::SError;
use crate::utils::context::{StatusSender, TaskContext};
use std::collections::BTreeSet;
use tokio::task::{spawn_blocking, JoinHandle};
use tracing::{info, instrument};

#[instrument(skip(state))]
pub async fn scan(state: &EngineState) -> Result<ScanOutcome, SError> {
    let reconciler = state.reader();
    spawn_blocking(move || reconciler.scan())
        .await
        .map_err(|e| SError::AsyncRuntimeError(e.to_string()))?
}

/// Starts a scan on the blocking pool. Progress goes to `channel`; the
/// outcome comes back through the handle.
pub fn scan_in_background(
    state: &EngineState,
    channel: StatusSender,
) -> JoinHandle<Result<ScanOutcome, SError>> {
    let reconciler = state.reader();
    tokio::spawn(async move {
        TaskContext::provide(channel, move || reconciler.scan())
            .await
            .and_then(|r| r)
    })
}

#[instrument(skip(state))]
pub async fn set_enabled(
    state: &EngineState,
    id: String,
    want: bool,
) -> Result<TransitionOutcome, SError> {
    state.ensure_game_stopped()?;
    let mut reconciler = state.acquire()?;

    spawn_blocking(move || reconciler.set_enabled(&id, want))
        .await
        .map_err(|e| SError::AsyncRuntimeError(e.to_string()))?
}

#[instrument(skip(state))]
pub async fn set_all_enabled(state: &EngineState, want: bool) -> Result<BulkReport, SError> {
    state.ensure_game_stopped()?;
    let mut reconciler = state.acquire()?;

    spawn_blocking(move || reconciler.set_all_enabled(want))
        .await
        .map_err(|e| SError::AsyncRuntimeError(e.to_string()))?
}

#[instrument(skip(state))]
pub async fn resync(
    state: &EngineState,
    expected: BTreeSet<String>,
) -> Result<BTreeSet<String>, SError> {
    let reconciler = state.reader();
    spawn_blocking(move || reconciler.resync(&expected))
        .await
        .map_err(|e| SError::AsyncRuntimeError(e.to_string()))?
}

#[instrument(skip(state))]
pub async fn restore_backup(state: &EngineState) -> Result<(), SError> {
    state.ensure_game_stopped()?;
    let mut reconciler = state.acquire()?;

    spawn_blocking(move || -> Result<(), SError> {
        reconciler.restore_backup()?;
        info!("game config restored from backup");
        Ok(())
    })
    .await
    .map_err(|e| SError::AsyncRuntimeError(e.to_string()))?
}
