use crate::core::collection::CollectionResolver;
use crate::core::registry::EngineState;
use crate::core::supervisor::AcquisitionSupervisor;
use crate::models::addon::ActivationMode;
use crate::models::catalog::ResultCode;
use crate::models::error::SError;
use crate::models::task::BatchJob;
use crate::utils::context::{StatusSender, TaskContext};
use tokio::task::spawn_blocking;
use tracing::{debug, info, instrument, warn};

/// Expands collections, looks up names and downloads every resulting item.
/// Holds the advisory lock for the whole batch.
#[instrument(skip(state, channel))]
pub async fn download(
    state: &EngineState,
    ids: Vec<String>,
    channel: StatusSender,
) -> Result<BatchJob, SError> {
    let _guard = state.acquire()?;
    state.cancel.reset();

    let catalog = state.catalog();
    let resolver_catalog = catalog.clone();
    let (items, metadata) = spawn_blocking(move || {
        let items = CollectionResolver::new(resolver_catalog.clone()).expand(&ids);
        let metadata = resolver_catalog.fetch_metadata(&items);
        (items, metadata)
    })
    .await
    .map_err(|e| SError::AsyncRuntimeError(e.to_string()))?;
    info!("{} items to download", items.len());

    state.names.write().merge(metadata.values());
    if let Err(e) = state.save_names() {
        warn!("could not save name cache: {e}");
    }

    let layout = state.layout();
    let destination = match state.settings.mode {
        ActivationMode::Workshop => layout.source_dir,
        ActivationMode::Pirate => layout.addons_dir,
    };
    let supervisor = AcquisitionSupervisor::new(
        state.settings.downloader.clone(),
        state.settings.mode,
        destination,
        state.cancel.clone(),
    )?
    .with_catalog(catalog)
    .with_metadata(metadata);

    let job = TaskContext::scope(channel, supervisor.run_batch(&items)).await;
    Ok(job)
}

pub fn cancel(state: &EngineState) {
    info!("cancellation requested");
    state.cancel.cancel();
}

/// Looks up names for scanned addons that were never resolved, and retries
/// every cached entry that is not `Found`. Returns how many entries changed.
#[instrument(skip(state, channel))]
pub async fn refresh_names(state: &EngineState, channel: StatusSender) -> Result<usize, SError> {
    let reconciler = state.reader();
    let names = state.names.clone();
    let catalog = state.catalog();

    TaskContext::provide(channel, move || -> Result<usize, SError> {
        let scanned: Vec<String> = reconciler.scan()?.addons.into_iter().map(|a| a.id).collect();
        let targets = names.read().refresh_targets(&scanned);
        if targets.is_empty() {
            debug!("all names resolved");
            return Ok(0);
        }

        debug!("looking up {} names", targets.len());
        let fetched = catalog.fetch_metadata(&targets);
        let resolved = fetched
            .values()
            .filter(|m| m.result == ResultCode::Found)
            .count();

        let mut names = names.write();
        let updated = names.merge(fetched.values());
        names.save()?;
        info!("{} names looked up, {resolved} resolved", targets.len());
        Ok(updated)
    })
    .await?
}
