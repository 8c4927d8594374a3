use crate::config::downloader::DownloaderSettings;
use crate::core::catalog::SteamCatalog;
use crate::core::content_store::is_numeric_id;
use crate::core::download_output::{OutputEvent, OutputParser};
use crate::models::addon::ActivationMode;
use crate::models::catalog::Metadata;
use crate::models::error::SError;
use crate::models::paths::{ARCHIVE_EXT, DISABLED_SUFFIX};
use crate::models::task::{BatchJob, DownloadTask, FailureReason, TaskState};
use crate::models::task_status::TaskStatus;
use crate::utils::context::TaskContext;
use crate::utils::file::FileUtils;
use crate::utils::thread::CancelFlag;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::{Duration, SystemTime};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

/// How long to wait for buffered output once the downloader has exited.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

enum Step<T> {
    Done(T),
    Cancelled,
}

/// What the control loop saw while the downloader ran.
#[derive(Default)]
struct Observed {
    /// Progress lines or byte growth.
    activity: bool,
    /// The tool printed its per-item success line.
    succeeded: bool,
}

/// Keeps the batch-wide progress value monotonic while items report their
/// own 0..1 fraction.
struct BatchProgress {
    index: usize,
    total: usize,
    last: f32,
}

impl BatchProgress {
    fn new(total: usize) -> Self {
        Self {
            index: 0,
            total: total.max(1),
            last: 0.0,
        }
    }

    fn begin(&mut self, index: usize) {
        self.index = index;
    }

    fn report(&mut self, fraction: f32, message: impl Into<String>) {
        let share = 100.0 / self.total as f32;
        let value = (self.index as f32 + fraction.clamp(0.0, 1.0)) * share;
        if value > self.last {
            self.last = value;
            TaskContext::report(TaskStatus::Progress {
                value,
                message: message.into(),
            });
        }
    }
}

/// Drives the external downloader one item at a time.
pub struct AcquisitionSupervisor {
    settings: DownloaderSettings,
    mode: ActivationMode,
    destination: Utf8PathBuf,
    cancel: CancelFlag,
    parser: OutputParser,
    catalog: Option<SteamCatalog>,
    known: BTreeMap<String, Metadata>,
}

impl AcquisitionSupervisor {
    /// `destination` is the workshop source dir in workshop mode and the flat
    /// addons dir in pirate mode.
    pub fn new(
        settings: DownloaderSettings,
        mode: ActivationMode,
        destination: Utf8PathBuf,
        cancel: CancelFlag,
    ) -> Result<Self, SError> {
        Ok(Self {
            settings,
            mode,
            destination,
            cancel,
            parser: OutputParser::new()?,
            catalog: None,
            known: BTreeMap::new(),
        })
    }

    pub fn with_catalog(mut self, catalog: SteamCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Metadata fetched ahead of time; those ids skip the catalog during resolving.
    pub fn with_metadata(mut self, known: BTreeMap<String, Metadata>) -> Self {
        self.known = known;
        self
    }

    /// Downloads `ids` in order. A failed item is recorded and the batch
    /// moves on; cancellation marks the remaining items cancelled.
    pub async fn run_batch(&self, ids: &[String]) -> BatchJob {
        let mut job = BatchJob::new(ids);
        let total = ids.len();
        let mut progress = BatchProgress::new(total);
        info!("starting batch of {total} items");

        for index in 0..total {
            if self.cancel.is_cancelled() {
                for (offset, task) in job.tasks[index..].iter_mut().enumerate() {
                    task.state = TaskState::Cancelled;
                    emit_state(task, index + offset, total);
                }
                break;
            }

            progress.begin(index);
            let task = &mut job.tasks[index];
            self.run_task(task, index, total, &mut progress).await;
            if let TaskState::Failed(reason) = &task.state {
                warn!("{} failed: {reason}", task.id);
            }
            job.record(index);
        }

        TaskContext::report(TaskStatus::Finished);
        info!(
            "batch finished: {} succeeded, {} failed, {} cancelled",
            job.succeeded,
            job.failed,
            job.cancelled()
        );
        job
    }

    async fn run_task(
        &self,
        task: &mut DownloadTask,
        index: usize,
        total: usize,
        progress: &mut BatchProgress,
    ) {
        task.started_at = Some(SystemTime::now());
        if !is_numeric_id(&task.id) {
            let reason = FailureReason::InvalidId(task.id.clone());
            transition(task, TaskState::Failed(reason), index, total);
            return;
        }

        transition(task, TaskState::Resolving, index, total);
        self.resolve(task).await;
        if self.cancel.is_cancelled() {
            transition(task, TaskState::Cancelled, index, total);
            return;
        }

        transition(task, TaskState::Downloading, index, total);
        let saw_activity = match self.download(task, progress).await {
            Ok(Step::Done(observed)) => observed.activity,
            Ok(Step::Cancelled) => {
                transition(task, TaskState::Cancelled, index, total);
                return;
            }
            Err(reason) => {
                transition(task, TaskState::Failed(reason), index, total);
                return;
            }
        };

        transition(task, TaskState::Verifying, index, total);
        let item_dir = self.settings.item_dir(&task.id);
        let state = match self.verify(&item_dir, saw_activity).await {
            Ok(Step::Done(files)) => match self.place(task, &files) {
                Ok(placed) => {
                    info!("{} placed as {placed:?}", task.name());
                    if let Err(e) = std::fs::remove_dir_all(&item_dir) {
                        debug!("could not clear {item_dir}: {e}");
                    }
                    progress.report(1.0, format!("{} done", task.name()));
                    TaskState::Succeeded
                }
                Err(e) => TaskState::Failed(FailureReason::Placement(e.to_string())),
            },
            Ok(Step::Cancelled) => TaskState::Cancelled,
            Err(reason) => TaskState::Failed(reason),
        };
        transition(task, state, index, total);
    }

    async fn resolve(&self, task: &mut DownloadTask) {
        if let Some(meta) = self.known.get(&task.id) {
            apply_metadata(task, meta);
            return;
        }
        let Some(catalog) = self.catalog.clone() else {
            return;
        };
        let id = task.id.clone();
        match tokio::task::spawn_blocking(move || catalog.fetch_single(&id)).await {
            Ok((meta, _)) => apply_metadata(task, &meta),
            Err(e) => warn!("metadata lookup for {} did not complete: {e}", task.id),
        }
    }

    async fn download(
        &self,
        task: &mut DownloadTask,
        progress: &mut BatchProgress,
    ) -> Result<Step<Observed>, FailureReason> {
        let item_dir = self.settings.item_dir(&task.id);
        let staging_dir = self.settings.staging_dir(&task.id);
        if item_dir.exists() {
            debug!("clearing stale download dir {item_dir}");
            let _ = tokio::fs::remove_dir_all(&item_dir).await;
        }

        let mut child = Command::new(&self.settings.binary)
            .args(self.settings.args(&task.id))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FailureReason::Launch(format!("{}: {e}", self.settings.binary)))?;

        let (tx, mut rx) = mpsc::channel::<String>(self.settings.line_queue.max(1));
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, tx);
        }

        let mut ticker = interval(self.settings.tick());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let size_poll = self.settings.size_poll();
        let stall_timeout = self.settings.stall_timeout();

        let downloaded = || FileUtils::dir_size(&item_dir) + FileUtils::dir_size(&staging_dir);
        let mut last_activity = Instant::now();
        let mut last_poll = Instant::now();
        // A partial download left in staging is not growth.
        let mut polled_size = downloaded();
        let mut observed = Observed::default();
        let mut lines_open = true;

        loop {
            tokio::select! {
                status = child.wait() => {
                    let failed_exit = match status {
                        Ok(s) => {
                            task.exit_code = s.code();
                            if s.success() {
                                debug!("downloader exited for {}", task.id);
                                None
                            } else {
                                warn!("downloader exited with {s} for {}", task.id);
                                Some(s.to_string())
                            }
                        }
                        Err(e) => {
                            warn!("waiting on downloader for {} failed: {e}", task.id);
                            None
                        }
                    };
                    // Lines still queued may carry the reason the tool quit.
                    while let Ok(Some(line)) = timeout(DRAIN_TIMEOUT, rx.recv()).await {
                        if let Some(reason) = self.check_line(task, &line, progress, &mut observed) {
                            return Err(reason);
                        }
                    }
                    // A failed exit is only forgiven by an explicit success line.
                    if let Some(status) = failed_exit.filter(|_| !observed.succeeded) {
                        return Err(FailureReason::Exit(status));
                    }
                    return Ok(Step::Done(observed));
                }
                line = rx.recv(), if lines_open => {
                    let Some(line) = line else {
                        lines_open = false;
                        continue;
                    };
                    last_activity = Instant::now();
                    if let Some(reason) = self.check_line(task, &line, progress, &mut observed) {
                        kill(&mut child).await;
                        return Err(reason);
                    }
                }
                _ = ticker.tick() => {
                    if self.cancel.is_cancelled() {
                        info!("cancelling download of {}", task.id);
                        kill(&mut child).await;
                        return Ok(Step::Cancelled);
                    }

                    if last_poll.elapsed() >= size_poll {
                        last_poll = Instant::now();
                        let size = downloaded();
                        if size > polled_size {
                            polled_size = size;
                            observed.activity = true;
                            last_activity = Instant::now();
                            task.bytes_seen = task.bytes_seen.max(size);
                            if let Some(total) = task.total_bytes.filter(|t| *t > 0) {
                                progress.report(
                                    size as f32 / total as f32,
                                    format!("{}: {size} / {total} bytes", task.name()),
                                );
                            }
                        }
                    }

                    let idle = last_activity.elapsed();
                    if idle >= stall_timeout {
                        error!("downloader stalled on {} for {}s", task.id, idle.as_secs());
                        kill(&mut child).await;
                        return Err(FailureReason::Stalled { idle });
                    }
                }
            }
        }
    }

    /// Parses one output line. Returns the failure when it is fatal.
    fn check_line(
        &self,
        task: &mut DownloadTask,
        line: &str,
        progress: &mut BatchProgress,
        observed: &mut Observed,
    ) -> Option<FailureReason> {
        debug!("[{}] {line}", task.id);
        match self.parser.parse(line) {
            OutputEvent::Progress {
                percent,
                done,
                total,
            } => {
                observed.activity = true;
                task.bytes_seen = task.bytes_seen.max(done);
                if total > 0 {
                    task.total_bytes = Some(total);
                }
                progress.report(percent / 100.0, format!("{}: {percent:.1}%", task.name()));
                None
            }
            OutputEvent::Fatal(kind) => {
                error!("fatal downloader output for {}: {line}", task.id);
                Some(FailureReason::Fatal {
                    kind,
                    line: line.trim().to_string(),
                })
            }
            OutputEvent::Succeeded => {
                debug!("downloader reported success for {}", task.id);
                observed.succeeded = true;
                None
            }
            OutputEvent::Other => None,
        }
    }

    /// Waits for content files to show up. The window is short when bytes
    /// moved during the download and long when nothing was ever observed.
    async fn verify(
        &self,
        item_dir: &Utf8Path,
        saw_activity: bool,
    ) -> Result<Step<Vec<Utf8PathBuf>>, FailureReason> {
        let window = self.settings.verify_window(saw_activity);
        let deadline = Instant::now() + window;
        let mut ticker = interval(self.settings.size_poll().max(self.settings.tick()));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!("verifying {item_dir} for up to {}s", window.as_secs());

        loop {
            ticker.tick().await;
            if self.cancel.is_cancelled() {
                return Ok(Step::Cancelled);
            }
            let files =
                FileUtils::find_content_files(item_dir, &self.settings.content_extensions);
            if !files.is_empty() {
                return Ok(Step::Done(files));
            }
            if Instant::now() >= deadline {
                return Err(FailureReason::Timeout { waited: window });
            }
        }
    }

    fn place(&self, task: &DownloadTask, files: &[Utf8PathBuf]) -> Result<Vec<Utf8PathBuf>, SError> {
        std::fs::create_dir_all(&self.destination)?;
        match self.mode {
            ActivationMode::Workshop => {
                let largest = files
                    .iter()
                    .max_by_key(|f| f.metadata().map(|m| m.len()).unwrap_or(0))
                    .ok_or_else(|| SError::FileOrDirectoryNotFound(task.id.clone()))?;
                let target = self.destination.join(format!("{}.{ARCHIVE_EXT}", task.id));
                std::fs::copy(largest, &target)?;
                Ok(vec![target])
            }
            ActivationMode::Pirate => {
                let stem = FileUtils::sanitize_name(task.name(), &task.id);
                files
                    .iter()
                    .map(|file| -> Result<Utf8PathBuf, SError> {
                        let target = FileUtils::unique_destination(
                            &self.destination,
                            &stem,
                            ARCHIVE_EXT,
                            &[DISABLED_SUFFIX],
                        );
                        std::fs::copy(file, &target)?;
                        Ok(target)
                    })
                    .collect()
            }
        }
    }
}

fn apply_metadata(task: &mut DownloadTask, meta: &Metadata) {
    if !meta.is_placeholder() {
        task.display_name = Some(meta.title.clone());
    }
    if task.total_bytes.is_none() {
        task.total_bytes = meta.file_size;
    }
}

fn transition(task: &mut DownloadTask, state: TaskState, index: usize, total: usize) {
    debug!("{} -> {}", task.id, state.label());
    task.state = state;
    emit_state(task, index, total);
}

fn emit_state(task: &DownloadTask, index: usize, total: usize) {
    TaskContext::report(TaskStatus::Item {
        index,
        total,
        id: task.id.clone(),
        state: task.state.label().to_string(),
    });
}

fn spawn_reader<R>(stream: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        // Keep reading when the queue is full so the pipe never backs up.
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(|c: char| c == '\r' || c == '\n')
                        .to_string();
                    if tx.try_send(line).is_err() {
                        trace!("downloader output dropped");
                    }
                }
                Err(e) => {
                    debug!("downloader output closed: {e}");
                    break;
                }
            }
        }
    });
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        debug!("downloader already gone: {e}");
    }
}
