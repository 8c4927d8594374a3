use addon_keeper_lib::commands::{addons, downloads};
use addon_keeper_lib::config::{data_dir, EngineSettings};
use addon_keeper_lib::core::registry::EngineState;
use addon_keeper_lib::models::addon::{ActivationMode, ScanIssue, ScanOutcome};
use addon_keeper_lib::models::error::SError;
use addon_keeper_lib::models::task::{BatchJob, TaskState};
use addon_keeper_lib::models::task_status::TaskStatus;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeSet;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "addon-keeper", version, about = "Manage Left 4 Dead 2 addons")]
struct Cli {
    /// Game install directory (the one containing left4dead2/).
    #[arg(long, env = "ADDON_KEEPER_GAME_ROOT", global = true)]
    game_root: Option<Utf8PathBuf>,

    #[arg(long, value_enum, global = true)]
    mode: Option<ModeArg>,

    /// Settings file to use instead of the per-user one.
    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Workshop,
    Pirate,
}

impl From<ModeArg> for ActivationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Workshop => ActivationMode::Workshop,
            ModeArg::Pirate => ActivationMode::Pirate,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List addons and their state
    Scan,
    Enable {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    Disable {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    EnableAll,
    DisableAll,
    /// Report expected addons the game will not load
    Resync {
        #[arg(required = true)]
        expected: Vec<String>,
    },
    /// Put the pristine game config back
    RestoreBackup,
    /// Download items or collections through steamcmd
    Download {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Look up missing and placeholder addon names
    RefreshNames,
}

fn init_logging() -> WorkerGuard {
    let log_dir = data_dir().join("logs");
    let file_appender = tracing_appender::rolling::daily(log_dir, "addon-keeper.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    guard
}

fn load_settings(cli: &Cli) -> Result<EngineSettings, SError> {
    let mut settings = match &cli.config {
        Some(path) => EngineSettings::load_path(path)?,
        None => EngineSettings::load()?,
    };
    if let Some(root) = &cli.game_root {
        settings.game_root = root.clone();
    }
    if let Some(mode) = cli.mode {
        settings.mode = mode.into();
    }
    if settings.game_root.as_str().is_empty() {
        return Err(SError::FileOrDirectoryNotFound(
            "game root not configured; pass --game-root".to_string(),
        ));
    }
    Ok(settings)
}

fn print_scan(outcome: &ScanOutcome) {
    for addon in &outcome.addons {
        let flags: String = [
            (addon.archive_present, 'a'),
            (addon.directory_present, 'd'),
            (addon.config_active, 'c'),
        ]
        .iter()
        .map(|(set, c)| if *set { *c } else { '-' })
        .collect();
        println!(
            "{:>12}  {:<8} {}  {}",
            addon.id,
            if addon.enabled() { "enabled" } else { "disabled" },
            flags,
            addon.display_name.as_deref().unwrap_or("")
        );
    }
    for issue in &outcome.issues {
        match issue {
            ScanIssue::Unreadable { path, reason } => println!("unreadable: {path} ({reason})"),
            ScanIssue::PresentButInactive { id } => {
                println!("{id}: content in place but missing from the game config")
            }
        }
    }
}

fn print_batch(job: &BatchJob) {
    for task in &job.tasks {
        match &task.state {
            TaskState::Failed(reason) => println!("{:>12}  failed: {reason}", task.id),
            state => println!("{:>12}  {}  {}", task.id, state.label(), task.name()),
        }
    }
    println!(
        "{} succeeded, {} failed, {} cancelled",
        job.succeeded,
        job.failed,
        job.cancelled()
    );
}

async fn log_status(mut rx: UnboundedReceiver<TaskStatus>) {
    while let Some(status) = rx.recv().await {
        match status {
            TaskStatus::Progress { value, message } => debug!("{value:5.1}% {message}"),
            TaskStatus::Item {
                index,
                total,
                id,
                state,
            } => info!("[{}/{total}] {id} {state}", index + 1),
            TaskStatus::Finished => break,
        }
    }
}

async fn toggle(state: &EngineState, ids: Vec<String>, want: bool) -> bool {
    let mut ok = true;
    for id in ids {
        match addons::set_enabled(state, id.clone(), want).await {
            Ok(outcome) => println!("{id}: {outcome:?}"),
            Err(e) => {
                error!("{id}: {e}");
                ok = false;
            }
        }
    }
    ok
}

async fn toggle_all(state: &EngineState, want: bool) -> Result<bool, SError> {
    let report = addons::set_all_enabled(state, want).await?;
    for (id, result) in &report {
        match result {
            Ok(outcome) => println!("{id}: {outcome:?}"),
            Err(e) => println!("{id}: {e}"),
        }
    }
    Ok(report.values().all(|r| r.is_ok()))
}

async fn run(cli: Cli) -> Result<bool, SError> {
    let settings = load_settings(&cli)?;
    let state = Arc::new(EngineState::new(settings));
    let (tx, rx) = unbounded_channel();
    let printer = tokio::spawn(log_status(rx));

    let ok = match cli.command {
        Command::Scan => {
            let outcome = addons::scan_in_background(&state, tx)
                .await
                .map_err(|e| SError::AsyncRuntimeError(e.to_string()))??;
            print_scan(&outcome);
            true
        }
        Command::Enable { ids } => toggle(&state, ids, true).await,
        Command::Disable { ids } => toggle(&state, ids, false).await,
        Command::EnableAll => toggle_all(&state, true).await?,
        Command::DisableAll => toggle_all(&state, false).await?,
        Command::Resync { expected } => {
            let expected: BTreeSet<String> = expected.into_iter().collect();
            let missing = addons::resync(&state, expected).await?;
            for id in &missing {
                println!("{id}");
            }
            missing.is_empty()
        }
        Command::RestoreBackup => {
            addons::restore_backup(&state).await?;
            true
        }
        Command::Download { ids } => {
            let watcher = state.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    downloads::cancel(&watcher);
                }
            });
            let job = downloads::download(&state, ids, tx).await?;
            print_batch(&job);
            job.failed == 0 && job.cancelled() == 0
        }
        Command::RefreshNames => {
            let updated = downloads::refresh_names(&state, tx).await?;
            println!("{updated} names updated");
            true
        }
    };

    printer.abort();
    Ok(ok)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_logging();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{e}");
            ExitCode::from(2)
        }
    }
}
