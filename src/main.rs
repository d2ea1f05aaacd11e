//! codeinbox-panel: a live CodeInbox notification panel for the terminal.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌───────────┐ auth  ┌─────────────┐ list/loading/error ┌──────────┐
//! │ config.rs │ ────► │  state.rs   │ ◄───────────────── │ pipeline │
//! │ (watcher) │       │ SharedState │ ─── auth watch ──► │  (task)  │
//! └───────────┘       └─────────────┘                    └──────────┘
//!                           │ snapshot                    ▲   ▲
//!                           ▼                     fetch   │   │ push events
//!                     ┌──────────┐  draw()  ┌───────┐ source/  push/
//!                     │  app.rs  │ ───────► │ ui.rs │
//!                     └──────────┘          └───────┘
//!                           ▲ handle_key_event()
//!                     ┌──────────┐
//!                     │ input.rs │
//!                     └──────────┘
//! ```
//!
//! * **`source/`**: the `Fetcher` trait, the `Notification` type, and the
//!   MagicBell list endpoint.
//! * **`push/`**: the `PushListener` trait and its implementations.
//! * **`reconcile`**: change detection and push-event merging.
//! * **`pipeline`**: decides when to fetch, when to poll, and what to write.
//! * **`state`**: the shared store the pipeline writes and the panel reads.
//! * **`config`**: loads and watches the credentials file.
//! * **`app`** / **`ui`** / **`input`**: the terminal panel.
//! * **`main`**: wires everything together and runs the event loop.

mod app;
mod config;
mod error;
mod input;
mod pipeline;
mod push;
mod reconcile;
mod source;
mod state;
mod ui;

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::runtime::Runtime;
use tracing::info;
use tracing_subscriber::EnvFilter;

use app::App;
use config::{ConfigManager, WATCH_INTERVAL};
use pipeline::{Pipeline, PipelineConfig, PipelineHandle, FALLBACK_POLL_INTERVAL};
use push::{DisabledPushListener, PushListener, SsePushListener};
use source::{MagicBellFetcher, DEFAULT_API_HOST, DEFAULT_LIMIT};
use state::SharedState;

/// How often the status bar asks the pipeline for its connection status.
const STATUS_REFRESH: Duration = Duration::from_secs(1);

#[derive(Debug, Parser)]
#[command(name = "codeinbox-panel", version, about = "Live CodeInbox notifications in the terminal")]
struct Cli {
    /// Credentials file written by `codeinbox login`
    /// [default: ~/.codeinbox/config.json]
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Notification API host
    #[arg(long, env = "API_HOST", default_value = DEFAULT_API_HOST)]
    api_host: String,

    /// Server-sent-events endpoint for live delivery; without it the panel
    /// relies on fallback polling
    #[arg(long, env = "CODEINBOX_PUSH_URL")]
    push_url: Option<String>,

    /// Number of notifications to fetch
    #[arg(long, default_value_t = DEFAULT_LIMIT)]
    limit: usize,

    /// Fallback poll period in seconds, used while live delivery is down
    #[arg(long, default_value_t = FALLBACK_POLL_INTERVAL.as_secs())]
    fallback_secs: u64,

    /// Log file [default: ~/.codeinbox/panel.log]
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// RAII terminal guard
// ---------------------------------------------------------------------------

/// Manages terminal raw-mode and alternate-screen lifetime via [`Drop`].
///
/// Constructing this struct enters raw mode + alternate screen.  When the
/// value is dropped (normally or during stack unwinding) it restores the
/// terminal.
struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
}

impl TerminalGuard {
    fn new() -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Install a panic hook that restores the terminal before printing the
/// panic message.
fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(info);
    }));
}

/// Send `tracing` output to a file; the terminal belongs to the UI.
///
/// `RUST_LOG` controls the level, e.g. `RUST_LOG=codeinbox_panel=debug`.
fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("codeinbox_panel=info"));

    tracing_subscriber::fmt()
        .with_writer(Mutex::new(file))
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .init();
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();

    let codeinbox_dir = dirs::home_dir().map(|home| home.join(".codeinbox"));
    let config_path = cli
        .config
        .clone()
        .or_else(ConfigManager::default_path)
        .context("cannot determine home directory, pass --config")?;
    let log_path = cli
        .log_file
        .clone()
        .or_else(|| codeinbox_dir.map(|dir| dir.join("panel.log")))
        .context("cannot determine home directory, pass --log-file")?;

    init_logging(&log_path)?;
    install_panic_hook();
    let manager = ConfigManager::new(config_path);
    info!(config = %manager.path().display(), api_host = %cli.api_host, "starting panel");

    let runtime = Runtime::new().context("cannot start async runtime")?;
    let _enter = runtime.enter();

    // -- store, credentials, pipeline ----------------------------------------
    let state = Arc::new(SharedState::new());
    let watcher = manager.clone().watch(Arc::clone(&state), WATCH_INTERVAL);
    manager.initialize(&state);

    let fetcher = Arc::new(
        MagicBellFetcher::new(cli.api_host.clone(), cli.limit)
            .context("cannot build HTTP client")?,
    );
    let push: Box<dyn PushListener> = match &cli.push_url {
        Some(url) => Box::new(
            SsePushListener::new(url.clone()).context("cannot build push client")?,
        ),
        None => Box::new(DisabledPushListener),
    };
    let pipeline_config = PipelineConfig {
        fallback_interval: Duration::from_secs(cli.fallback_secs.max(1)),
        ..PipelineConfig::default()
    };
    let (handle, pipeline_task) =
        Pipeline::new(Arc::clone(&state), fetcher, push, pipeline_config).spawn();

    // -- terminal ------------------------------------------------------------
    let result = run_panel(&runtime, &state, &handle);

    runtime.block_on(async {
        handle.shutdown().await;
        let _ = pipeline_task.await;
    });
    watcher.abort();
    info!("panel closed");
    result
}

/// The main event loop.
///
/// Runs at ~10 fps (100 ms tick).  Each iteration:
///   1. Snapshot the store (and, once a second, the pipeline status).
///   2. Render the UI.
///   3. Poll for keyboard input (non-blocking, up to tick_rate).
fn run_panel(runtime: &Runtime, state: &SharedState, handle: &PipelineHandle) -> Result<()> {
    let mut guard = TerminalGuard::new()?;
    let mut app = App::new();
    let tick_rate = Duration::from_millis(100);
    let mut status_checked: Option<Instant> = None;

    loop {
        // 1. Snapshot
        app.sync(state.auth(), state.panel());
        if status_checked.map_or(true, |at| at.elapsed() >= STATUS_REFRESH) {
            let status = runtime.block_on(async {
                tokio::time::timeout(Duration::from_millis(50), handle.status())
                    .await
                    .ok()
                    .flatten()
            });
            app.connection = status.or(app.connection);
            status_checked = Some(Instant::now());
        }

        // 2. Render
        guard.terminal.draw(|f| ui::draw(&mut app, f))?;

        // 3. Handle input
        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                input::handle_key_event(&mut app, key);
            }
        }

        if app.take_refresh() {
            handle.request_fetch();
        }
        if app.quit {
            break;
        }
    }

    // `guard` is dropped here, restoring the terminal.
    Ok(())
}
