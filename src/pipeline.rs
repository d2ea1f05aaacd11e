//! Notification delivery pipeline.
//!
//! Owns the lifecycle of fetching: it starts when authentication is gained,
//! stops when it is lost, runs at most one fetch at a time, merges push
//! events, and polls in the background only while the push channel is down.
//!
//! ```text
//!  auth watch ──┐
//!  commands  ───┤            ┌──────────────┐  set_notifications  ┌─────────┐
//!  push queue ──┼─ select! ─►│   Pipeline   │ ──────────────────► │  store  │
//!  fallback ────┤            │ (one task)   │  set_loading/error  └─────────┘
//!  fetch task ──┘            └──────────────┘
//! ```
//!
//! Everything runs on a single task.  Handlers do not overlap; the only
//! await inside a handler is the push connect call.  The fetch itself runs on
//! a spawned task so the loop keeps servicing triggers while it is pending,
//! and its result comes back through the `select!`.
//!
//! ## For contributors
//!
//! * The in-flight slot is the busy flag: it is checked and filled
//!   synchronously before the fetch task is spawned, so a second request
//!   can never sneak in.  Requests that find it occupied are dropped, not
//!   queued.
//! * Stopping does not abort an in-flight fetch.  Each start bumps
//!   `session`; a result tagged with an older session is discarded.  A
//!   foreground fetch that found the slot held by such a result is
//!   deferred and dispatched as soon as the old result is dropped.
//! * The fallback timer and the push queue are `Option`s owned here and set
//!   to `None` on every stop path.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::error::FetchError;
use crate::push::PushListener;
use crate::reconcile::{apply_push_event, notifications_changed};
use crate::source::{Fetcher, Notification};
use crate::state::{AuthState, AuthStatus, Credential, CredentialSource, NotificationSink};

/// Background poll period while the push channel is down.
pub const FALLBACK_POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);

const PUSH_QUEUE_CAPACITY: usize = 64;
const COMMAND_QUEUE_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub fallback_interval: Duration,
    /// Capacity of the queue between the push listener and the pipeline.
    pub push_queue: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fallback_interval: FALLBACK_POLL_INTERVAL,
            push_queue: PUSH_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Stopped,
    Starting,
    Running { push_active: bool },
    Stopping,
}

/// Foreground fetches drive the loading flag and surface errors; background
/// fetches are silent and write only on change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Foreground,
    Background,
}

/// Diagnostic view of the pipeline, computed on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: PipelineState,
    pub push_active: bool,
    pub fallback_armed: bool,
    pub fetch_in_flight: bool,
}

enum Command {
    Fetch,
    Status(oneshot::Sender<ConnectionStatus>),
    Shutdown,
}

/// Control surface of a spawned [`Pipeline`].
///
/// Dropping every handle shuts the pipeline down.
#[derive(Clone)]
pub struct PipelineHandle {
    commands: mpsc::Sender<Command>,
}

impl PipelineHandle {
    /// Ask for a manual (foreground) fetch.  Returns `false` if the request
    /// could not be queued.
    pub fn request_fetch(&self) -> bool {
        match self.commands.try_send(Command::Fetch) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "manual fetch request not queued");
                false
            }
        }
    }

    /// Current connection status, or `None` once the pipeline has exited.
    pub async fn status(&self) -> Option<ConnectionStatus> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(Command::Status(reply)).await.ok()?;
        rx.await.ok()
    }

    /// Stop delivery and end the pipeline task.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown).await;
    }
}

type FetchResult = Result<Vec<Notification>, FetchError>;

struct InFlight {
    mode: FetchMode,
    session: u64,
    task: JoinHandle<FetchResult>,
}

struct FetchOutcome {
    mode: FetchMode,
    session: u64,
    result: FetchResult,
}

pub struct Pipeline<S> {
    store: Arc<S>,
    fetcher: Arc<dyn Fetcher>,
    push: Box<dyn PushListener>,
    config: PipelineConfig,
    state: PipelineState,
    /// Last authentication status observed, for edge detection.
    last_auth: AuthStatus,
    /// The list as last written to the store.
    notifications: Vec<Notification>,
    in_flight: Option<InFlight>,
    /// A foreground fetch was asked for while the previous session's fetch
    /// still held the slot; it runs once that fetch is discarded.
    deferred_fetch: bool,
    fallback: Option<Interval>,
    push_events: Option<mpsc::Receiver<Notification>>,
    session: u64,
}

impl<S> Pipeline<S>
where
    S: CredentialSource + NotificationSink + 'static,
{
    pub fn new(
        store: Arc<S>,
        fetcher: Arc<dyn Fetcher>,
        push: Box<dyn PushListener>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            push,
            config,
            state: PipelineState::Stopped,
            last_auth: AuthStatus::Loading,
            notifications: Vec::new(),
            in_flight: None,
            deferred_fetch: false,
            fallback: None,
            push_events: None,
            session: 0,
        }
    }

    /// Run the pipeline on its own task.
    ///
    /// If the store is already authenticated the start sequence runs
    /// immediately.
    pub fn spawn(self) -> (PipelineHandle, JoinHandle<()>) {
        let (commands, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        let auth = self.store.watch_auth();
        let task = tokio::spawn(self.run(auth, rx));
        (PipelineHandle { commands }, task)
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        ConnectionStatus {
            state: self.state,
            push_active: self.push.is_active(),
            fallback_armed: self.fallback.is_some(),
            fetch_in_flight: self.in_flight.is_some(),
        }
    }

    async fn run(mut self, mut auth: watch::Receiver<AuthState>, mut commands: mpsc::Receiver<Command>) {
        let initial = auth.borrow_and_update().status;
        self.on_auth_status(initial).await;

        loop {
            tokio::select! {
                changed = auth.changed() => {
                    if changed.is_err() {
                        info!("authentication source closed");
                        break;
                    }
                    let status = auth.borrow_and_update().status;
                    self.on_auth_status(status).await;
                }
                command = commands.recv() => match command {
                    Some(Command::Fetch) => self.fetch_now().await,
                    Some(Command::Status(reply)) => {
                        let _ = reply.send(self.connection_status());
                    }
                    Some(Command::Shutdown) | None => break,
                },
                outcome = fetch_outcome(&mut self.in_flight) => {
                    self.in_flight = None;
                    self.finish_fetch(outcome);
                }
                event = next_push_event(&mut self.push_events) => match event {
                    Some(notification) => self.on_push_event(notification),
                    None => {
                        debug!("push queue closed");
                        self.push_events = None;
                    }
                },
                () = next_tick(&mut self.fallback) => self.on_fallback_tick().await,
            }
        }

        self.stop();
        info!("notification pipeline shut down");
    }

    // -- lifecycle -----------------------------------------------------------

    async fn on_auth_status(&mut self, status: AuthStatus) {
        let was_authenticated = self.last_auth == AuthStatus::Authenticated;
        let is_authenticated = status == AuthStatus::Authenticated;
        self.last_auth = status;

        match (was_authenticated, is_authenticated) {
            (false, true) => self.start().await,
            (true, false) => self.stop(),
            _ => trace!(?status, "no delivery transition"),
        }
    }

    async fn start(&mut self) {
        self.state = PipelineState::Starting;
        self.session += 1;
        info!(session = self.session, "starting notification delivery");

        let Some(credential) = self.store.credential() else {
            info!("no credential available, delivery not started");
            self.state = PipelineState::Stopped;
            return;
        };

        self.dispatch_fetch(FetchMode::Foreground);
        self.connect_push(&credential).await;
        self.arm_fallback();
        self.state = PipelineState::Running {
            push_active: self.push.is_active(),
        };
    }

    /// Release push and timer resources and clear the list.  Safe to call in
    /// any state.
    fn stop(&mut self) {
        if self.state != PipelineState::Stopped {
            info!(session = self.session, "stopping notification delivery");
        }
        self.state = PipelineState::Stopping;
        self.session += 1;
        self.deferred_fetch = false;

        self.push.disconnect();
        self.push_events = None;
        self.fallback = None;

        self.notifications.clear();
        self.store.set_notifications(Vec::new());
        self.state = PipelineState::Stopped;
    }

    fn is_live(&self) -> bool {
        matches!(
            self.state,
            PipelineState::Starting | PipelineState::Running { .. }
        )
    }

    async fn connect_push(&mut self, credential: &Credential) {
        let (events, rx) = mpsc::channel(self.config.push_queue);
        self.push.connect(credential, events).await;
        self.push_events = Some(rx);

        if self.push.is_active() {
            info!("push channel active");
        } else {
            info!(
                interval_secs = self.config.fallback_interval.as_secs(),
                "push channel unavailable, relying on fallback polling"
            );
        }
    }

    fn arm_fallback(&mut self) {
        let period = self.config.fallback_interval;
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.fallback = Some(interval);
    }

    // -- triggers ------------------------------------------------------------

    /// Manual refresh.  A stopped pipeline with a usable credential runs the
    /// full start sequence instead, since results would otherwise be
    /// discarded.
    async fn fetch_now(&mut self) {
        if self.store.auth_status() != AuthStatus::Authenticated {
            info!("cannot fetch, not authenticated");
            return;
        }
        if self.state == PipelineState::Stopped {
            self.start().await;
            return;
        }
        self.dispatch_fetch(FetchMode::Foreground);
    }

    async fn on_fallback_tick(&mut self) {
        let push_active = self.push.is_active();
        self.state = PipelineState::Running { push_active };
        if push_active {
            trace!("push channel live, skipping fallback poll");
            return;
        }
        if self.store.auth_status() != AuthStatus::Authenticated {
            return;
        }

        self.dispatch_fetch(FetchMode::Background);

        if let Some(credential) = self.store.credential() {
            self.connect_push(&credential).await;
            self.state = PipelineState::Running {
                push_active: self.push.is_active(),
            };
        }
    }

    fn on_push_event(&mut self, notification: Notification) {
        if !self.is_live() {
            debug!(id = %notification.id, "dropping push event, delivery stopped");
            return;
        }
        debug!(id = %notification.id, "push event");
        apply_push_event(&mut self.notifications, notification);
        self.store.set_notifications(self.notifications.clone());
    }

    // -- fetching ------------------------------------------------------------

    /// Spawn a fetch unless one is already in flight.  Returns whether a
    /// fetch was started.
    fn dispatch_fetch(&mut self, mode: FetchMode) -> bool {
        if let Some(in_flight) = &self.in_flight {
            if mode == FetchMode::Foreground && in_flight.session != self.session {
                info!("previous session's fetch still pending, deferring");
                self.deferred_fetch = true;
                self.store.set_loading(true);
            } else {
                info!(?mode, "fetch already in progress, skipping");
            }
            return false;
        }
        let Some(credential) = self.store.credential() else {
            debug!(?mode, "no credential, skipping fetch");
            return false;
        };

        if mode == FetchMode::Foreground {
            self.store.set_loading(true);
        }
        debug!(?mode, source = self.fetcher.name(), "fetching notifications");

        let fetcher = Arc::clone(&self.fetcher);
        let task = tokio::spawn(async move { fetcher.fetch(&credential).await });
        self.in_flight = Some(InFlight {
            mode,
            session: self.session,
            task,
        });
        true
    }

    fn finish_fetch(&mut self, outcome: FetchOutcome) {
        let FetchOutcome {
            mode,
            session,
            result,
        } = outcome;

        if session != self.session || !self.is_live() {
            debug!(?mode, "discarding fetch result from a stopped session");
            if self.is_live() && std::mem::take(&mut self.deferred_fetch) {
                self.dispatch_fetch(FetchMode::Foreground);
            }
            return;
        }

        match result {
            Ok(incoming) => {
                let changed = notifications_changed(&self.notifications, &incoming);
                match mode {
                    FetchMode::Foreground => {
                        info!(count = incoming.len(), changed, "fetched notifications (manual)");
                        self.notifications = incoming;
                        self.store.set_error(None);
                        self.store.set_notifications(self.notifications.clone());
                    }
                    FetchMode::Background if changed => {
                        info!(count = incoming.len(), "fetched notifications (background)");
                        self.notifications = incoming;
                        self.store.set_notifications(self.notifications.clone());
                    }
                    FetchMode::Background => debug!("background fetch found no changes"),
                }
            }
            Err(e) => match mode {
                FetchMode::Foreground => {
                    error!(error = %e, "failed to fetch notifications");
                    self.store.set_error(Some(e.to_string()));
                }
                FetchMode::Background => warn!(error = %e, "background fetch failed"),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// select! sources that may be absent
// ---------------------------------------------------------------------------

async fn fetch_outcome(slot: &mut Option<InFlight>) -> FetchOutcome {
    match slot {
        Some(in_flight) => {
            let result = (&mut in_flight.task)
                .await
                .unwrap_or_else(|e| Err(FetchError::from(e)));
            FetchOutcome {
                mode: in_flight.mode,
                session: in_flight.session,
                result,
            }
        }
        None => pending().await,
    }
}

async fn next_push_event(slot: &mut Option<mpsc::Receiver<Notification>>) -> Option<Notification> {
    match slot {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

async fn next_tick(slot: &mut Option<Interval>) {
    match slot {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}
