//! Push channel abstraction.
//!
//! A [`PushListener`] keeps a live connection open and forwards every
//! notification event into the queue the pipeline hands it.  When no
//! listener is active the pipeline's fallback poll carries delivery, so a
//! listener is allowed to fail: it logs, stays inactive, and the poll takes
//! over.
//!
//! Implementations:
//!
//! * [`DisabledPushListener`]: no push endpoint configured; never active.
//! * [`SsePushListener`]: server-sent events over HTTP.

mod sse;

pub use sse::SsePushListener;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::source::Notification;
use crate::state::Credential;

#[async_trait]
pub trait PushListener: Send {
    /// Open the channel for `credential` and forward each event into
    /// `events`, in arrival order.
    ///
    /// Never fails across this boundary: on error the listener logs and
    /// reports itself inactive.  Any previous connection is torn down first.
    async fn connect(&mut self, credential: &Credential, events: mpsc::Sender<Notification>);

    /// Whether the channel is currently delivering events.
    fn is_active(&self) -> bool;

    /// Tear the channel down.  Safe to call repeatedly, and on a listener
    /// that never connected.
    fn disconnect(&mut self);
}

/// Listener used when no push endpoint is configured.
#[derive(Debug, Default)]
pub struct DisabledPushListener;

#[async_trait]
impl PushListener for DisabledPushListener {
    async fn connect(&mut self, _credential: &Credential, _events: mpsc::Sender<Notification>) {
        tracing::debug!("no push endpoint configured");
    }

    fn is_active(&self) -> bool {
        false
    }

    fn disconnect(&mut self) {}
}
