//! Server-sent-events push listener.
//!
//! Opens `GET <url>` with `Accept: text/event-stream` and the bearer token,
//! then forwards every `data:` payload that decodes as a [`Notification`]
//! on a background task.  The listener is active from a successful response
//! until the stream ends, fails, or is torn down.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header, Client, Response};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use super::PushListener;
use crate::source::Notification;
use crate::state::Credential;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on waiting for the response head.  The pipeline awaits the
/// handshake inline, so it must not hang; the event body has no limit.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

pub struct SsePushListener {
    client: Client,
    url: String,
    handshake_timeout: Duration,
    /// Replaced on every connection so a dying stream can never flip the
    /// flag of its successor.
    active: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl SsePushListener {
    pub fn new(url: impl Into<String>) -> reqwest::Result<Self> {
        Self::with_handshake_timeout(url, HANDSHAKE_TIMEOUT)
    }

    pub fn with_handshake_timeout(
        url: impl Into<String>,
        handshake_timeout: Duration,
    ) -> reqwest::Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(handshake_timeout))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            handshake_timeout,
            active: Arc::new(AtomicBool::new(false)),
            task: None,
        })
    }
}

#[async_trait]
impl PushListener for SsePushListener {
    async fn connect(&mut self, credential: &Credential, events: mpsc::Sender<Notification>) {
        self.disconnect();

        let request = self
            .client
            .get(&self.url)
            .bearer_auth(&credential.token)
            .header(header::ACCEPT, "text/event-stream")
            .send();

        let response = match time::timeout(self.handshake_timeout, request).await {
            Ok(response) => response.and_then(Response::error_for_status),
            Err(_) => {
                warn!(
                    url = %self.url,
                    timeout_ms = self.handshake_timeout.as_millis() as u64,
                    "push connection timed out"
                );
                return;
            }
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %self.url, error = %e, "push connection failed");
                return;
            }
        };

        info!(url = %self.url, account = %credential.email, "push channel open");
        let active = Arc::new(AtomicBool::new(true));
        self.active = Arc::clone(&active);
        self.task = Some(tokio::spawn(forward_events(response, events, active)));
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn disconnect(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!(url = %self.url, "push channel closed");
        }
        self.active.store(false, Ordering::SeqCst);
    }
}

impl Drop for SsePushListener {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn forward_events(
    response: Response,
    events: mpsc::Sender<Notification>,
    active: Arc<AtomicBool>,
) {
    let mut stream = response.bytes_stream();
    let mut decoder = EventDecoder::default();

    'stream: while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(error = %e, "push stream failed");
                break;
            }
        };

        for payload in decoder.feed(&chunk) {
            match serde_json::from_str::<Notification>(&payload) {
                Ok(notification) => {
                    if events.send(notification).await.is_err() {
                        debug!("push queue closed, dropping stream");
                        break 'stream;
                    }
                }
                Err(e) => debug!(error = %e, "skipping push payload"),
            }
        }
    }

    active.store(false, Ordering::SeqCst);
    info!("push channel ended");
}

// ---------------------------------------------------------------------------
// Event stream decoding
// ---------------------------------------------------------------------------

/// Incremental `text/event-stream` decoder.
///
/// Feed raw chunks as they arrive; each call returns the `data` payloads of
/// the events completed by that chunk.  Multi-line `data` fields are joined
/// with `\n`.  Other fields and comments are ignored.
#[derive(Debug, Default)]
pub struct EventDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl EventDecoder {
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(end) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            let text = String::from_utf8_lossy(&raw);
            let line = text.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    payloads.push(self.data.join("\n"));
                    self.data.clear();
                }
            } else if let Some(value) = line.strip_prefix("data:") {
                self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
            }
        }
        payloads
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
