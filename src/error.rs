//! Error types for the notification transports and the credentials file.
//!
//! Both enums are caught at a boundary and turned into state: a
//! [`FetchError`] becomes the panel's error line (foreground fetches) or a
//! log record (background fetches), a [`ConfigError`] becomes the `Error`
//! authentication status.  Nothing here is fatal to the process.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to list notifications.
///
/// The `Display` text is user-facing: it ends up verbatim in the panel.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("Failed to fetch notifications: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("Failed to fetch notifications: HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The body was not the expected JSON shape.
    #[error("Failed to fetch notifications: invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The task running the request panicked or was cancelled.
    #[error("Failed to fetch notifications: {0}")]
    Interrupted(#[from] tokio::task::JoinError),
}

/// Failure to read the credentials file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load config: {0}")]
    Parse(#[from] serde_json::Error),
}
