//! Shared state: authentication on one side, notification results on the
//! other.
//!
//! The pipeline never touches a global.  It receives an `Arc` of something
//! implementing [`CredentialSource`] (read side) and [`NotificationSink`]
//! (write side).  [`SharedState`] is the in-process implementation: two
//! `tokio::sync::watch` channels that the config watcher, the pipeline, and
//! the panel all hold on to.
//!
//! ## For contributors
//!
//! Keep the two traits narrow.  The pipeline is the only writer of the
//! notification fields and never writes authentication fields; if you need
//! a new setter, ask whether the pipeline really owns that data.

use std::fmt;

use tokio::sync::watch;

use crate::source::Notification;

/// Bearer token plus the account it belongs to.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub email: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("email", &self.email)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStatus {
    #[default]
    Loading,
    Authenticated,
    Unauthenticated,
    Error,
}

/// Authentication half of the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub status: AuthStatus,
    pub credential: Option<Credential>,
    /// Set only while `status` is [`AuthStatus::Error`].
    pub error: Option<String>,
}

/// Notification half of the store, as the panel renders it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PanelState {
    pub notifications: Vec<Notification>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Read access to authentication.
pub trait CredentialSource: Send + Sync {
    fn auth_status(&self) -> AuthStatus;

    /// The current credential, read fresh on every call.
    fn credential(&self) -> Option<Credential>;

    /// Subscribe to authentication changes.
    fn watch_auth(&self) -> watch::Receiver<AuthState>;
}

/// Write access to the notification fields.
pub trait NotificationSink: Send + Sync {
    /// Replace the list.  Also clears the loading flag.
    fn set_notifications(&self, notifications: Vec<Notification>);

    fn set_loading(&self, loading: bool);

    /// Replace the error line.  Also clears the loading flag.
    fn set_error(&self, error: Option<String>);
}

/// In-process store backed by `watch` channels.
pub struct SharedState {
    auth: watch::Sender<AuthState>,
    panel: watch::Sender<PanelState>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            auth: watch::Sender::new(AuthState::default()),
            panel: watch::Sender::new(PanelState::default()),
        }
    }

    // -- authentication actions ----------------------------------------------

    pub fn set_auth_loading(&self) {
        self.auth.send_modify(|auth| {
            auth.status = AuthStatus::Loading;
            auth.error = None;
        });
    }

    pub fn set_auth_authenticated(&self, credential: Credential) {
        self.auth.send_replace(AuthState {
            status: AuthStatus::Authenticated,
            credential: Some(credential),
            error: None,
        });
    }

    pub fn set_auth_unauthenticated(&self) {
        self.auth.send_replace(AuthState {
            status: AuthStatus::Unauthenticated,
            credential: None,
            error: None,
        });
    }

    /// Keeps the previous credential, as the status already says it is not
    /// usable.
    pub fn set_auth_error(&self, error: impl Into<String>) {
        let error = error.into();
        self.auth.send_modify(|auth| {
            auth.status = AuthStatus::Error;
            auth.error = Some(error);
        });
    }

    // -- snapshots -----------------------------------------------------------

    pub fn auth(&self) -> AuthState {
        self.auth.borrow().clone()
    }

    pub fn panel(&self) -> PanelState {
        self.panel.borrow().clone()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialSource for SharedState {
    fn auth_status(&self) -> AuthStatus {
        self.auth.borrow().status
    }

    /// Only an authenticated store hands out a credential, and only one with
    /// both fields filled in.
    fn credential(&self) -> Option<Credential> {
        let auth = self.auth.borrow();
        if auth.status != AuthStatus::Authenticated {
            return None;
        }
        auth.credential
            .as_ref()
            .filter(|c| !c.token.is_empty() && !c.email.is_empty())
            .cloned()
    }

    fn watch_auth(&self) -> watch::Receiver<AuthState> {
        self.auth.subscribe()
    }
}

impl NotificationSink for SharedState {
    fn set_notifications(&self, notifications: Vec<Notification>) {
        self.panel.send_modify(|panel| {
            panel.notifications = notifications;
            panel.loading = false;
        });
    }

    fn set_loading(&self, loading: bool) {
        self.panel.send_modify(|panel| panel.loading = loading);
    }

    fn set_error(&self, error: Option<String>) {
        self.panel.send_modify(|panel| {
            panel.error = error;
            panel.loading = false;
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
