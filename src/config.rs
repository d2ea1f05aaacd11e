//! Credentials file loading and watching.
//!
//! The `codeinbox` CLI writes `~/.codeinbox/config.json` on login.  This
//! module reads it, turns the result into an authentication status on the
//! [`SharedState`], and keeps polling the file so logins and logouts made
//! while the panel is open are picked up.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::state::{Credential, SharedState};

/// How often the watcher checks the file for changes.
pub const WATCH_INTERVAL: Duration = Duration::from_secs(1);

/// Contents of the credentials file.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeInboxConfig {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub jwt: String,
}

impl CodeInboxConfig {
    /// A login has completed: both fields are filled in.
    pub fn is_authenticated(&self) -> bool {
        !self.jwt.is_empty() && !self.email.is_empty()
    }

    pub fn credential(&self) -> Option<Credential> {
        self.is_authenticated().then(|| Credential {
            token: self.jwt.clone(),
            email: self.email.clone(),
        })
    }
}

impl fmt::Debug for CodeInboxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeInboxConfig")
            .field("email", &self.email)
            .field("jwt", &if self.jwt.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
}

impl ConfigManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.codeinbox/config.json`, if a home directory can be determined.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".codeinbox").join("config.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file.  A missing file is `Ok(None)`: the user has simply
    /// not logged in yet.
    pub fn load(&self) -> Result<Option<CodeInboxConfig>, ConfigError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Put the store in `Loading`, then apply the file's current contents.
    pub fn initialize(&self, state: &SharedState) {
        state.set_auth_loading();
        apply_config(state, self.load());
    }

    /// Poll the file every `period` and re-apply it whenever its size or
    /// modification time changes (including creation and deletion).
    pub fn watch(self, state: Arc<SharedState>, period: Duration) -> JoinHandle<()> {
        let mut last = Fingerprint::of(&self.path);

        tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let current = Fingerprint::of(&self.path);
                if current == last {
                    continue;
                }
                last = current;
                debug!(path = %self.path.display(), "config file changed");
                apply_config(&state, self.load());
            }
        })
    }
}

/// Translate a load result into an authentication status.
pub fn apply_config(state: &SharedState, loaded: Result<Option<CodeInboxConfig>, ConfigError>) {
    match loaded {
        Ok(Some(config)) => match config.credential() {
            Some(credential) => {
                info!(email = %credential.email, "user authenticated");
                state.set_auth_authenticated(credential);
            }
            None => {
                info!("config has no login, user unauthenticated");
                state.set_auth_unauthenticated();
            }
        },
        Ok(None) => {
            info!("no config found, user unauthenticated");
            state.set_auth_unauthenticated();
        }
        Err(e) => {
            warn!(error = %e, "authentication error");
            state.set_auth_error(e.to_string());
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

impl Fingerprint {
    fn of(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        Some(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
