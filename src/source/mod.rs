//! Notification source abstraction layer.
//!
//! This module defines the [`Fetcher`] trait and the common [`Notification`]
//! type.  Concrete implementations live in sub-modules (currently only
//! [`magicbell`]).
//!
//! ## For contributors: adding a new source
//!
//! 1. Create a new file in this directory (e.g. `github.rs`).
//! 2. Define a struct holding the transport configuration and implement
//!    [`Fetcher`] for it.
//! 3. Add `mod github;` below and re-export your struct in the `pub use` block.
//! 4. Construct it in `main.rs` instead of [`MagicBellFetcher`].
//!
//! The pipeline, change detection, and the panel only see this trait.

mod magicbell;
mod notification;

pub use magicbell::{MagicBellFetcher, DEFAULT_API_HOST, DEFAULT_LIMIT};
pub use notification::Notification;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::state::Credential;

/// Lists the most recent notifications for a credential.
///
/// The pipeline runs [`fetch()`](Fetcher::fetch) on a spawned task, so
/// implementations must be `Send + Sync` and must not keep per-call state.
///
/// ## Implementing a new source
///
/// ```ignore
/// pub struct CannedFetcher(Vec<Notification>);
///
/// #[async_trait]
/// impl Fetcher for CannedFetcher {
///     fn name(&self) -> &str { "canned" }
///
///     async fn fetch(&self, _: &Credential) -> Result<Vec<Notification>, FetchError> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Human-readable label used in log records.
    fn name(&self) -> &str;

    /// Fetch the latest notifications, newest first.
    async fn fetch(&self, credential: &Credential) -> Result<Vec<Notification>, FetchError>;
}
