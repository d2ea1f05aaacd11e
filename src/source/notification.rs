//! The notification record shared by every transport.
//!
//! `Notification` is what the list endpoint returns and what the push
//! channel delivers.  Both transports decode the same JSON shape, so the
//! pipeline, the change detector, and the panel never need to know where a
//! record came from.
//!
//! ## For contributors
//!
//! Records are immutable once received.  A later record with the same `id`
//! replaces the earlier one wholesale; nothing merges individual fields.
//! If the upstream API grows a field you want to render, add it here as an
//! `Option` so older payloads keep decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single notification as delivered by the notification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Stable identifier, unique within a list and across fetches.
    pub id: String,

    /// Headline shown in the list.
    #[serde(default)]
    pub title: String,

    /// Body text shown in the detail pane.
    pub content: Option<String>,

    /// Free-form category tag (e.g. `claude-code`, `build`).
    pub category: Option<String>,

    /// When the service sent the notification.
    pub sent_at: Option<DateTime<Utc>>,

    /// When the user read it.  `None` means unread.
    pub read_at: Option<DateTime<Utc>>,

    /// When the user first saw it in any client.
    pub seen_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Bare notification with only an id and a title.
    #[cfg(test)]
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: None,
            category: None,
            sent_at: None,
            read_at: None,
            seen_at: None,
        }
    }

    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
