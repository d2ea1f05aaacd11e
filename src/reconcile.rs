//! Reconciling incoming notifications with the list already held.
//!
//! Two pure functions: [`notifications_changed`] decides whether a polled
//! snapshot is worth writing, [`apply_push_event`] folds a single pushed
//! record into the list.

use crate::source::Notification;

/// Whether `incoming` differs observably from `current`.
///
/// Lists differ when their lengths differ or when any positional pair
/// differs in id, `read_at`, or `seen_at`.  Title, content, and category are
/// not compared: this catches read/seen transitions and new arrivals
/// without a deep comparison.
pub fn notifications_changed(current: &[Notification], incoming: &[Notification]) -> bool {
    if current.len() != incoming.len() {
        return true;
    }

    current.iter().zip(incoming).any(|(a, b)| {
        a.id != b.id || a.read_at != b.read_at || a.seen_at != b.seen_at
    })
}

/// Fold one pushed record into `list`: replace in place when the id is
/// already present, otherwise prepend it as the newest entry.
pub fn apply_push_event(list: &mut Vec<Notification>, notification: Notification) {
    match list.iter_mut().find(|n| n.id == notification.id) {
        Some(slot) => *slot = notification,
        None => list.insert(0, notification),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn read(id: &str) -> Notification {
        Notification {
            read_at: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
            ..Notification::new(id, id)
        }
    }

    fn ids(list: &[Notification]) -> Vec<&str> {
        list.iter().map(|n| n.id.as_str()).collect()
    }

    // -- notifications_changed ----------------------------------------------

    #[test]
    fn read_transition_is_a_change() {
        let a = vec![Notification::new("1", "one")];
        let b = vec![read("1")];
        assert!(notifications_changed(&a, &b));
    }

    #[test]
    fn seen_transition_is_a_change() {
        let a = vec![Notification::new("1", "one")];
        let b = vec![Notification {
            seen_at: Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
            ..Notification::new("1", "one")
        }];
        assert!(notifications_changed(&a, &b));
    }

    #[test]
    fn identical_lists_are_unchanged() {
        let a = vec![Notification::new("1", "one")];
        let b = vec![Notification::new("1", "one")];
        assert!(!notifications_changed(&a, &b));
        assert!(!notifications_changed(&[], &[]));
    }

    #[test]
    fn length_difference_is_always_a_change() {
        let a = vec![Notification::new("1", "one")];
        let b = vec![Notification::new("1", "one"), Notification::new("2", "two")];
        assert!(notifications_changed(&a, &b));
        assert!(notifications_changed(&b, &a));
        assert!(notifications_changed(&a, &[]));
    }

    #[test]
    fn content_only_edits_are_ignored() {
        let a = vec![Notification::new("1", "one")];
        let b = vec![Notification {
            content: Some("edited".into()),
            category: Some("build".into()),
            ..Notification::new("1", "renamed")
        }];
        assert!(!notifications_changed(&a, &b));
    }

    #[test]
    fn order_matters() {
        let a = vec![Notification::new("1", "one"), Notification::new("2", "two")];
        let b = vec![Notification::new("2", "two"), Notification::new("1", "one")];
        assert!(notifications_changed(&a, &b));
    }

    // -- apply_push_event ----------------------------------------------------

    #[test]
    fn known_id_is_replaced_in_place() {
        let mut list = vec![Notification::new("2", "two"), Notification::new("1", "one")];

        apply_push_event(&mut list, read("1"));

        assert_eq!(ids(&list), ["2", "1"]);
        assert!(!list[1].is_unread());
    }

    #[test]
    fn unknown_id_is_prepended() {
        let mut list = vec![Notification::new("2", "two"), Notification::new("1", "one")];

        apply_push_event(&mut list, Notification::new("3", "three"));

        assert_eq!(ids(&list), ["3", "2", "1"]);
    }

    #[test]
    fn push_into_empty_list() {
        let mut list = Vec::new();
        apply_push_event(&mut list, Notification::new("1", "one"));
        assert_eq!(ids(&list), ["1"]);
    }
}
