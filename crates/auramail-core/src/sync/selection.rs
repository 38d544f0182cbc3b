//! Tracks the open message.

use crate::model::{MailboxSnapshot, MessageId};

/// Result of selecting a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selected {
    /// The selected message.
    pub id: MessageId,
    /// Whether the message was unread and needs a mark-read call.
    pub needs_mark_read: bool,
}

/// Holds at most one selected message id, valid only while present in the
/// current snapshot.
#[derive(Debug, Clone, Default)]
pub struct SelectionTracker {
    selected: Option<MessageId>,
}

impl SelectionTracker {
    /// The current selection.
    #[must_use]
    pub const fn selected(&self) -> Option<MessageId> {
        self.selected
    }

    /// Selects a message from the snapshot. Returns `None` if it is not there.
    pub fn select(
        &mut self,
        snapshot: Option<&MailboxSnapshot>,
        id: MessageId,
    ) -> Option<Selected> {
        let message = snapshot?.get(id)?;
        self.selected = Some(id);
        Some(Selected {
            id,
            needs_mark_read: !message.is_read,
        })
    }

    /// Drops the selection.
    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Clears the selection if its message left the snapshot. Returns whether
    /// the selection was cleared.
    pub fn revalidate(&mut self, snapshot: Option<&MailboxSnapshot>) -> bool {
        match self.selected {
            Some(id) if !snapshot.is_some_and(|s| s.contains(id)) => {
                tracing::debug!(message = %id, "Selected message left the view");
                self.selected = None;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::FolderView;
    use crate::model::fixtures::message;

    fn snapshot(ids: &[u64]) -> MailboxSnapshot {
        MailboxSnapshot {
            folder: FolderView::Inbox,
            messages: ids.iter().map(|&id| message(id)).collect(),
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn test_select_unread_requests_mark_read() {
        let mut tracker = SelectionTracker::default();
        let mut snap = snapshot(&[1, 2]);
        let selected = tracker.select(Some(&snap), MessageId(1)).unwrap();
        assert!(selected.needs_mark_read);

        snap.messages[0].is_read = true;
        let selected = tracker.select(Some(&snap), MessageId(1)).unwrap();
        assert!(!selected.needs_mark_read);
        assert_eq!(tracker.selected(), Some(MessageId(1)));
    }

    #[test]
    fn test_select_missing_message() {
        let mut tracker = SelectionTracker::default();
        assert!(tracker.select(Some(&snapshot(&[1])), MessageId(9)).is_none());
        assert!(tracker.select(None, MessageId(1)).is_none());
        assert_eq!(tracker.selected(), None);
    }

    #[test]
    fn test_revalidate() {
        let mut tracker = SelectionTracker::default();
        tracker.select(Some(&snapshot(&[1, 2])), MessageId(2)).unwrap();

        assert!(!tracker.revalidate(Some(&snapshot(&[2, 3]))));
        assert_eq!(tracker.selected(), Some(MessageId(2)));

        assert!(tracker.revalidate(Some(&snapshot(&[3]))));
        assert_eq!(tracker.selected(), None);
    }

    #[test]
    fn test_revalidate_without_snapshot_clears() {
        let mut tracker = SelectionTracker::default();
        tracker.select(Some(&snapshot(&[1])), MessageId(1)).unwrap();
        assert!(tracker.revalidate(None));
        assert!(!tracker.revalidate(None));
    }
}
