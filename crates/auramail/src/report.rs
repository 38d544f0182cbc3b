//! Logs mailbox view changes.

use auramail_core::{FolderView, MailboxSnapshot, MailboxView, Message, MessageId};
use tracing::{debug, info};

/// Messages listed when a folder's contents change.
const LISTED: usize = 10;

/// Characters of body preview shown per message.
const PREVIEW_CHARS: usize = 60;

/// Remembers what was last reported so only real changes are logged.
#[derive(Debug, Default)]
pub struct ViewReporter {
    query: String,
    folder: Option<FolderView>,
    ids: Option<Vec<MessageId>>,
    selected: Option<MessageId>,
}

impl ViewReporter {
    /// Creates a reporter that lists only messages matching `query`.
    pub fn new(query: String) -> Self {
        Self {
            query,
            ..Self::default()
        }
    }

    fn listed<'a>(&'a self, snapshot: &'a MailboxSnapshot) -> Vec<&'a Message> {
        snapshot.search(&self.query).take(LISTED).collect()
    }

    /// Logs whatever changed since the previous view.
    pub fn report(&mut self, view: &MailboxView) {
        if self.folder != Some(view.folder) {
            self.folder = Some(view.folder);
            self.ids = None;
            info!(folder = %view.folder, "Viewing folder");
        }

        let Some(snapshot) = view.contents.snapshot() else {
            debug!(folder = %view.folder, "Loading");
            return;
        };

        let ids: Vec<MessageId> = snapshot.messages.iter().map(|m| m.id).collect();
        if self.ids.as_ref() != Some(&ids) {
            info!(
                folder = %view.folder,
                messages = ids.len(),
                unread = ?view.counts.inbox_unread,
                starred = ?view.counts.starred,
                fetched_at = %snapshot.fetched_at,
                "Mailbox updated"
            );
            let listed = self.listed(snapshot);
            if !self.query.trim().is_empty() {
                info!(query = %self.query, listed = listed.len(), "Filtered listing");
            }
            for message in listed {
                info!(
                    id = %message.id,
                    from = %message.sender,
                    subject = %message.subject,
                    read = message.is_read,
                    starred = message.starred,
                    "  {}",
                    message.preview(PREVIEW_CHARS)
                );
            }
            self.ids = Some(ids);
        }

        if self.selected != view.selected {
            self.selected = view.selected;
            if let Some(message) = view.selected_message() {
                info!(id = %message.id, subject = %message.subject, "Opened message");
            }
        }
    }
}
