//! Snapshot and view models published to observers.

use chrono::{DateTime, Utc};

use super::folder::FolderView;
use super::message::{Message, MessageId};

/// The contents of one folder as of the last fetch or mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxSnapshot {
    /// Folder this snapshot was produced for.
    pub folder: FolderView,
    /// Messages in server listing order.
    pub messages: Vec<Message>,
    /// When the underlying listing was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl MailboxSnapshot {
    /// Looks up a message by id.
    #[must_use]
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Whether the snapshot contains the message.
    #[must_use]
    pub fn contains(&self, id: MessageId) -> bool {
        self.get(id).is_some()
    }

    /// Messages matching a search query, in listing order.
    pub fn search<'a>(&'a self, query: &'a str) -> impl Iterator<Item = &'a Message> + 'a {
        self.messages.iter().filter(move |m| m.matches_query(query))
    }
}

/// Folder contents, distinguishing "never loaded" from "loaded and empty".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FolderContents {
    /// No fetch for this folder session has landed yet.
    #[default]
    NotLoaded,
    /// At least one fetch landed.
    Loaded(MailboxSnapshot),
}

impl FolderContents {
    /// The loaded snapshot, if any.
    #[must_use]
    pub const fn snapshot(&self) -> Option<&MailboxSnapshot> {
        match self {
            Self::NotLoaded => None,
            Self::Loaded(snapshot) => Some(snapshot),
        }
    }

    /// Whether a loading indicator should be shown.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::NotLoaded)
    }
}

/// Sidebar badge counts. `None` means the count is not known yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FolderCounts {
    /// Unread messages in the inbox.
    pub inbox_unread: Option<usize>,
    /// Starred messages.
    pub starred: Option<usize>,
    /// Sent messages.
    pub sent: Option<usize>,
    /// Archived messages.
    pub archive: Option<usize>,
    /// Deleted messages.
    pub trash: Option<usize>,
}

impl FolderCounts {
    /// Count shown next to a folder.
    #[must_use]
    pub const fn for_folder(&self, folder: FolderView) -> Option<usize> {
        match folder {
            FolderView::Inbox => self.inbox_unread,
            FolderView::Starred => self.starred,
            FolderView::Sent => self.sent,
            FolderView::Archive => self.archive,
            FolderView::Trash => self.trash,
        }
    }
}

/// Everything an observer needs to render the mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MailboxView {
    /// Folder the user is looking at.
    pub folder: FolderView,
    /// What is known about that folder.
    pub contents: FolderContents,
    /// Currently open message.
    pub selected: Option<MessageId>,
    /// Sidebar counts.
    pub counts: FolderCounts,
    /// Whether a fetch for the active folder is outstanding.
    pub refreshing: bool,
    /// Set once the server rejected the session credential.
    pub session_expired: bool,
}

impl MailboxView {
    /// Messages currently displayed, empty while not loaded.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        self.contents
            .snapshot()
            .map_or(&[], |snapshot| snapshot.messages.as_slice())
    }

    /// The open message, if it is present in the view.
    #[must_use]
    pub fn selected_message(&self) -> Option<&Message> {
        let id = self.selected?;
        self.contents.snapshot()?.get(id)
    }
}
