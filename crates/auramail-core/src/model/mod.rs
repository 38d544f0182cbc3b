//! Domain models shared by the API client and the sync core.

pub mod folder;
pub mod message;
pub mod snapshot;

pub use folder::{Endpoint, FolderView, ServerFolder};
pub use message::{Message, MessageId, Priority};
pub use snapshot::{FolderContents, FolderCounts, MailboxSnapshot, MailboxView};

#[cfg(test)]
pub(crate) use message::fixtures;
