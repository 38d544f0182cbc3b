//! # auramail-core
//!
//! Mailbox synchronization core for the `AuraMail` webmail client.
//!
//! This crate provides:
//! - Domain models (messages, folders, snapshots)
//! - The [`MailApi`] contract and its HTTP implementation
//! - Folder projection of the two server listings onto five UI folders
//! - Optimistic mutations with rollback and last-write-wins reconciliation
//! - Interval polling with stale-result discard

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod api;
pub mod config;
mod error;
pub mod model;
pub mod sync;

pub use api::{ApiError, AuthToken, Draft, HttpMailApi, LoginSession, MailApi, RawMailboxPage};
pub use config::SyncConfig;
pub use error::{Error, Result};
pub use model::{
    Endpoint, FolderContents, FolderCounts, FolderView, MailboxSnapshot, MailboxView, Message,
    MessageId, Priority, ServerFolder,
};
pub use sync::{
    MailboxSession, MutationError, MutationKind, MutationOutcome, RefreshError, RefreshOutcome,
    SendError,
};
