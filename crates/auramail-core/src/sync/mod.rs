//! Mailbox synchronization.
//!
//! Keeps a per-folder view of the mailbox consistent with a remote service
//! that only lists two endpoints, has to be polled, and is mutated
//! optimistically before it confirms.

mod coordinator;
pub mod mutation;
pub mod projector;
pub mod scheduler;
pub mod selection;
mod session;
pub mod store;

pub use mutation::{Mutation, MutationError, MutationKind, MutationOutcome, PendingMutation};
pub use scheduler::SyncScheduler;
pub use session::{MailboxSession, RefreshError, RefreshOutcome, SendError};
pub use store::{DiscardReason, FetchOutcome, SnapshotStore};
