//! User-initiated mutations and their bookkeeping types.

use std::fmt;

use crate::api::ApiError;
use crate::model::{Message, MessageId, ServerFolder};

/// Category of a mutation. At most one mutation per message and kind is
/// pending at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Star or unstar.
    SetStarred,
    /// Mark as read.
    MarkRead,
    /// Move to another server folder.
    MoveToFolder,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SetStarred => "setStarred",
            Self::MarkRead => "markRead",
            Self::MoveToFolder => "moveToFolder",
        })
    }
}

/// A change to one message, carrying the value it sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// Set the starred flag.
    SetStarred(bool),
    /// Set the read flag.
    MarkRead,
    /// Move to a server folder.
    MoveTo(ServerFolder),
}

impl Mutation {
    /// Category used for supersession.
    #[must_use]
    pub const fn kind(self) -> MutationKind {
        match self {
            Self::SetStarred(_) => MutationKind::SetStarred,
            Self::MarkRead => MutationKind::MarkRead,
            Self::MoveTo(_) => MutationKind::MoveToFolder,
        }
    }

    /// Writes the value into a message.
    pub fn apply(self, message: &mut Message) {
        match self {
            Self::SetStarred(starred) => message.starred = starred,
            Self::MarkRead => message.is_read = true,
            Self::MoveTo(folder) => message.folder = folder,
        }
    }

    /// Whether the message already carries the value.
    #[must_use]
    pub fn is_reflected_in(self, message: &Message) -> bool {
        match self {
            Self::SetStarred(starred) => message.starred == starred,
            Self::MarkRead => message.is_read,
            Self::MoveTo(folder) => message.folder == folder,
        }
    }
}

/// A mutation applied locally and not yet resolved by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingMutation {
    /// Target message.
    pub message_id: MessageId,
    /// Optimistic value.
    pub mutation: Mutation,
    /// Issue order, unique per store.
    pub sequence: u64,
}

impl PendingMutation {
    /// Key under which the mutation is tracked.
    #[must_use]
    pub const fn key(&self) -> (MessageId, MutationKind) {
        (self.message_id, self.mutation.kind())
    }
}

/// What a mutation call ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The server confirmed the change.
    Confirmed,
    /// The change was applied locally; the server call runs in the background.
    Issued,
    /// The message already had the value, nothing was sent.
    Unchanged,
    /// A newer mutation of the same kind replaced this one before it resolved.
    Superseded,
}

/// A mutation that failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    /// The server call failed and the optimistic change was rolled back.
    #[error("{kind} failed for message {message_id}: {cause}")]
    Failed {
        /// Mutation kind.
        kind: MutationKind,
        /// Target message.
        message_id: MessageId,
        /// Underlying API failure.
        cause: ApiError,
    },

    /// The message is not part of the folder being displayed.
    #[error("Message {0} is not in the current view")]
    NotInView(MessageId),
}

impl MutationError {
    /// Whether the failure means the session has expired.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::Failed {
                cause: ApiError::Unauthorized,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::message;

    #[test]
    fn test_apply_and_reflect() {
        let mut msg = message(1);
        for mutation in [
            Mutation::SetStarred(true),
            Mutation::MarkRead,
            Mutation::MoveTo(ServerFolder::Trash),
        ] {
            assert!(!mutation.is_reflected_in(&msg));
            mutation.apply(&mut msg);
            assert!(mutation.is_reflected_in(&msg));
        }
        assert!(msg.starred && msg.is_read);
        assert_eq!(msg.folder, ServerFolder::Trash);
    }

    #[test]
    fn test_kind_ignores_value() {
        assert_eq!(
            Mutation::SetStarred(true).kind(),
            Mutation::SetStarred(false).kind()
        );
        assert_eq!(
            Mutation::MoveTo(ServerFolder::Archive).kind(),
            MutationKind::MoveToFolder
        );
    }

    #[test]
    fn test_error_display() {
        let err = MutationError::Failed {
            kind: MutationKind::SetStarred,
            message_id: MessageId(7),
            cause: ApiError::Unauthorized,
        };
        assert_eq!(
            err.to_string(),
            "setStarred failed for message 7: Unauthorized: session expired"
        );
        assert!(err.is_unauthorized());
        assert!(!MutationError::NotInView(MessageId(7)).is_unauthorized());
    }
}
