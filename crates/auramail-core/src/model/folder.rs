//! Folder data model.
//!
//! The server knows four physical locations for a message but only lists two
//! of them directly. The UI shows five folders, three of which are virtual.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Where the server stores a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerFolder {
    /// Received mail.
    Inbox,
    /// Sent mail.
    Sent,
    /// Archived mail.
    Archive,
    /// Deleted mail.
    Trash,
}

impl ServerFolder {
    /// Wire name of the folder.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Sent => "sent",
            Self::Archive => "archive",
            Self::Trash => "trash",
        }
    }
}

/// A folder tab as shown to the user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum FolderView {
    /// Received mail still in the inbox.
    #[default]
    Inbox,
    /// Starred mail, wherever it lives.
    Starred,
    /// Sent mail.
    Sent,
    /// Archived mail.
    Archive,
    /// Deleted mail.
    Trash,
}

impl FolderView {
    /// All folders in sidebar order.
    pub const ALL: [Self; 5] = [
        Self::Inbox,
        Self::Starred,
        Self::Sent,
        Self::Archive,
        Self::Trash,
    ];

    /// Identifier used in settings and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Starred => "starred",
            Self::Sent => "sent",
            Self::Archive => "archive",
            Self::Trash => "trash",
        }
    }
}

impl fmt::Display for FolderView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FolderView {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|folder| folder.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidFolder(s.to_string()))
    }
}

/// A listing endpoint the server actually exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Listing of everything that is not sent mail.
    Inbox,
    /// Listing of sent mail.
    Sent,
}

impl Endpoint {
    /// Path segment of the listing.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inbox => "inbox",
            Self::Sent => "sent",
        }
    }
}
