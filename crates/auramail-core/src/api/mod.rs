//! Contract between the sync core and the remote mail service.
//!
//! The core never reads ambient session state: every call receives the
//! credential explicitly, so the core can be driven by any [`MailApi`]
//! implementation, including in-memory ones in tests.

mod http;

use std::fmt;
use std::future::Future;

pub use http::{HttpMailApi, LoginSession, UserProfile};

use crate::model::{Endpoint, Message, MessageId, Priority, ServerFolder};

/// Errors reported by a [`MailApi`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server rejected the session credential.
    #[error("Unauthorized: session expired")]
    Unauthorized,

    /// The server answered with a failure.
    #[error("Server error{}: {message}", status_suffix(.status))]
    Server {
        /// HTTP status, if the failure came with one.
        status: Option<u16>,
        /// Server-provided description.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Creates a server error from a status and message.
    #[must_use]
    pub fn server(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Whether the session layer has to re-authenticate.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

/// Opaque bearer credential supplied by the session layer.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wraps a bearer token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building request headers.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

/// Full, unfiltered listing returned by one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMailboxPage {
    /// Endpoint the listing came from.
    pub endpoint: Endpoint,
    /// Messages in server order.
    pub messages: Vec<Message>,
}

/// An outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Body, may contain markup.
    pub body: String,
    /// Priority.
    pub priority: Priority,
    /// Sender address.
    pub from: String,
}

impl Draft {
    /// Checks the fields the server requires.
    ///
    /// # Errors
    ///
    /// Returns a description of the first missing field.
    pub fn validate(&self) -> Result<(), String> {
        if self.to.trim().is_empty() {
            return Err("recipient is required".to_string());
        }
        if self.subject.trim().is_empty() {
            return Err("subject is required".to_string());
        }
        Ok(())
    }
}

/// Remote operations the sync core depends on.
pub trait MailApi: Send + Sync + 'static {
    /// Fetches the full listing of an endpoint.
    fn fetch_folder(
        &self,
        endpoint: Endpoint,
        token: &AuthToken,
    ) -> impl Future<Output = Result<RawMailboxPage, ApiError>> + Send;

    /// Stars or unstars a message.
    fn set_starred(
        &self,
        id: MessageId,
        starred: bool,
        token: &AuthToken,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Moves a message to another server folder.
    fn move_message(
        &self,
        id: MessageId,
        target: ServerFolder,
        token: &AuthToken,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Marks a message as read.
    fn mark_read(
        &self,
        id: MessageId,
        token: &AuthToken,
    ) -> impl Future<Output = Result<(), ApiError>> + Send;

    /// Sends a message, returning the id the server assigned.
    fn send_message(
        &self,
        draft: &Draft,
        token: &AuthToken,
    ) -> impl Future<Output = Result<MessageId, ApiError>> + Send;
}
