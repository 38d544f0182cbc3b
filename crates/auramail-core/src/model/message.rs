//! Message data model.

use std::fmt;

use chrono::{DateTime, Utc};

use super::folder::ServerFolder;

/// Server-assigned message identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message priority as set by the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Low priority.
    Low,
    /// Normal priority.
    #[default]
    Normal,
    /// High priority.
    High,
}

/// A message as the client knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Stable identifier.
    pub id: MessageId,
    /// Sender address.
    pub sender: String,
    /// Recipient address.
    pub recipient: String,
    /// Message subject.
    pub subject: String,
    /// Message body, may contain markup.
    pub body: String,
    /// Whether the message has been read.
    pub is_read: bool,
    /// Whether the message has attachments.
    pub has_attachments: bool,
    /// When the server received or created the message.
    pub created_at: DateTime<Utc>,
    /// Sender-assigned priority.
    pub priority: Priority,
    /// Whether the user starred the message.
    pub starred: bool,
    /// Server-side location.
    pub folder: ServerFolder,
}

impl Message {
    /// Plain-text preview of the body, with markup tags removed.
    #[must_use]
    pub fn preview(&self, max_chars: usize) -> String {
        let mut text = String::with_capacity(self.body.len().min(max_chars * 4));
        let mut in_tag = false;
        for c in self.body.chars() {
            match c {
                '<' => in_tag = true,
                '>' if in_tag => in_tag = false,
                _ if in_tag => {}
                c if c.is_control() => text.push(' '),
                c => text.push(c),
            }
        }
        truncate_text(text.trim(), max_chars)
    }

    /// Case-insensitive match against subject, addresses and body preview.
    #[must_use]
    pub fn matches_query(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.subject.to_lowercase().contains(&query)
            || self.sender.to_lowercase().contains(&query)
            || self.recipient.to_lowercase().contains(&query)
            || self.preview(usize::MAX).to_lowercase().contains(&query)
    }
}

/// Truncate text to a maximum number of characters.
fn truncate_text(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", truncated.trim_end())
    } else {
        truncated
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Builds an unread, unstarred inbox message with the given id.
    pub fn message(id: u64) -> Message {
        Message {
            id: MessageId(id),
            sender: format!("sender{id}@example.com"),
            recipient: "me@aurafarming.co".to_string(),
            subject: format!("Subject {id}"),
            body: format!("<p>Body of message {id}</p>"),
            is_read: false,
            has_attachments: false,
            created_at: DateTime::from_timestamp(1_700_000_000 + i64::try_from(id).unwrap_or(0), 0)
                .unwrap_or_default(),
            priority: Priority::Normal,
            starred: false,
            folder: ServerFolder::Inbox,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::fixtures::message;

    #[test]
    fn test_preview_strips_markup() {
        let mut msg = message(1);
        msg.body = "<div><b>Hello</b> <i>world</i></div>".to_string();
        assert_eq!(msg.preview(80), "Hello world");
    }

    #[test]
    fn test_preview_truncates() {
        let mut msg = message(1);
        msg.body = "abcdefghij".to_string();
        assert_eq!(msg.preview(4), "abcd...");
        assert_eq!(msg.preview(10), "abcdefghij");
    }

    #[test]
    fn test_matches_query() {
        let mut msg = message(3);
        msg.subject = "Quarterly Report".to_string();
        assert!(msg.matches_query("quarterly"));
        assert!(msg.matches_query("SENDER3@"));
        assert!(msg.matches_query("body of"));
        assert!(msg.matches_query("  "));
        assert!(!msg.matches_query("invoice"));
    }
}
