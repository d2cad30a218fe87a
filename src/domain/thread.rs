//! Thread domain types.
//!
//! A thread is a conversation with a fixed set of participants and a rolling
//! summary of its most recent message.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Attachment, ThreadId, UserId};

/// A conversation thread as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    /// Stable unique identifier.
    pub id: ThreadId,
    /// Conversation subject.
    pub subject: String,
    /// Preview of the latest message.
    pub last_message: String,
    /// Time of the latest message. Sole sort key of the thread list.
    pub last_message_at: DateTime<Utc>,
    /// People taking part, in display order.
    pub participants: Vec<Participant>,
    /// Documents related to the conversation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Thread {
    /// Ordering used by the thread list: most recent activity first.
    ///
    /// Threads with identical `last_message_at` fall back to ascending id so
    /// the order never depends on backend delivery order.
    pub fn cmp_by_recency(&self, other: &Thread) -> Ordering {
        other
            .last_message_at
            .cmp(&self.last_message_at)
            .then_with(|| self.id.cmp(&other.id))
    }

    /// Participant names joined for list display.
    pub fn participant_names(&self) -> String {
        self.participants
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A person taking part in a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// User identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Role in the facility (e.g. "staff", "family").
    pub role: String,
}

impl Participant {
    /// Creates a new participant.
    pub fn new(id: impl Into<UserId>, name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
        }
    }

    /// First character of the name, used as an avatar placeholder.
    pub fn initial(&self) -> Option<char> {
        self.name.chars().next()
    }
}

/// Parameters for creating a thread through the store's administrative API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewThread {
    /// Conversation subject.
    pub subject: String,
    /// People taking part.
    pub participants: Vec<Participant>,
    /// Related documents.
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}
