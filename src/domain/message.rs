//! Message domain types.
//!
//! A message is one append-only entry in a thread's log. Messages are written
//! once and never edited or deleted by the portal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Identity, MessageId, UserId};

/// A message as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Identifier, unique within the owning thread.
    pub id: MessageId,
    /// Message text.
    pub content: String,
    /// Author's user id.
    pub sender_id: UserId,
    /// Author's display name at the time of writing.
    pub sender_name: String,
    /// Write time assigned by the backend.
    pub timestamp: DateTime<Utc>,
    /// Files attached to the message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Returns true if the message was written by the given user.
    pub fn is_from(&self, identity: &Identity) -> bool {
        self.sender_id == identity.id
    }
}

/// A message about to be written. The backend assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    /// Message text.
    pub content: String,
    /// Author's user id.
    pub sender_id: UserId,
    /// Author's display name.
    pub sender_name: String,
    /// Files attached to the message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl NewMessage {
    /// Creates a text message authored by `identity`.
    pub fn text(identity: &Identity, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sender_id: identity.id.clone(),
            sender_name: identity.name.clone(),
            attachments: Vec::new(),
        }
    }
}

/// A file linked from a message or thread.
///
/// The file itself lives in object storage; only its retrievable URL is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Display file name.
    pub name: String,
    /// Retrievable URL.
    pub url: String,
    /// MIME type or coarse kind (e.g. "application/pdf").
    #[serde(rename = "type")]
    pub kind: String,
}
