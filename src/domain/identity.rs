//! Session identity of the person using the portal.

use serde::{Deserialize, Serialize};

use super::UserId;

/// The signed-in user on whose behalf messages are written.
///
/// Passed explicitly to every writer; there is no process-wide "current user".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// User identifier, stored as the message sender id.
    pub id: UserId,
    /// Display name, stored as the message sender name.
    pub name: String,
}

impl Identity {
    /// Creates a new identity.
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}
