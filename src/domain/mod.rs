//! Domain layer types for the care portal messaging core.
//!
//! This module contains the records owned by the backend store (threads and
//! messages) and the session identity used when writing them.

mod identity;
mod message;
mod thread;
mod types;

pub use identity::Identity;
pub use message::{Attachment, Message, NewMessage};
pub use thread::{NewThread, Participant, Thread};
pub use types::{MessageId, ThreadId, UserId};
