//! Document store backends.
//!
//! - [`MessagingBackend`]: the contract every store must implement
//! - [`LocalStore`]: SQLite-backed store with change notifications

mod local;
mod traits;

pub use local::LocalStore;
pub use traits::{BackendError, MessagingBackend, Result, SnapshotSender, Subscription};

#[cfg(test)]
pub use traits::MockMessagingBackend;
