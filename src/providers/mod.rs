//! Backend providers.
//!
//! The messaging core talks to its document store only through the
//! [`MessagingBackend`] trait: live ordered subscriptions, one-shot reads and
//! append-only writes.

pub mod store;

pub use store::{BackendError, LocalStore, MessagingBackend, SnapshotSender, Subscription};
