//! Document store trait definition.
//!
//! This module defines the [`MessagingBackend`] trait and the [`Subscription`]
//! handle through which live queries deliver full snapshots.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::domain::{Message, MessageId, NewMessage, Thread, ThreadId};
use crate::storage::DatabaseError;

/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors reported by a document store.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Network or connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Requested record was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The store's own persistence failed.
    #[error("storage error: {0}")]
    Storage(#[from] DatabaseError),

    /// The subscription or store was shut down.
    #[error("subscription closed")]
    Closed,

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Snapshots buffered per subscription before the producer waits.
const SNAPSHOT_BUFFER: usize = 8;

/// Consumer side of a live query.
///
/// Yields complete, ordered snapshots. An `Err` item means the subscription
/// dropped; the producer sends nothing after it. Dropping the handle
/// unsubscribes.
#[derive(Debug)]
pub struct Subscription<T> {
    receiver: mpsc::Receiver<Result<Vec<T>>>,
    cancel: CancellationToken,
}

/// Producer side of a live query, held by the backend.
#[derive(Debug)]
pub struct SnapshotSender<T> {
    sender: mpsc::Sender<Result<Vec<T>>>,
    cancel: CancellationToken,
}

impl<T> Subscription<T> {
    /// Creates a connected producer/consumer pair.
    pub fn channel() -> (SnapshotSender<T>, Subscription<T>) {
        let (sender, receiver) = mpsc::channel(SNAPSHOT_BUFFER);
        let cancel = CancellationToken::new();
        (
            SnapshotSender {
                sender,
                cancel: cancel.clone(),
            },
            Subscription { receiver, cancel },
        )
    }

    /// Waits for the next snapshot.
    ///
    /// Returns `None` once the producer has gone away.
    pub async fn next(&mut self) -> Option<Result<Vec<T>>> {
        self.receiver.recv().await
    }

    /// Releases the subscription.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl<T> SnapshotSender<T> {
    /// Delivers a snapshot (or terminal error) to the subscriber.
    ///
    /// Returns `false` if the subscriber has unsubscribed.
    pub async fn send(&self, snapshot: Result<Vec<T>>) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.sender.send(snapshot).await.is_ok()
    }

    /// Returns true once the subscriber has unsubscribed.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Completes when the subscriber unsubscribes.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}

/// Contract between the messaging core and its document store.
///
/// Implementations own ordering: thread snapshots are sorted by
/// `last_message_at` descending, message snapshots by timestamp ascending.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagingBackend: Send + Sync {
    /// Opens a live query over all threads.
    async fn subscribe_threads(&self) -> Result<Subscription<Thread>>;

    /// Opens a live query over one thread's message log.
    async fn subscribe_messages(&self, thread_id: &ThreadId) -> Result<Subscription<Message>>;

    /// Reads one thread record.
    async fn get_thread(&self, thread_id: &ThreadId) -> Result<Option<Thread>>;

    /// Appends a message; the store assigns its id and timestamp.
    async fn append_message(&self, thread_id: &ThreadId, message: NewMessage)
        -> Result<MessageId>;
}
