//! SQLite-backed document store.
//!
//! Writes go through [`crate::storage`]; every committed write is announced
//! on a broadcast channel, and each live query re-runs its query and pushes a
//! full snapshot when a relevant change arrives.

use std::future::Future;
use std::path::Path;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use super::traits::{BackendError, MessagingBackend, Result, SnapshotSender, Subscription};
use crate::domain::{Message, MessageId, NewMessage, NewThread, Thread, ThreadId};
use crate::storage::queries::{messages, threads};
use crate::storage::Database;

/// Change notifications retained for slow live queries.
const CHANGE_BUFFER: usize = 256;

/// A committed write, as seen by live queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    /// A thread was created.
    ThreadCreated(ThreadId),
    /// A message was appended to a thread (its preview changed too).
    MessageAppended(ThreadId),
}

impl StoreChange {
    fn affects_thread_list(&self) -> bool {
        true
    }

    fn affects_messages_of(&self, thread_id: &ThreadId) -> bool {
        matches!(self, StoreChange::MessageAppended(id) if id == thread_id)
    }
}

/// Local document store implementing [`MessagingBackend`].
#[derive(Debug, Clone)]
pub struct LocalStore {
    db: Database,
    changes: broadcast::Sender<StoreChange>,
}

impl LocalStore {
    /// Opens a store backed by the database file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::with_database(Database::open(path).await?))
    }

    /// Creates a store with a private in-memory database.
    pub async fn in_memory() -> Result<Self> {
        Ok(Self::with_database(Database::open_in_memory().await?))
    }

    fn with_database(db: Database) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self { db, changes }
    }

    /// Creates a new thread with a store-assigned id.
    pub async fn create_thread(&self, new_thread: NewThread) -> Result<Thread> {
        let id = ThreadId(Uuid::new_v4().to_string());
        let thread = threads::insert(&self.db, id, &new_thread).await?;

        tracing::info!(thread_id = %thread.id, subject = %thread.subject, "Thread created");
        self.announce(StoreChange::ThreadCreated(thread.id.clone()));
        Ok(thread)
    }

    fn announce(&self, change: StoreChange) {
        // No receivers simply means no live queries are open.
        let _ = self.changes.send(change);
    }

    /// Spawns the task that keeps one live query fed.
    ///
    /// The change receiver is taken before the first query runs so that a
    /// write landing between the query and the wait is not missed.
    fn spawn_live_query<T, R, Q, Fut>(&self, sender: SnapshotSender<T>, relevant: R, query: Q)
    where
        T: Send + 'static,
        R: Fn(&StoreChange) -> bool + Send + 'static,
        Q: Fn(Database) -> Fut + Send + 'static,
        Fut: Future<Output = crate::storage::Result<Vec<T>>> + Send + 'static,
    {
        let mut changes = self.changes.subscribe();
        let db = self.db.clone();

        tokio::spawn(async move {
            loop {
                let snapshot = query(db.clone()).await.map_err(BackendError::from);
                let failed = snapshot.is_err();
                if !sender.send(snapshot).await || failed {
                    return;
                }

                loop {
                    tokio::select! {
                        _ = sender.cancelled() => return,
                        change = changes.recv() => match change {
                            Ok(change) if relevant(&change) => break,
                            Ok(_) => continue,
                            Err(RecvError::Lagged(skipped)) => {
                                tracing::debug!(skipped, "Live query lagged, resending snapshot");
                                break;
                            }
                            Err(RecvError::Closed) => {
                                let _ = sender.send(Err(BackendError::Closed)).await;
                                return;
                            }
                        },
                    }
                }
            }
        });
    }
}

#[async_trait]
impl MessagingBackend for LocalStore {
    async fn subscribe_threads(&self) -> Result<Subscription<Thread>> {
        let (sender, subscription) = Subscription::channel();
        self.spawn_live_query(sender, StoreChange::affects_thread_list, |db| async move {
            threads::list_by_recency(&db).await
        });
        tracing::debug!("Thread list subscription opened");
        Ok(subscription)
    }

    async fn subscribe_messages(&self, thread_id: &ThreadId) -> Result<Subscription<Message>> {
        let (sender, subscription) = Subscription::channel();
        let watched = thread_id.clone();
        let queried = thread_id.clone();
        self.spawn_live_query(
            sender,
            move |change| change.affects_messages_of(&watched),
            move |db| {
                let thread_id = queried.clone();
                async move { messages::list_for_thread(&db, &thread_id).await }
            },
        );
        tracing::debug!(thread_id = %thread_id, "Message subscription opened");
        Ok(subscription)
    }

    async fn get_thread(&self, thread_id: &ThreadId) -> Result<Option<Thread>> {
        Ok(threads::get_by_id(&self.db, thread_id).await?)
    }

    async fn append_message(
        &self,
        thread_id: &ThreadId,
        message: NewMessage,
    ) -> Result<MessageId> {
        let id = MessageId(Uuid::new_v4().to_string());
        let stored = messages::append(&self.db, thread_id, id, &message)
            .await?
            .ok_or_else(|| BackendError::NotFound(thread_id.to_string()))?;

        tracing::debug!(thread_id = %thread_id, message_id = %stored.id, "Message appended");
        self.announce(StoreChange::MessageAppended(thread_id.clone()));
        Ok(stored.id)
    }
}
