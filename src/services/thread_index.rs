//! Live, ordered index of all conversation threads.
//!
//! The index keeps exactly one backend subscription open for its lifetime
//! and republishes every snapshot, sorted most-recent-first, through a
//! single-slot watch channel.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::feed::{run_feed, FeedStatus, FeedUpdate};
use crate::config::SubscriptionSettings;
use crate::domain::{Thread, ThreadId};
use crate::providers::MessagingBackend;

/// The index as last published.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexSnapshot {
    /// Threads ordered by `last_message_at` descending, then id ascending.
    pub threads: Vec<Thread>,
    /// Health of the underlying subscription.
    pub status: FeedStatus,
}

impl IndexSnapshot {
    /// Returns true if the list may be out of date.
    pub fn is_stale(&self) -> bool {
        self.status.is_stale()
    }

    /// Returns true if the thread is part of the current snapshot.
    pub fn contains(&self, thread_id: &ThreadId) -> bool {
        self.threads.iter().any(|t| &t.id == thread_id)
    }

    /// Threads matching `filter`, in index order.
    pub fn filtered<'a>(&'a self, filter: &'a ThreadFilter) -> impl Iterator<Item = &'a Thread> {
        self.threads.iter().filter(move |t| filter.matches(t))
    }
}

/// Search filter for the thread list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadFilter {
    /// Lowercased search text; `None` matches everything.
    query: Option<String>,
}

impl ThreadFilter {
    /// Creates a filter that matches every thread.
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches threads whose subject, preview or participant names contain
    /// `query`, ignoring case. Blank queries match everything.
    pub fn search(mut self, query: impl AsRef<str>) -> Self {
        let query = query.as_ref().trim();
        self.query = (!query.is_empty()).then(|| query.to_lowercase());
        self
    }

    /// Returns true if the thread passes the filter.
    pub fn matches(&self, thread: &Thread) -> bool {
        let Some(query) = &self.query else {
            return true;
        };
        thread.subject.to_lowercase().contains(query)
            || thread.last_message.to_lowercase().contains(query)
            || thread
                .participants
                .iter()
                .any(|p| p.name.to_lowercase().contains(query))
    }
}

/// Live thread list.
///
/// Dropping the index releases its subscription; [`ThreadIndex::close`]
/// additionally waits until the release has happened.
pub struct ThreadIndex {
    state: watch::Receiver<IndexSnapshot>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ThreadIndex {
    /// Opens the index and starts following the backend.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(backend: Arc<dyn MessagingBackend>, policy: SubscriptionSettings) -> Self {
        let (sender, state) = watch::channel(IndexSnapshot::default());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_feed(
            move || {
                let backend = backend.clone();
                async move { backend.subscribe_threads().await }
            },
            policy,
            cancel.clone(),
            move |update| apply_update(&sender, update),
        ));

        Self {
            state,
            cancel,
            task: Some(task),
        }
    }

    /// Returns the latest published snapshot.
    pub fn snapshot(&self) -> IndexSnapshot {
        self.state.borrow().clone()
    }

    /// Returns a receiver that is notified on every republish.
    pub fn watch(&self) -> watch::Receiver<IndexSnapshot> {
        self.state.clone()
    }

    /// Releases the subscription and waits for the feed task to finish.
    ///
    /// The last snapshot stays readable afterwards.
    pub async fn close(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Thread index task failed");
            }
        }
        tracing::debug!("Thread index closed");
    }
}

impl Drop for ThreadIndex {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn apply_update(sender: &watch::Sender<IndexSnapshot>, update: FeedUpdate<Thread>) {
    match update {
        FeedUpdate::Snapshot(mut threads) => {
            threads.sort_by(Thread::cmp_by_recency);
            tracing::debug!(count = threads.len(), "Thread index snapshot");
            sender.send_replace(IndexSnapshot {
                threads,
                status: FeedStatus::Live,
            });
        }
        FeedUpdate::Status(status) => {
            sender.send_modify(|snapshot| snapshot.status = status);
        }
    }
}
