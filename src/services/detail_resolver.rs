//! One-shot lookup of a thread's full record for the sidebar.

use std::sync::Arc;

use crate::config::DetailSettings;
use crate::domain::{Thread, ThreadId};
use crate::providers::{BackendError, MessagingBackend};

use super::error::{MessagingError, MessagingResult};

/// Outcome of resolving the selected thread's details.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum ThreadDetail {
    /// No thread is selected; nothing was fetched.
    #[default]
    Absent,
    /// The selected thread does not exist.
    Missing(ThreadId),
    /// The fetch failed for another reason.
    Unavailable(MessagingError),
    /// The thread record.
    Ready(Thread),
}

impl ThreadDetail {
    /// The resolved thread, if any.
    pub fn thread(&self) -> Option<&Thread> {
        match self {
            ThreadDetail::Ready(thread) => Some(thread),
            _ => None,
        }
    }
}

/// Fetches thread records with a per-attempt timeout and bounded retries.
#[derive(Clone)]
pub struct ThreadDetailResolver {
    backend: Arc<dyn MessagingBackend>,
    settings: DetailSettings,
}

impl ThreadDetailResolver {
    /// Creates a resolver over `backend`.
    pub fn new(backend: Arc<dyn MessagingBackend>, settings: DetailSettings) -> Self {
        Self { backend, settings }
    }

    /// Resolves the detail for the current selection.
    pub async fn resolve(&self, selection: Option<&ThreadId>) -> ThreadDetail {
        let Some(thread_id) = selection else {
            return ThreadDetail::Absent;
        };
        match self.fetch(thread_id).await {
            Ok(thread) => ThreadDetail::Ready(thread),
            Err(MessagingError::NotFound(id)) => ThreadDetail::Missing(id),
            Err(err) => ThreadDetail::Unavailable(err),
        }
    }

    /// Fetches one thread record.
    ///
    /// A missing thread is reported as [`MessagingError::NotFound`] right
    /// away; timeouts and backend errors are retried.
    pub async fn fetch(&self, thread_id: &ThreadId) -> MessagingResult<Thread> {
        let mut retry = 0;
        loop {
            let error = match tokio::time::timeout(
                self.settings.fetch_timeout(),
                self.backend.get_thread(thread_id),
            )
            .await
            {
                Ok(Ok(Some(thread))) => return Ok(thread),
                Ok(Ok(None)) | Ok(Err(BackendError::NotFound(_))) => {
                    tracing::debug!(thread_id = %thread_id, "Thread not found");
                    return Err(MessagingError::NotFound(thread_id.clone()));
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!(
                    "timed out after {} ms",
                    self.settings.fetch_timeout().as_millis()
                ),
            };

            if retry >= self.settings.max_retries {
                tracing::warn!(thread_id = %thread_id, error = %error, "Thread detail fetch failed");
                return Err(MessagingError::DetailFetch(error));
            }
            retry += 1;
            tracing::debug!(thread_id = %thread_id, retry, error = %error, "Retrying thread detail fetch");
            tokio::time::sleep(self.settings.retry_delay(retry)).await;
        }
    }
}
