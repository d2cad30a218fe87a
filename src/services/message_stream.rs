//! Live message log of the currently open thread.
//!
//! At most one thread is followed at a time. Switching threads cancels and
//! joins the previous forwarding task before the next subscription is
//! opened, so a log never mixes messages from two threads.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::error::{MessagingError, MessagingResult};
use super::feed::{run_feed, FeedStatus, FeedUpdate};
use crate::config::SubscriptionSettings;
use crate::domain::{Identity, Message, MessageId, NewMessage, ThreadId};
use crate::providers::MessagingBackend;

/// How the latest snapshot differs from the one before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TailChange {
    /// Same messages as before.
    #[default]
    Unchanged,
    /// The previous log is a prefix; this many messages were added at the end.
    Appended(usize),
    /// The log was replaced in some other way (first load, thread switch).
    Reset,
}

impl TailChange {
    fn between(previous: &[Message], current: &[Message]) -> Self {
        let is_prefix = previous.len() <= current.len()
            && previous.iter().zip(current).all(|(a, b)| a.id == b.id);
        match (is_prefix, current.len() - previous.len().min(current.len())) {
            (true, 0) => TailChange::Unchanged,
            (true, added) => TailChange::Appended(added),
            (false, _) => TailChange::Reset,
        }
    }

    /// Returns true if the view should scroll to the newest message.
    pub fn grew(&self) -> bool {
        matches!(self, TailChange::Appended(_))
    }
}

/// The message log as last published.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageLog {
    /// Thread this log belongs to; `None` when no thread is open.
    pub thread_id: Option<ThreadId>,
    /// Messages ordered by timestamp ascending.
    pub messages: Vec<Message>,
    /// Health of the underlying subscription.
    pub status: FeedStatus,
    /// Change relative to the previous snapshot of the same thread.
    pub tail: TailChange,
}

impl MessageLog {
    fn opening(thread_id: ThreadId) -> Self {
        Self {
            thread_id: Some(thread_id),
            ..Self::default()
        }
    }

    /// Returns true if this log belongs to `thread_id`.
    pub fn is_for(&self, thread_id: &ThreadId) -> bool {
        self.thread_id.as_ref() == Some(thread_id)
    }

    /// Returns true if the log may be out of date.
    pub fn is_stale(&self) -> bool {
        self.status.is_stale()
    }
}

struct ActiveFeed {
    thread_id: ThreadId,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Follows one thread's messages and appends to it.
pub struct MessageStream {
    backend: Arc<dyn MessagingBackend>,
    policy: SubscriptionSettings,
    log: Arc<watch::Sender<MessageLog>>,
    active: Option<ActiveFeed>,
}

impl MessageStream {
    /// Creates a stream with no thread open.
    pub fn new(backend: Arc<dyn MessagingBackend>, policy: SubscriptionSettings) -> Self {
        let (log, _) = watch::channel(MessageLog::default());
        Self {
            backend,
            policy,
            log: Arc::new(log),
            active: None,
        }
    }

    /// Thread currently followed, if any.
    pub fn thread_id(&self) -> Option<&ThreadId> {
        self.active.as_ref().map(|active| &active.thread_id)
    }

    /// Returns the latest published log.
    pub fn log(&self) -> MessageLog {
        self.log.borrow().clone()
    }

    /// Returns a receiver that is notified on every republish.
    pub fn watch(&self) -> watch::Receiver<MessageLog> {
        self.log.subscribe()
    }

    /// Starts following `thread_id`.
    ///
    /// Reopening the thread already followed is a no-op. Otherwise the
    /// previous subscription is fully released first.
    pub async fn open(&mut self, thread_id: ThreadId) {
        if self.thread_id() == Some(&thread_id) {
            return;
        }
        self.close().await;

        self.log.send_replace(MessageLog::opening(thread_id.clone()));

        let cancel = CancellationToken::new();
        let backend = self.backend.clone();
        let subscribed = thread_id.clone();
        let owner = thread_id.clone();
        let log = self.log.clone();

        let task = tokio::spawn(run_feed(
            move || {
                let backend = backend.clone();
                let thread_id = subscribed.clone();
                async move { backend.subscribe_messages(&thread_id).await }
            },
            self.policy.clone(),
            cancel.clone(),
            move |update| apply_update(&log, &owner, update),
        ));

        tracing::debug!(thread_id = %thread_id, "Message stream opened");
        self.active = Some(ActiveFeed {
            thread_id,
            cancel,
            task,
        });
    }

    /// Stops following the current thread and clears the log.
    pub async fn close(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        active.cancel.cancel();
        if let Err(e) = active.task.await {
            tracing::error!(thread_id = %active.thread_id, error = %e, "Message stream task failed");
        }
        self.log.send_replace(MessageLog::default());
        tracing::debug!(thread_id = %active.thread_id, "Message stream closed");
    }

    /// Appends a message from `sender` to the open thread.
    ///
    /// Blank content is rejected without contacting the backend. The backend
    /// assigns the id and timestamp; the new message reaches the log through
    /// the live subscription.
    pub async fn append(&self, sender: &Identity, content: &str) -> MessagingResult<MessageId> {
        if content.trim().is_empty() {
            return Err(MessagingError::Validation(
                "message content is empty".to_string(),
            ));
        }
        let Some(thread_id) = self.thread_id() else {
            return Err(MessagingError::Validation("no thread is open".to_string()));
        };

        let message = NewMessage::text(sender, content);
        match self.backend.append_message(thread_id, message).await {
            Ok(message_id) => {
                tracing::info!(thread_id = %thread_id, message_id = %message_id, "Message sent");
                Ok(message_id)
            }
            Err(e) => {
                tracing::warn!(thread_id = %thread_id, error = %e, "Message append failed");
                Err(MessagingError::WriteFailure(e.to_string()))
            }
        }
    }
}

impl Drop for MessageStream {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }
}

fn apply_update(log: &watch::Sender<MessageLog>, owner: &ThreadId, update: FeedUpdate<Message>) {
    log.send_if_modified(|current| {
        if !current.is_for(owner) {
            return false;
        }
        match update {
            FeedUpdate::Snapshot(mut messages) => {
                messages.sort_by_key(|m| m.timestamp);
                current.tail = if current.status == FeedStatus::Connecting {
                    TailChange::Reset
                } else {
                    TailChange::between(&current.messages, &messages)
                };
                current.messages = messages;
                current.status = FeedStatus::Live;
            }
            FeedUpdate::Status(status) => {
                current.tail = TailChange::Unchanged;
                current.status = status;
            }
        }
        true
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;
    use crate::providers::store::{BackendError, MockMessagingBackend, SnapshotSender};
    use crate::providers::Subscription;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    type Producers = Arc<Mutex<HashMap<ThreadId, Vec<SnapshotSender<Message>>>>>;

    fn message(id: &str, second: u32) -> Message {
        Message {
            id: MessageId::from(id),
            content: format!("body {id}"),
            sender_id: "staff-1".into(),
            sender_name: "Nurse Joy".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, second).unwrap(),
            attachments: vec![],
        }
    }

    fn policy() -> SubscriptionSettings {
        SubscriptionSettings {
            initial_backoff_ms: 5,
            max_backoff_ms: 10,
            max_retries: None,
        }
    }

    fn identity() -> Identity {
        Identity::new("admin", "Administrator")
    }

    fn subscribing_backend(backend: &mut MockMessagingBackend) -> Producers {
        let producers: Producers = Arc::new(Mutex::new(HashMap::new()));
        let handed_out = producers.clone();
        backend
            .expect_subscribe_messages()
            .returning(move |thread_id| {
                let (sender, subscription) = Subscription::channel();
                handed_out
                    .lock()
                    .unwrap()
                    .entry(thread_id.clone())
                    .or_default()
                    .push(sender);
                Ok(subscription)
            });
        producers
    }

    async fn producer(producers: &Producers, thread_id: &str) -> SnapshotSender<Message> {
        let key = ThreadId::from(thread_id);
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                {
                    let mut guard = producers.lock().unwrap();
                    if let Some(sender) = guard.get_mut(&key).and_then(|v| v.pop()) {
                        return sender;
                    }
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("subscription never opened")
    }

    async fn wait_for<F>(stream: &MessageStream, predicate: F) -> MessageLog
    where
        F: Fn(&MessageLog) -> bool,
    {
        let mut rx = stream.watch();
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if predicate(&*rx.borrow_and_update()) {
                    return rx.borrow().clone();
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("log never reached expected state")
    }

    #[tokio::test]
    async fn publishes_ordered_snapshots_and_tail_growth() {
        let mut backend = MockMessagingBackend::new();
        let producers = subscribing_backend(&mut backend);
        let mut stream = MessageStream::new(Arc::new(backend), policy());

        stream.open(ThreadId::from("t1")).await;
        let sender = producer(&producers, "t1").await;

        sender.send(Ok(vec![message("m2", 2), message("m1", 1)])).await;
        let first = wait_for(&stream, |log| log.messages.len() == 2).await;
        let ids: Vec<_> = first.messages.iter().map(|m| m.id.0.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m2"]);
        assert_eq!(first.tail, TailChange::Reset);

        sender
            .send(Ok(vec![message("m1", 1), message("m2", 2), message("m3", 3)]))
            .await;
        let second = wait_for(&stream, |log| log.messages.len() == 3).await;
        assert_eq!(second.tail, TailChange::Appended(1));
        assert!(second.tail.grew());
    }

    #[tokio::test]
    async fn switching_threads_releases_previous_subscription_first() {
        let mut backend = MockMessagingBackend::new();
        let producers = subscribing_backend(&mut backend);
        let mut stream = MessageStream::new(Arc::new(backend), policy());

        stream.open(ThreadId::from("A")).await;
        let a = producer(&producers, "A").await;
        a.send(Ok(vec![message("a1", 1)])).await;
        wait_for(&stream, |log| log.messages.len() == 1).await;

        stream.open(ThreadId::from("B")).await;
        assert!(a.is_cancelled());

        // Late traffic from A must never reach B's log.
        a.send(Ok(vec![message("a1", 1), message("a2", 2)])).await;
        let b = producer(&producers, "B").await;
        b.send(Ok(vec![message("b1", 5)])).await;

        let log = wait_for(&stream, |log| !log.messages.is_empty()).await;
        assert_eq!(log.thread_id, Some(ThreadId::from("B")));
        let ids: Vec<_> = log.messages.iter().map(|m| m.id.0.as_str()).collect();
        assert_eq!(ids, vec!["b1"]);
    }

    #[tokio::test]
    async fn reopening_same_thread_keeps_subscription() {
        let mut backend = MockMessagingBackend::new();
        let producers = subscribing_backend(&mut backend);
        let mut stream = MessageStream::new(Arc::new(backend), policy());

        stream.open(ThreadId::from("t1")).await;
        let sender = producer(&producers, "t1").await;
        stream.open(ThreadId::from("t1")).await;

        assert!(!sender.is_cancelled());
    }

    #[tokio::test]
    async fn close_clears_log_and_releases() {
        let mut backend = MockMessagingBackend::new();
        let producers = subscribing_backend(&mut backend);
        let mut stream = MessageStream::new(Arc::new(backend), policy());

        stream.open(ThreadId::from("t1")).await;
        let sender = producer(&producers, "t1").await;
        sender.send(Ok(vec![message("m1", 1)])).await;
        wait_for(&stream, |log| log.messages.len() == 1).await;

        stream.close().await;
        assert!(sender.is_cancelled());
        assert_eq!(stream.thread_id(), None);
        assert_eq!(stream.log(), MessageLog::default());
    }

    #[tokio::test]
    async fn dropped_subscription_keeps_messages_and_marks_stale() {
        let mut backend = MockMessagingBackend::new();
        let producers = subscribing_backend(&mut backend);
        let mut stream = MessageStream::new(Arc::new(backend), policy());

        stream.open(ThreadId::from("t1")).await;
        let sender = producer(&producers, "t1").await;
        sender.send(Ok(vec![message("m1", 1)])).await;
        wait_for(&stream, |log| log.messages.len() == 1).await;

        sender
            .send(Err(BackendError::Connection("reset".to_string())))
            .await;
        let log = wait_for(&stream, MessageLog::is_stale).await;
        assert_eq!(log.messages.len(), 1);
        assert_eq!(
            log.status.error(),
            Some(&MessagingError::Subscription("connection error: reset".to_string()))
        );
    }

    #[tokio::test]
    async fn blank_content_is_rejected_without_backend_call() {
        let mut backend = MockMessagingBackend::new();
        let _producers = subscribing_backend(&mut backend);
        backend.expect_append_message().times(0);
        let mut stream = MessageStream::new(Arc::new(backend), policy());
        stream.open(ThreadId::from("t1")).await;

        for content in ["", "  ", "\n\t"] {
            let result = stream.append(&identity(), content).await;
            assert!(matches!(result, Err(MessagingError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn append_without_open_thread_is_rejected() {
        let mut backend = MockMessagingBackend::new();
        backend.expect_append_message().times(0);
        let stream = MessageStream::new(Arc::new(backend), policy());

        let result = stream.append(&identity(), "hello").await;
        assert!(matches!(result, Err(MessagingError::Validation(_))));
    }

    #[tokio::test]
    async fn append_sends_identity_and_content() {
        let mut backend = MockMessagingBackend::new();
        let _producers = subscribing_backend(&mut backend);
        backend
            .expect_append_message()
            .withf(|thread_id, message| {
                thread_id == &ThreadId::from("t1")
                    && message.content == "Lunch is at noon"
                    && message.sender_id == UserId::from("admin")
                    && message.sender_name == "Administrator"
            })
            .times(1)
            .returning(|_, _| Ok(MessageId::from("m9")));
        let mut stream = MessageStream::new(Arc::new(backend), policy());
        stream.open(ThreadId::from("t1")).await;

        let id = stream.append(&identity(), "Lunch is at noon").await.unwrap();
        assert_eq!(id, MessageId::from("m9"));
    }

    #[tokio::test]
    async fn backend_failure_becomes_write_failure() {
        let mut backend = MockMessagingBackend::new();
        let _producers = subscribing_backend(&mut backend);
        backend
            .expect_append_message()
            .returning(|_, _| Err(BackendError::Connection("offline".to_string())));
        let mut stream = MessageStream::new(Arc::new(backend), policy());
        stream.open(ThreadId::from("t1")).await;

        let err = stream.append(&identity(), "hello").await.unwrap_err();
        assert_eq!(
            err,
            MessagingError::WriteFailure("connection error: offline".to_string())
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn tail_change_detects_reset() {
        let previous = vec![message("m1", 1), message("m2", 2)];
        assert_eq!(TailChange::between(&previous, &previous), TailChange::Unchanged);
        assert_eq!(
            TailChange::between(&previous, &[message("m1", 1)]),
            TailChange::Reset
        );
        assert_eq!(
            TailChange::between(&previous, &[message("x", 1), message("m2", 2)]),
            TailChange::Reset
        );
    }
}
