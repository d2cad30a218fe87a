//! Coordinates the messaging screen.
//!
//! The coordinator owns the selection and wires it to the services: the
//! thread index is open for as long as the coordinator lives, while the
//! message stream and the detail lookup always follow the current
//! selection.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::events::{EventBus, ViewEvent};
use super::state::{MessagingView, ViewState};
use crate::config::Settings;
use crate::domain::{Identity, MessageId, ThreadId};
use crate::providers::MessagingBackend;
use crate::services::{
    IndexSnapshot, MessageLog, MessageStream, MessagingResult, ThreadDetail,
    ThreadDetailResolver, ThreadFilter, ThreadIndex,
};

/// Single source of truth for the messaging screen.
pub struct ViewCoordinator {
    identity: Identity,
    state: ViewState,
    index: ThreadIndex,
    messages: MessageStream,
    resolver: ThreadDetailResolver,
    detail: ThreadDetail,
    events: EventBus,
    monitor: JoinHandle<()>,
}

impl ViewCoordinator {
    /// Opens the messaging screen for `identity`.
    ///
    /// Starts the thread index right away. Must be called from within a
    /// tokio runtime.
    pub fn open(backend: Arc<dyn MessagingBackend>, identity: Identity, settings: &Settings) -> Self {
        let index = ThreadIndex::open(backend.clone(), settings.subscriptions.clone());
        let messages = MessageStream::new(backend.clone(), settings.subscriptions.clone());
        let resolver = ThreadDetailResolver::new(backend, settings.detail.clone());
        let events = EventBus::new();
        let monitor = tokio::spawn(monitor_index(index.watch(), events.clone()));

        tracing::info!(user_id = %identity.id, "Messaging view opened");
        Self {
            identity,
            state: ViewState::default(),
            index,
            messages,
            resolver,
            detail: ThreadDetail::Absent,
            events,
            monitor,
        }
    }

    /// The user this view sends as.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Detail resolved for the current selection.
    pub fn detail(&self) -> &ThreadDetail {
        &self.detail
    }

    /// Subscribe to view events.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    /// Watch message log updates of whichever thread is open.
    pub fn watch_messages(&self) -> watch::Receiver<MessageLog> {
        self.messages.watch()
    }

    /// Selects a thread, which need not be in the current index.
    ///
    /// The previous thread's message subscription is released before the
    /// new one opens; the detail is then fetched for the new selection.
    pub async fn select_thread(&mut self, thread_id: ThreadId) {
        tracing::debug!(thread_id = %thread_id, "Selecting thread");
        self.state.select_thread(thread_id.clone());
        self.state.last_error = None;
        self.detail = ThreadDetail::Absent;

        self.messages.open(thread_id.clone()).await;
        self.refresh_detail().await;

        self.events.publish(ViewEvent::ThreadSelected(thread_id));
    }

    /// Clears the selection and releases the message subscription.
    pub async fn clear_selection(&mut self) {
        self.state.clear_selection();
        self.messages.close().await;
        self.detail = ThreadDetail::Absent;
        self.events.publish(ViewEvent::SelectionCleared);
    }

    /// Shows or hides the sidebar. Returns the new visibility.
    pub fn toggle_sidebar(&mut self) -> bool {
        let open = self.state.toggle_sidebar();
        self.events.publish(ViewEvent::SidebarToggled(open));
        open
    }

    /// Re-fetches the detail of the current selection.
    pub async fn refresh_detail(&mut self) {
        self.detail = self.resolver.resolve(self.state.selection.thread_id()).await;
        if let ThreadDetail::Unavailable(err) = &self.detail {
            self.state.last_error = Some(err.clone());
        }
    }

    /// Replaces the compose field contents.
    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.state.draft = draft.into();
    }

    /// Current compose field contents.
    pub fn draft(&self) -> &str {
        &self.state.draft
    }

    /// Sets the thread list search; blank text shows all threads.
    pub fn set_search(&mut self, query: &str) {
        self.state.filter = ThreadFilter::new().search(query);
    }

    /// Sends the draft to the selected thread.
    ///
    /// The draft is cleared only once the backend acknowledged the write.
    pub async fn send(&mut self) -> MessagingResult<MessageId> {
        match self.messages.append(&self.identity, &self.state.draft).await {
            Ok(message_id) => {
                self.state.draft.clear();
                self.state.last_error = None;
                if let Some(thread_id) = self.state.selection.thread_id() {
                    self.events.publish(ViewEvent::MessageSent {
                        thread_id: thread_id.clone(),
                        message_id: message_id.clone(),
                    });
                }
                Ok(message_id)
            }
            Err(err) => {
                self.state.last_error = Some(err.clone());
                self.events.publish(ViewEvent::SendFailed {
                    thread_id: self.state.selection.thread_id().cloned(),
                    error: err.clone(),
                });
                Err(err)
            }
        }
    }

    /// Combines view state with the latest projections.
    pub fn render(&self) -> MessagingView {
        MessagingView::compose(
            &self.state,
            &self.index.snapshot(),
            &self.messages.log(),
            &self.detail,
        )
    }

    /// Releases every subscription held by the view.
    pub async fn shutdown(&mut self) {
        self.messages.close().await;
        self.index.close().await;
        self.monitor.abort();
        tracing::info!("Messaging view closed");
    }
}

impl Drop for ViewCoordinator {
    fn drop(&mut self) {
        self.monitor.abort();
    }
}

/// Publishes index health transitions until the index goes away.
async fn monitor_index(mut index: watch::Receiver<IndexSnapshot>, events: EventBus) {
    let mut degraded = false;
    while index.changed().await.is_ok() {
        let error = index.borrow_and_update().status.error().cloned();
        match (degraded, error) {
            (false, Some(error)) => {
                tracing::warn!(error = %error, "Thread list degraded");
                degraded = true;
                events.publish(ViewEvent::IndexDegraded { error });
            }
            (true, None) => {
                tracing::info!("Thread list recovered");
                degraded = false;
                events.publish(ViewEvent::IndexRecovered);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Message, Participant, Thread};
    use crate::providers::store::{BackendError, MockMessagingBackend, SnapshotSender};
    use crate::providers::Subscription;
    use crate::services::MessagingError;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use std::time::Duration;

    fn thread(id: &str) -> Thread {
        Thread {
            id: ThreadId::from(id),
            subject: format!("Subject {id}"),
            last_message: String::new(),
            last_message_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            participants: vec![Participant::new("admin", "Administrator", "staff")],
            attachments: vec![],
        }
    }

    fn fast_settings() -> Settings {
        let mut settings = Settings::default();
        settings.subscriptions.initial_backoff_ms = 5;
        settings.subscriptions.max_backoff_ms = 10;
        settings.detail.retry_backoff_ms = 1;
        settings
    }

    struct Harness {
        threads: Arc<Mutex<Vec<SnapshotSender<Thread>>>>,
        messages: Arc<Mutex<Vec<(ThreadId, SnapshotSender<Message>)>>>,
    }

    fn backend() -> (MockMessagingBackend, Harness) {
        let threads = Arc::new(Mutex::new(Vec::new()));
        let messages = Arc::new(Mutex::new(Vec::new()));
        let mut backend = MockMessagingBackend::new();

        let handed_out = threads.clone();
        backend.expect_subscribe_threads().returning(move || {
            let (sender, subscription) = Subscription::channel();
            handed_out.lock().unwrap().push(sender);
            Ok(subscription)
        });
        let handed_out = messages.clone();
        backend.expect_subscribe_messages().returning(move |id| {
            let (sender, subscription) = Subscription::channel();
            handed_out.lock().unwrap().push((id.clone(), sender));
            Ok(subscription)
        });
        backend
            .expect_get_thread()
            .returning(|id| Ok((id.0 != "missing-id").then(|| thread(&id.0))));

        (backend, Harness { threads, messages })
    }

    async fn until<F: Fn() -> bool>(check: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("condition never held");
    }

    fn settings_identity() -> Identity {
        Identity::new("admin", "Administrator")
    }

    #[tokio::test]
    async fn selecting_b_after_a_releases_a_first() {
        let (backend, harness) = backend();
        let mut view = ViewCoordinator::open(Arc::new(backend), settings_identity(), &fast_settings());

        view.select_thread(ThreadId::from("A")).await;
        until(|| harness.messages.lock().unwrap().len() == 1).await;
        view.select_thread(ThreadId::from("B")).await;
        until(|| harness.messages.lock().unwrap().len() == 2).await;

        let subscriptions = harness.messages.lock().unwrap();
        let ids: Vec<_> = subscriptions.iter().map(|(id, _)| id.0.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert!(subscriptions[0].1.is_cancelled());
        assert!(!subscriptions[1].1.is_cancelled());
    }

    #[tokio::test]
    async fn missing_thread_renders_no_detail() {
        let (backend, harness) = backend();
        let mut view = ViewCoordinator::open(Arc::new(backend), settings_identity(), &fast_settings());
        until(|| !harness.threads.lock().unwrap().is_empty()).await;

        view.select_thread(ThreadId::from("missing-id")).await;

        assert_eq!(view.detail(), &ThreadDetail::Missing(ThreadId::from("missing-id")));
        let rendered = view.render();
        assert_eq!(rendered.selected, Some(ThreadId::from("missing-id")));
        assert_eq!(rendered.detail, None);
        assert_eq!(rendered.last_error, None);
    }

    #[tokio::test]
    async fn detail_shown_once_thread_is_listed() {
        let (backend, harness) = backend();
        let mut view = ViewCoordinator::open(Arc::new(backend), settings_identity(), &fast_settings());
        until(|| !harness.threads.lock().unwrap().is_empty()).await;
        let sender = harness.threads.lock().unwrap().remove(0);

        view.select_thread(ThreadId::from("t1")).await;
        assert_eq!(view.render().detail, None);

        sender.send(Ok(vec![thread("t1")])).await;
        until(|| view.render().threads.len() == 1).await;
        assert_eq!(view.render().detail.map(|t| t.id), Some(ThreadId::from("t1")));

        view.toggle_sidebar();
        assert_eq!(view.render().detail, None);
    }

    #[tokio::test]
    async fn blank_draft_is_rejected_and_kept() {
        let (mut backend, _harness) = backend();
        backend.expect_append_message().times(0);
        let mut view = ViewCoordinator::open(Arc::new(backend), settings_identity(), &fast_settings());
        let mut events = view.subscribe();

        view.select_thread(ThreadId::from("t1")).await;
        view.set_draft("   ");
        let err = view.send().await.unwrap_err();

        assert!(matches!(err, MessagingError::Validation(_)));
        assert_eq!(view.draft(), "   ");
        assert_eq!(
            events.recv().await.unwrap(),
            ViewEvent::ThreadSelected(ThreadId::from("t1"))
        );
        assert!(matches!(
            events.recv().await.unwrap(),
            ViewEvent::SendFailed { .. }
        ));
    }

    #[tokio::test]
    async fn successful_send_clears_draft() {
        let (mut backend, _harness) = backend();
        backend
            .expect_append_message()
            .times(1)
            .returning(|_, _| Ok(MessageId::from("m1")));
        let mut view = ViewCoordinator::open(Arc::new(backend), settings_identity(), &fast_settings());

        view.select_thread(ThreadId::from("t1")).await;
        view.set_draft("Visiting hours changed");
        let id = view.send().await.unwrap();

        assert_eq!(id, MessageId::from("m1"));
        assert_eq!(view.draft(), "");
        assert_eq!(view.render().last_error, None);
    }

    #[tokio::test]
    async fn failed_send_keeps_draft_and_surfaces_error() {
        let (mut backend, _harness) = backend();
        backend
            .expect_append_message()
            .returning(|_, _| Err(BackendError::Connection("offline".to_string())));
        let mut view = ViewCoordinator::open(Arc::new(backend), settings_identity(), &fast_settings());

        view.select_thread(ThreadId::from("t1")).await;
        view.set_draft("Visiting hours changed");
        let err = view.send().await.unwrap_err();

        assert!(matches!(err, MessagingError::WriteFailure(_)));
        assert_eq!(view.draft(), "Visiting hours changed");
        assert_eq!(view.render().last_error, Some(err));
    }

    #[tokio::test]
    async fn index_degradation_is_published() {
        let (backend, harness) = backend();
        let view = ViewCoordinator::open(Arc::new(backend), settings_identity(), &fast_settings());
        let mut events = view.subscribe();
        until(|| !harness.threads.lock().unwrap().is_empty()).await;
        let sender = harness.threads.lock().unwrap().remove(0);

        sender.send(Ok(vec![thread("t1")])).await;
        sender
            .send(Err(BackendError::Connection("reset".to_string())))
            .await;

        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            event,
            ViewEvent::IndexDegraded {
                error: MessagingError::Subscription("connection error: reset".to_string())
            }
        );
        assert_eq!(view.render().threads.len(), 1);
    }

    #[tokio::test]
    async fn shutdown_releases_everything() {
        let (backend, harness) = backend();
        let mut view = ViewCoordinator::open(Arc::new(backend), settings_identity(), &fast_settings());
        until(|| !harness.threads.lock().unwrap().is_empty()).await;
        view.select_thread(ThreadId::from("t1")).await;
        until(|| harness.messages.lock().unwrap().len() == 1).await;

        view.shutdown().await;

        assert!(harness.threads.lock().unwrap()[0].is_cancelled());
        assert!(harness.messages.lock().unwrap()[0].1.is_cancelled());
    }

    #[tokio::test]
    async fn clear_selection_releases_stream() {
        let (backend, harness) = backend();
        let mut view = ViewCoordinator::open(Arc::new(backend), settings_identity(), &fast_settings());

        view.select_thread(ThreadId::from("t1")).await;
        until(|| harness.messages.lock().unwrap().len() == 1).await;
        view.clear_selection().await;

        assert!(harness.messages.lock().unwrap()[0].1.is_cancelled());
        assert_eq!(view.render().selected, None);
        assert_eq!(view.detail(), &ThreadDetail::Absent);
    }
}
