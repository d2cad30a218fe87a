//! View events for secondary observers.
//!
//! The coordinator publishes what happened in the messaging view; observers
//! such as a log writer or an unread badge subscribe without polling.

use tokio::sync::broadcast;

use crate::domain::{MessageId, ThreadId};
use crate::services::MessagingError;

/// Events retained for slow subscribers.
const EVENT_BUFFER: usize = 100;

/// Something that happened in the messaging view.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// A thread became the selection.
    ThreadSelected(ThreadId),
    /// The selection was cleared.
    SelectionCleared,
    /// The sidebar was shown or hidden.
    SidebarToggled(bool),
    /// The backend acknowledged a message.
    MessageSent {
        thread_id: ThreadId,
        message_id: MessageId,
    },
    /// A send failed; the draft was kept.
    SendFailed {
        thread_id: Option<ThreadId>,
        error: MessagingError,
    },
    /// The thread list lost its subscription and is showing old data.
    IndexDegraded { error: MessagingError },
    /// The thread list is live again.
    IndexRecovered,
}

/// Broadcast bus for [`ViewEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ViewEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Create a new event bus.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self { sender }
    }

    /// Subscribe to all events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: ViewEvent) {
        tracing::trace!(?event, "View event");
        // Nobody listening is fine.
        let _ = self.sender.send(event);
    }
}
