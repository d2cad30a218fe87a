//! View state of the messaging screen.
//!
//! [`ViewState`] is what the user controls (selection, sidebar, draft,
//! search). [`MessagingView`] is what gets drawn: the view state combined
//! with the latest projections.

use crate::domain::{Message, Thread, ThreadId};
use crate::services::{IndexSnapshot, MessageLog, MessagingError, ThreadDetail, ThreadFilter};

/// Which thread, if any, is open.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// Nothing is open.
    #[default]
    NoSelection,
    /// The thread with this id is open; it need not be in the index.
    Selected(ThreadId),
}

impl Selection {
    /// The selected thread id, if any.
    pub fn thread_id(&self) -> Option<&ThreadId> {
        match self {
            Selection::NoSelection => None,
            Selection::Selected(id) => Some(id),
        }
    }
}

/// User-controlled state.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    /// Current selection.
    pub selection: Selection,
    /// Whether the detail sidebar is visible.
    pub sidebar_open: bool,
    /// Compose field contents.
    pub draft: String,
    /// Thread list search.
    pub filter: ThreadFilter,
    /// Last error to show the user, cleared by the next successful action.
    pub last_error: Option<MessagingError>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            selection: Selection::NoSelection,
            sidebar_open: true,
            draft: String::new(),
            filter: ThreadFilter::new(),
            last_error: None,
        }
    }
}

impl ViewState {
    /// Select a thread.
    pub fn select_thread(&mut self, thread_id: ThreadId) {
        self.selection = Selection::Selected(thread_id);
    }

    /// Clear the selection.
    pub fn clear_selection(&mut self) {
        self.selection = Selection::NoSelection;
    }

    /// Toggle the sidebar and return the new visibility.
    pub fn toggle_sidebar(&mut self) -> bool {
        self.sidebar_open = !self.sidebar_open;
        self.sidebar_open
    }
}

/// Everything the messaging screen renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagingView {
    /// Thread list after search filtering, in index order.
    pub threads: Vec<Thread>,
    /// Set while the thread list shows out-of-date data.
    pub index_stale: bool,
    /// Why the thread list is stale.
    pub index_error: Option<MessagingError>,
    /// Selected thread id.
    pub selected: Option<ThreadId>,
    /// Messages of the selected thread, oldest first.
    pub messages: Vec<Message>,
    /// Set while the message log shows out-of-date data.
    pub messages_stale: bool,
    /// The log grew at the tail since the previous snapshot.
    pub scroll_to_end: bool,
    /// Whether the sidebar is visible.
    pub sidebar_open: bool,
    /// Detail shown in the sidebar, if any.
    pub detail: Option<Thread>,
    /// Compose field contents.
    pub draft: String,
    /// Error to show the user.
    pub last_error: Option<MessagingError>,
}

impl MessagingView {
    /// Builds the screen from view state and the latest projections.
    ///
    /// Messages are only shown when the log belongs to the selection. The
    /// detail is only shown when the sidebar is visible, the detail was
    /// resolved for the selection, and the selection is in the index.
    pub fn compose(
        state: &ViewState,
        index: &IndexSnapshot,
        log: &MessageLog,
        detail: &ThreadDetail,
    ) -> Self {
        let selected = state.selection.thread_id().cloned();

        let (messages, messages_stale, scroll_to_end) = match &selected {
            Some(id) if log.is_for(id) => (log.messages.clone(), log.is_stale(), log.tail.grew()),
            _ => (Vec::new(), false, false),
        };

        let detail = match (&selected, detail.thread()) {
            (Some(id), Some(thread))
                if state.sidebar_open && &thread.id == id && index.contains(id) =>
            {
                Some(thread.clone())
            }
            _ => None,
        };

        Self {
            threads: index.filtered(&state.filter).cloned().collect(),
            index_stale: index.is_stale(),
            index_error: index.status.error().cloned(),
            selected,
            messages,
            messages_stale,
            scroll_to_end,
            sidebar_open: state.sidebar_open,
            detail,
            draft: state.draft.clone(),
            last_error: state.last_error.clone(),
        }
    }

    /// The row for the selected thread, if it is listed.
    pub fn selected_thread(&self) -> Option<&Thread> {
        let id = self.selected.as_ref()?;
        self.threads.iter().find(|t| &t.id == id)
    }
}
