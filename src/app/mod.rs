//! Application layer: view state, coordination and events.
//!
//! [`ViewCoordinator`] is the entry point. It owns the selection, drives the
//! services from it, and renders a [`MessagingView`] for any front end.

mod coordinator;
mod events;
mod state;

pub use coordinator::ViewCoordinator;
pub use events::{EventBus, ViewEvent};
pub use state::{MessagingView, Selection, ViewState};
