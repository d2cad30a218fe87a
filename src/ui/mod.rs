//! Text front end.
//!
//! - `format`: display formatting for rows and the sidebar
//! - `console`: line commands and screen rendering for the `carelink` binary

pub mod console;
pub mod format;

pub use console::{format_message, render_messages, render_sidebar, render_threads, Command, HELP};
pub use format::{list_date, message_time, MessageRow, ParticipantRow, SidebarPanel, ThreadRow};
