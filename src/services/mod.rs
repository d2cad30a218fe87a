//! Messaging services layer.
//!
//! The services turn the backend's raw live queries into projections the
//! view can render, and own the policies around them (ordering, reconnects,
//! validation, timeouts).
//!
//! # Architecture
//!
//! ```text
//! Application Layer (ViewCoordinator, console)
//!          |
//!          v
//!    Services Layer  <-- You are here
//!          |
//!          v
//! Infrastructure (MessagingBackend, Storage)
//! ```
//!
//! # Services Overview
//!
//! - [`ThreadIndex`]: live, ordered list of all threads
//! - [`MessageStream`]: live message log of the open thread, plus appends
//! - [`ThreadDetailResolver`]: one-shot fetch of a thread's full record

mod detail_resolver;
mod error;
mod feed;
mod message_stream;
mod thread_index;

pub use detail_resolver::{ThreadDetail, ThreadDetailResolver};
pub use error::{MessagingError, MessagingResult};
pub use feed::FeedStatus;
pub use message_stream::{MessageLog, MessageStream, TailChange};
pub use thread_index::{IndexSnapshot, ThreadFilter, ThreadIndex};
