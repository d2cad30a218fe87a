//! carelink - live thread and message synchronization for a care portal
//!
//! This crate provides the messaging core of the portal: a live, ordered
//! thread list, the live message log of the open thread, one-shot thread
//! detail lookups, and the coordinator that ties them to the user's
//! selection. A SQLite-backed document store is included.

pub mod app;
pub mod config;
pub mod domain;
pub mod providers;
pub mod services;
pub mod storage;
pub mod ui;

pub use app::ViewCoordinator;
