//! Persistence for the local document store.
//!
//! - SQLite database holding threads and their message logs
//! - Async-safe database operations via tokio::task::spawn_blocking

mod database;
pub mod queries;
mod schema;

pub use database::{Database, DatabaseError, Result};
