//! Configuration and settings management.
//!
//! This module provides application settings types and persistence.
//! Settings are stored in the user's config directory as JSON.

mod settings;

pub use settings::{
    DetailSettings, LoggingSettings, SessionSettings, Settings, StorageSettings,
    SubscriptionSettings,
};
