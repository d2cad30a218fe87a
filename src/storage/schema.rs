//! SQL schema for the local document store.
//!
//! Participants and attachments are stored as JSON arrays, mirroring how the
//! document store keeps them as nested fields of the thread record.

/// SQL to create the threads table.
pub const CREATE_THREADS: &str = r#"
CREATE TABLE IF NOT EXISTS message_threads (
    id TEXT PRIMARY KEY,
    subject TEXT NOT NULL,
    last_message TEXT NOT NULL DEFAULT '',
    last_message_at TEXT NOT NULL,
    participants TEXT NOT NULL,
    attachments TEXT NOT NULL,
    created_at TEXT NOT NULL
)
"#;

/// SQL to create thread indexes.
pub const CREATE_THREAD_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_threads_last_message_at ON message_threads(last_message_at DESC)
"#;

/// SQL to create the messages table.
///
/// `seq` preserves insertion order for messages sharing a timestamp.
pub const CREATE_MESSAGES: &str = r#"
CREATE TABLE IF NOT EXISTS messages (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id TEXT NOT NULL REFERENCES message_threads(id) ON DELETE CASCADE,
    id TEXT NOT NULL,
    content TEXT NOT NULL,
    sender_id TEXT NOT NULL,
    sender_name TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    attachments TEXT NOT NULL,
    UNIQUE (thread_id, id)
)
"#;

/// SQL to create message indexes.
pub const CREATE_MESSAGE_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_messages_thread_time ON messages(thread_id, timestamp)
"#;

/// Returns all migrations in application order.
pub fn all_migrations() -> &'static [&'static str] {
    &[
        CREATE_THREADS,
        CREATE_THREAD_INDEXES,
        CREATE_MESSAGES,
        CREATE_MESSAGE_INDEXES,
    ]
}
