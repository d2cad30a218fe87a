//! Message query operations.
//!
//! Messages are append-only. Appending also refreshes the owning thread's
//! preview so the thread list reorders in the same transaction.

use chrono::Duration;
use rusqlite::{params, OptionalExtension, Row};

use super::{encode_time, json_column, now, time_column};
use crate::domain::{Message, MessageId, NewMessage, ThreadId, UserId};
use crate::storage::database::{Database, Result};

/// Appends a message to a thread and updates the thread's preview.
///
/// The timestamp is assigned here and is strictly greater than the thread's
/// current `last_message_at`, so per-thread timestamps never repeat or go
/// backwards even if the wall clock does. Returns `None` if the thread does
/// not exist.
pub async fn append(
    db: &Database,
    thread_id: &ThreadId,
    id: MessageId,
    new_message: &NewMessage,
) -> Result<Option<Message>> {
    let thread_id = thread_id.clone();
    let new_message = new_message.clone();

    db.transaction(move |tx| {
        let floor = tx
            .query_row(
                "SELECT last_message_at FROM message_threads WHERE id = ?1",
                [&thread_id.0],
                |row| time_column(row, 0),
            )
            .optional()?;
        let Some(floor) = floor else {
            return Ok(None);
        };

        let current = now();
        let timestamp = if current > floor {
            current
        } else {
            floor + Duration::microseconds(1)
        };

        let message = Message {
            id,
            content: new_message.content,
            sender_id: new_message.sender_id,
            sender_name: new_message.sender_name,
            timestamp,
            attachments: new_message.attachments,
        };

        tx.execute(
            r#"
            INSERT INTO messages (
                thread_id, id, content, sender_id, sender_name, timestamp, attachments
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                thread_id.0,
                message.id.0,
                message.content,
                message.sender_id.0,
                message.sender_name,
                encode_time(message.timestamp),
                serde_json::to_string(&message.attachments)?,
            ],
        )?;
        tx.execute(
            "UPDATE message_threads SET last_message = ?1, last_message_at = ?2 WHERE id = ?3",
            params![
                message.content,
                encode_time(message.timestamp),
                thread_id.0
            ],
        )?;

        Ok(Some(message))
    })
    .await
}

/// Lists a thread's messages in timestamp order.
///
/// Insertion order breaks ties, which only matters for imported records.
pub async fn list_for_thread(db: &Database, thread_id: &ThreadId) -> Result<Vec<Message>> {
    let thread_id = thread_id.clone();

    db.with_conn(move |conn| {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, content, sender_id, sender_name, timestamp, attachments
            FROM messages
            WHERE thread_id = ?1
            ORDER BY timestamp ASC, seq ASC
            "#,
        )?;
        let rows = stmt.query_map([&thread_id.0], row_to_message)?;
        let messages: std::result::Result<Vec<_>, _> = rows.collect();
        Ok(messages?)
    })
    .await
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: MessageId(row.get(0)?),
        content: row.get(1)?,
        sender_id: UserId(row.get(2)?),
        sender_name: row.get(3)?,
        timestamp: time_column(row, 4)?,
        attachments: json_column(row, 5)?,
    })
}
