//! Thread query operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{encode_time, json_column, now, time_column};
use crate::domain::{NewThread, Thread, ThreadId};
use crate::storage::database::{Database, Result};

const THREAD_COLUMNS: &str =
    "id, subject, last_message, last_message_at, participants, attachments";

/// Inserts a new thread with no messages.
///
/// `last_message_at` starts at the creation time so a fresh thread sorts
/// alongside recently active ones.
pub async fn insert(db: &Database, id: ThreadId, new_thread: &NewThread) -> Result<Thread> {
    let created_at = now();
    let thread = Thread {
        id,
        subject: new_thread.subject.clone(),
        last_message: String::new(),
        last_message_at: created_at,
        participants: new_thread.participants.clone(),
        attachments: new_thread.attachments.clone(),
    };
    let row = thread.clone();

    db.with_conn(move |conn| {
        conn.execute(
            r#"
            INSERT INTO message_threads (
                id, subject, last_message, last_message_at, participants, attachments,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                row.id.0,
                row.subject,
                row.last_message,
                encode_time(row.last_message_at),
                serde_json::to_string(&row.participants)?,
                serde_json::to_string(&row.attachments)?,
                encode_time(created_at),
            ],
        )?;
        Ok(())
    })
    .await?;

    Ok(thread)
}

/// Retrieves a thread by its ID.
pub async fn get_by_id(db: &Database, thread_id: &ThreadId) -> Result<Option<Thread>> {
    let thread_id = thread_id.clone();

    db.with_conn(move |conn| {
        let sql = format!("SELECT {THREAD_COLUMNS} FROM message_threads WHERE id = ?1");
        let thread = conn
            .query_row(&sql, [&thread_id.0], row_to_thread)
            .optional()?;
        Ok(thread)
    })
    .await
}

/// Lists every thread, most recent activity first, ties broken by id.
pub async fn list_by_recency(db: &Database) -> Result<Vec<Thread>> {
    db.with_conn(|conn| {
        let sql = format!(
            "SELECT {THREAD_COLUMNS} FROM message_threads ORDER BY last_message_at DESC, id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_to_thread)?;
        let threads: std::result::Result<Vec<_>, _> = rows.collect();
        Ok(threads?)
    })
    .await
}

fn row_to_thread(row: &Row<'_>) -> rusqlite::Result<Thread> {
    Ok(Thread {
        id: ThreadId(row.get(0)?),
        subject: row.get(1)?,
        last_message: row.get(2)?,
        last_message_at: time_column(row, 3)?,
        participants: json_column(row, 4)?,
        attachments: json_column(row, 5)?,
    })
}
