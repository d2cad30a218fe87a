//! Display formatting for threads, messages and the sidebar.
//!
//! Everything here is pure: timestamps are converted into the zone passed by
//! the caller, so the same helpers serve the console (local time) and tests
//! (UTC).

use std::fmt::Display;

use chrono::{DateTime, TimeZone, Utc};

use crate::domain::{Attachment, Identity, Message, Participant, Thread};

/// Longest preview shown in a thread row, in characters.
const PREVIEW_CHARS: usize = 60;

/// Date of a thread's last activity, e.g. `Jan 2`.
pub fn list_date<Tz>(at: &DateTime<Utc>, zone: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.with_timezone(zone).format("%b %-d").to_string()
}

/// Time of a message, e.g. `9:05 AM`.
pub fn message_time<Tz>(at: &DateTime<Utc>, zone: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.with_timezone(zone).format("%-I:%M %p").to_string()
}

fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

/// One line of the thread list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRow {
    pub id: String,
    pub subject: String,
    pub date: String,
    pub preview: String,
    pub participants: String,
    pub selected: bool,
}

impl ThreadRow {
    pub fn new<Tz>(thread: &Thread, selected: bool, zone: &Tz) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        Self {
            id: thread.id.to_string(),
            subject: thread.subject.clone(),
            date: list_date(&thread.last_message_at, zone),
            preview: truncate_text(&thread.last_message, PREVIEW_CHARS),
            participants: thread.participant_names(),
            selected,
        }
    }
}

/// One entry of the message log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRow {
    pub sender: String,
    pub time: String,
    pub content: String,
    /// Sent by the signed-in user.
    pub own: bool,
    pub attachments: Vec<String>,
}

impl MessageRow {
    pub fn new<Tz>(message: &Message, viewer: &Identity, zone: &Tz) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        Self {
            sender: message.sender_name.clone(),
            time: message_time(&message.timestamp, zone),
            content: message.content.clone(),
            own: message.is_from(viewer),
            attachments: message.attachments.iter().map(|a| a.name.clone()).collect(),
        }
    }
}

/// A participant as listed in the sidebar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantRow {
    pub initial: String,
    pub name: String,
    pub role: String,
}

impl From<&Participant> for ParticipantRow {
    fn from(participant: &Participant) -> Self {
        Self {
            initial: participant
                .initial()
                .map(|c| c.to_uppercase().to_string())
                .unwrap_or_else(|| "?".to_string()),
            name: participant.name.clone(),
            role: participant.role.clone(),
        }
    }
}

/// Thread details shown next to the message log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarPanel {
    pub subject: String,
    pub participants: Vec<ParticipantRow>,
    /// Related documents as `name (type)`.
    pub documents: Vec<String>,
}

impl SidebarPanel {
    pub fn new(thread: &Thread) -> Self {
        Self {
            subject: thread.subject.clone(),
            participants: thread.participants.iter().map(ParticipantRow::from).collect(),
            documents: thread.attachments.iter().map(document_label).collect(),
        }
    }
}

fn document_label(attachment: &Attachment) -> String {
    if attachment.kind.is_empty() {
        attachment.name.clone()
    } else {
        format!("{} ({})", attachment.name, attachment.kind)
    }
}
