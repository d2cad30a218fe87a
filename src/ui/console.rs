//! Line-oriented console over the messaging view.

use std::fmt::{Display, Write};

use chrono::TimeZone;

use super::format::{MessageRow, SidebarPanel, ThreadRow};
use crate::app::MessagingView;
use crate::domain::Identity;

/// Command summary printed by `help`.
pub const HELP: &str = "\
Commands:
  threads          list threads
  open <id>        open a thread
  close            close the open thread
  sidebar          show or hide thread details
  search <text>    filter the thread list (empty clears)
  send <text>      send a message to the open thread
  new <subject>    start a new thread
  help             show this help
  quit             exit";

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Threads,
    Open(String),
    Close,
    Sidebar,
    Search(String),
    Send(String),
    New(String),
    Help,
    Quit,
}

impl Command {
    /// Parses one input line. Returns `Err` with a user-facing message for
    /// unknown commands or missing arguments.
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let required = |name: &str| {
            if rest.is_empty() {
                Err(format!("usage: {name} <argument>"))
            } else {
                Ok(rest.to_string())
            }
        };

        match word.to_lowercase().as_str() {
            "threads" | "ls" => Ok(Command::Threads),
            "open" => required("open").map(Command::Open),
            "close" => Ok(Command::Close),
            "sidebar" => Ok(Command::Sidebar),
            "search" => Ok(Command::Search(rest.to_string())),
            // Blank text is passed through so the view can reject it.
            "send" => Ok(Command::Send(rest.to_string())),
            "new" => required("new").map(Command::New),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            "" => Err("type `help` for commands".to_string()),
            other => Err(format!("unknown command `{other}`; type `help`")),
        }
    }
}

/// Renders the thread list.
pub fn render_threads<Tz>(view: &MessagingView, zone: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::new();
    if view.index_stale {
        match &view.index_error {
            Some(error) => {
                let _ = writeln!(out, "! thread list may be out of date ({error})");
            }
            None => out.push_str("! thread list may be out of date\n"),
        }
    }
    if view.threads.is_empty() {
        out.push_str("(no threads)\n");
    }
    for thread in &view.threads {
        let row = ThreadRow::new(thread, view.selected.as_ref() == Some(&thread.id), zone);
        let marker = if row.selected { '>' } else { ' ' };
        let _ = writeln!(
            out,
            "{marker} {:<8} {}  [{}]\n    {}  ({})",
            row.date, row.subject, row.id, row.preview, row.participants
        );
    }
    out
}

/// Renders the open thread's messages.
pub fn render_messages<Tz>(view: &MessagingView, viewer: &Identity, zone: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::new();
    let Some(selected) = &view.selected else {
        out.push_str("(no thread open)\n");
        return out;
    };

    let title = view
        .selected_thread()
        .map(|t| t.subject.as_str())
        .unwrap_or(selected.0.as_str());
    let _ = writeln!(out, "== {title} ==");
    if view.messages_stale {
        out.push_str("! messages may be out of date\n");
    }
    for message in &view.messages {
        out.push_str(&format_message(&MessageRow::new(message, viewer, zone)));
    }
    if let Some(error) = &view.last_error {
        let _ = writeln!(out, "! {error}");
    }
    out
}

/// Formats one message entry.
pub fn format_message(row: &MessageRow) -> String {
    let who = if row.own { "You" } else { row.sender.as_str() };
    let mut out = format!("[{}] {}: {}\n", row.time, who, row.content);
    for name in &row.attachments {
        let _ = writeln!(out, "      + {name}");
    }
    out
}

/// Renders the sidebar, or nothing when it is hidden or has no detail.
pub fn render_sidebar(view: &MessagingView) -> String {
    let Some(thread) = view.detail.as_ref().filter(|_| view.sidebar_open) else {
        return String::new();
    };

    let panel = SidebarPanel::new(thread);
    let mut out = format!("-- {} --\nParticipants:\n", panel.subject);
    for p in &panel.participants {
        let _ = writeln!(out, "  ({}) {} - {}", p.initial, p.name, p.role);
    }
    if !panel.documents.is_empty() {
        out.push_str("Documents:\n");
        for doc in &panel.documents {
            let _ = writeln!(out, "  {doc}");
        }
    }
    out
}
