//! carelink - console front end for the care portal messaging core

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use carelink::app::ViewEvent;
use carelink::config::Settings;
use carelink::domain::{NewThread, Participant, ThreadId};
use carelink::providers::{LocalStore, MessagingBackend};
use carelink::services::TailChange;
use carelink::ui::{self, Command, MessageRow};
use carelink::ViewCoordinator;

#[tokio::main]
async fn main() -> Result<()> {
    let settings_path = Settings::default_path();
    let settings = match &settings_path {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    // Logs go to stderr so they do not interleave with the console.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting carelink");

    // Write the defaults on first run so there is a file to edit.
    if let Some(path) = settings_path.filter(|path| !path.exists()) {
        if let Err(e) = settings.save(&path) {
            tracing::warn!(path = %path.display(), error = %e, "Could not write default settings");
        }
    }

    let store = match settings.storage.resolved_database_path() {
        Some(path) => LocalStore::open(&path)
            .await
            .with_context(|| format!("opening store at {}", path.display()))?,
        None => {
            tracing::warn!("No data directory available, using an in-memory store");
            LocalStore::in_memory().await?
        }
    };
    let store = Arc::new(store);
    let backend: Arc<dyn MessagingBackend> = store.clone();

    let mut view = ViewCoordinator::open(backend, settings.session.identity(), &settings);
    let result = run_console(&mut view, &store).await;
    view.shutdown().await;
    result
}

async fn run_console(view: &mut ViewCoordinator, store: &LocalStore) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut messages = view.watch_messages();
    let mut events = view.subscribe();

    println!("Signed in as {}. {}", view.identity().name, ui::HELP);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("reading input")? else {
                    return Ok(());
                };
                match Command::parse(&line) {
                    Ok(Command::Quit) => return Ok(()),
                    Ok(command) => execute(view, store, command).await,
                    Err(usage) => println!("{usage}"),
                }
            }
            Ok(()) = messages.changed() => {
                let log = messages.borrow_and_update().clone();
                match log.tail {
                    TailChange::Appended(added) => {
                        let start = log.messages.len().saturating_sub(added);
                        for message in &log.messages[start..] {
                            let row = MessageRow::new(message, view.identity(), &Local);
                            print!("{}", ui::format_message(&row));
                        }
                    }
                    TailChange::Reset if log.thread_id.is_some() => {
                        print!("{}", ui::render_messages(&view.render(), view.identity(), &Local));
                    }
                    _ => {}
                }
            }
            Ok(event) = events.recv() => match event {
                ViewEvent::IndexDegraded { error } => {
                    println!("! thread list is out of date: {error}");
                }
                ViewEvent::IndexRecovered => println!("thread list reconnected"),
                _ => {}
            },
        }
    }
}

async fn execute(view: &mut ViewCoordinator, store: &LocalStore, command: Command) {
    match command {
        Command::Threads => print!("{}", ui::render_threads(&view.render(), &Local)),
        Command::Open(id) => {
            view.select_thread(ThreadId::from(id)).await;
            print!("{}", ui::render_sidebar(&view.render()));
        }
        Command::Close => {
            view.clear_selection().await;
            println!("thread closed");
        }
        Command::Sidebar => {
            if view.toggle_sidebar() {
                print!("{}", ui::render_sidebar(&view.render()));
            } else {
                println!("sidebar hidden");
            }
        }
        Command::Search(query) => {
            view.set_search(&query);
            print!("{}", ui::render_threads(&view.render(), &Local));
        }
        Command::Send(text) => {
            view.set_draft(text);
            match view.send().await {
                Err(e) if e.is_retryable() => println!("! {e}; try again"),
                Err(e) => println!("! {e}"),
                Ok(_) => {}
            }
        }
        Command::New(subject) => {
            let identity = view.identity().clone();
            let new_thread = NewThread {
                subject,
                participants: vec![Participant::new(identity.id, identity.name, "staff")],
                ..NewThread::default()
            };
            match store.create_thread(new_thread).await {
                Ok(thread) => {
                    println!("created thread {}", thread.id);
                    view.select_thread(thread.id).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create thread");
                    println!("! could not create thread: {e}");
                }
            }
        }
        Command::Help => println!("{}", ui::HELP),
        Command::Quit => {}
    }
}
