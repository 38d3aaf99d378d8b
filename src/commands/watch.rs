use crate::commands::status::print_repositories;
use crate::core::{
    command_init::WorkspaceCommandInit,
    error::Result,
    events::WorkspaceEvent,
    output::format_repository_row,
    print_info, print_notification, print_warning,
    scheduler::{RefreshScheduler, Trigger},
    session::WorkspaceSession,
};
use colored::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// A line typed while watching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCommand {
    /// `r`: rescan and fetch everything.
    Reload,
    /// `f`: behave as if the window regained focus.
    Focus,
    /// Empty line: rescan without fetching.
    LocalRefresh,
    Quit,
    Unknown(String),
}

pub fn parse_watch_command(line: &str) -> WatchCommand {
    match line.trim() {
        "" => WatchCommand::LocalRefresh,
        "r" | "reload" => WatchCommand::Reload,
        "f" | "focus" => WatchCommand::Focus,
        "q" | "quit" | "exit" => WatchCommand::Quit,
        other => WatchCommand::Unknown(other.to_string()),
    }
}

impl WatchCommand {
    fn trigger(&self) -> Option<Trigger> {
        match self {
            Self::Reload => Some(Trigger::Explicit { fetch: true }),
            Self::Focus => Some(Trigger::FocusRegained),
            Self::LocalRefresh => Some(Trigger::Explicit { fetch: false }),
            Self::Quit | Self::Unknown(_) => None,
        }
    }
}

pub async fn execute_watch(workspace: Option<&str>, interval_secs: Option<u64>) -> Result<()> {
    let mut context = WorkspaceCommandInit::open(workspace)?;
    let period = Duration::from_secs(
        interval_secs
            .unwrap_or(context.settings.refresh_interval_secs)
            .max(1),
    );
    context.remember_workspace();

    let session = Arc::clone(&context.session);
    let scheduler = RefreshScheduler::start(
        Arc::clone(&session),
        period,
        context.settings.fetch_on_tick,
    );
    scheduler.trigger(Trigger::Explicit { fetch: true });

    println!(
        "{}",
        format!(
            "Watching {} every {}s. r = reload, f = focus refresh, enter = local refresh, q = quit",
            context.root.display(),
            period.as_secs()
        )
        .bright_black()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    let command = parse_watch_command(&line);
                    match (&command, command.trigger()) {
                        (WatchCommand::Quit, _) => break,
                        (WatchCommand::Unknown(other), _) => {
                            print_warning(&format!("Unknown command '{other}'"));
                        }
                        (_, Some(trigger)) => {
                            if !scheduler.trigger(trigger) {
                                log::debug!("Trigger queue full, dropping {trigger:?}");
                            }
                        }
                        (_, None) => {}
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    log::warn!("Stopped reading stdin: {e}");
                    stdin_open = false;
                }
            },
            event = context.events.recv() => match event {
                Some(event) => render_event(&session, event),
                None => break,
            },
        }
    }

    scheduler.stop().await;
    session.shutdown();
    print_info("Stopped watching");
    Ok(())
}

fn render_event(session: &WorkspaceSession, event: WorkspaceEvent) {
    match event {
        WorkspaceEvent::ListReplaced { .. } => {
            print_repositories(&session.root(), &session.repositories());
        }
        WorkspaceEvent::RepositoryUpdated { path } => {
            if let Some(entry) = session.entry(&path) {
                println!("{}", format_repository_row(&entry.snapshot(), 0));
            }
        }
        WorkspaceEvent::Notice(notice) => print_notification(&notice),
    }
}
