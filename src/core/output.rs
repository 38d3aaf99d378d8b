//! Terminal formatting shared by every command.
//!
//! Red for errors, yellow for warnings, green for success, blue for branch names and
//! bright_black for secondary detail.

use crate::core::events::{Notification, Severity};
use crate::core::snapshot::RepositorySnapshot;
use colored::*;

/// Prints `✕ Error: <message>` in red, padded with blank lines.
pub fn print_error(message: &str) {
    eprintln!("\n{} {}\n", "✕ Error:".red(), message.white());
}

pub fn print_warning(message: &str) {
    println!("{} {}", "!".yellow(), message.white());
}

/// Prints `✓ <message>` with the checkmark in green.
pub fn print_success(message: &str) {
    println!("\n{} {}", "✓".green(), message.white());
}

pub fn print_info(message: &str) {
    println!("\n{}\n", message.white());
}

/// Prints `<header>:` between blank lines.
pub fn print_section_header(header: &str) {
    println!("\n{}:\n", header.white());
}

pub fn print_notification(notice: &Notification) {
    match notice.severity {
        Severity::Info => println!("{}", notice.message.bright_black()),
        Severity::Success => println!("{} {}", "✓".green(), notice.message.white()),
        Severity::Warning => print_warning(&notice.message),
        Severity::Error => eprintln!("{} {}", "✕".red(), notice.message.white()),
    }
}

/// `(+ahead/-behind)`, `(+ahead)`, `(-behind)` or nothing when in sync.
pub fn format_ahead_behind(ahead: usize, behind: usize) -> String {
    let counts = match (ahead, behind) {
        (0, 0) => return String::new(),
        (a, 0) => format!("+{}", a.to_string().white()),
        (0, b) => format!("-{}", b.to_string().white()),
        (a, b) => format!("+{}/-{}", a.to_string().white(), b.to_string().white()),
    };
    format!(" {}{}{}", "(".bright_black(), counts, ")".bright_black())
}

/// One line per repository:
/// `repoA  [main] (+1/-2)  3 pending  a1b2c3d Fix parser (2 hours ago)`
pub fn format_repository_row(snapshot: &RepositorySnapshot, name_width: usize) -> String {
    let name = format!("{:<width$}", snapshot.display_name(), width = name_width);
    let branch = format!(
        "{}{}{}",
        "[".bright_black(),
        snapshot.current_branch.blue(),
        "]".bright_black()
    );
    let ahead_behind = format_ahead_behind(snapshot.ahead, snapshot.behind);

    let pending = match snapshot.pending_changes {
        0 => "clean".bright_black().to_string(),
        n => format!("{} pending", n.to_string().yellow()),
    };

    let commit = match &snapshot.last_commit {
        Some(commit) => format!(
            "{} {} {}",
            commit.short_id().bright_black(),
            commit.summary().white(),
            format!("({}, {})", commit.author_name, format_age(commit.author_time)).bright_black()
        ),
        None => "- no commits yet -".bright_black().to_string(),
    };

    let fetching = if snapshot.is_fetching {
        format!(" {}", "fetching…".cyan())
    } else {
        String::new()
    };

    format!(
        "{}  {}{}  {}  {}{}",
        name.white(),
        branch,
        ahead_behind,
        pending,
        commit,
        fetching
    )
}

fn format_age(time: chrono::DateTime<chrono::FixedOffset>) -> String {
    let elapsed = chrono::Utc::now().signed_duration_since(time);
    match elapsed.num_minutes() {
        m if m < 1 => "just now".to_string(),
        m if m < 60 => format!("{m} minutes ago"),
        m if m < 60 * 24 => format!("{} hours ago", m / 60),
        m => format!("{} days ago", m / (60 * 24)),
    }
}
