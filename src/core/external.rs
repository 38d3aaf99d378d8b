//! External processes: Git GUI clients and the local git executable.
//!
//! # Public API
//! - [`launch_client`]: start the first usable GUI client for commit/push/pull
//! - [`reset_repository`]: `git -C <repo> reset --soft|--hard HEAD`
//! - [`split_command_line`]: quote-aware argument splitting for client templates

use crate::core::config::GitClientConfig;
use crate::core::error::{GitDeckError, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

const USERNAME_PLACEHOLDER: &str = "%USERNAME%";
const REPOSITORY_PLACEHOLDER: &str = "{0}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    /// Keep the work tree and the index.
    Soft,
    /// Discard every uncommitted change.
    Hard,
}

impl ResetMode {
    fn flag(self) -> &'static str {
        match self {
            Self::Soft => "--soft",
            Self::Hard => "--hard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientOperation {
    Commit,
    Push,
    Pull,
}

impl ClientOperation {
    pub fn label(self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Push => "push",
            Self::Pull => "pull",
        }
    }

    fn template(self, client: &GitClientConfig) -> &str {
        match self {
            Self::Commit => &client.commit_command,
            Self::Push => &client.push_command,
            Self::Pull => &client.pull_command,
        }
    }
}

fn current_username() -> String {
    std::env::var("USERNAME")
        .or_else(|_| std::env::var("USER"))
        .unwrap_or_default()
}

pub fn expand_client_path(path: &str) -> PathBuf {
    PathBuf::from(path.replace(USERNAME_PLACEHOLDER, &current_username()))
}

/// First enabled client whose expanded path exists on disk.
pub fn select_client(clients: &[GitClientConfig]) -> Result<(&GitClientConfig, PathBuf)> {
    let enabled: Vec<&GitClientConfig> = clients.iter().filter(|c| c.is_enabled).collect();
    if enabled.is_empty() {
        return Err(GitDeckError::NoGitClientEnabled);
    }

    enabled
        .iter()
        .map(|client| (*client, expand_client_path(&client.path)))
        .find(|(_, path)| path.is_file())
        .ok_or_else(|| GitDeckError::GitClientPathInvalid {
            names: enabled
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// Splits a command template into arguments. Double quotes group words and are removed.
pub fn split_command_line(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        args.push(current);
    }
    args
}

/// Launches a client for `operation` on `repo_path` without waiting for it.
/// Returns the name of the client started.
pub fn launch_client(
    clients: &[GitClientConfig],
    operation: ClientOperation,
    repo_path: &Path,
) -> Result<String> {
    let (client, executable) = select_client(clients)?;
    let repo = repo_path.to_string_lossy();
    let args: Vec<String> = split_command_line(operation.template(client))
        .into_iter()
        .map(|arg| arg.replace(REPOSITORY_PLACEHOLDER, &repo))
        .collect();

    log::debug!(
        "Launching {} for {}: {} {:?}",
        client.name,
        operation.label(),
        executable.display(),
        args
    );

    let mut child = Command::new(&executable)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| GitDeckError::process_launch_failed(&executable, e))?;

    // Reap the client whenever it exits.
    std::thread::spawn(move || {
        let _ = child.wait();
    });

    Ok(client.name.clone())
}

/// Moves the current branch back to HEAD through the local git executable.
/// Returns git's stdout on success.
pub fn reset_repository(git_executable: &Path, repo_path: &Path, mode: ResetMode) -> Result<String> {
    let output = Command::new(git_executable)
        .arg("-C")
        .arg(repo_path)
        .args(["reset", mode.flag(), "HEAD"])
        .stdin(Stdio::null())
        .output()
        .map_err(|e| GitDeckError::process_launch_failed(git_executable, e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GitDeckError::git_command_failed(
            output.status.code(),
            stderr.trim(),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
