//! Persisted application settings.
//!
//! Settings live in `settings.json` inside the gitdeck config directory. Missing fields fall
//! back to their defaults so older files keep loading.

use crate::core::dirs::{get_settings_path, normalize_workspace_path};
use crate::core::error::{GitDeckError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// An external Git GUI client used for commit/push/pull.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GitClientConfig {
    pub name: String,
    /// Executable path; `%USERNAME%` is replaced with the current user at launch time.
    pub path: String,
    pub commit_command: String,
    pub push_command: String,
    pub pull_command: String,
    pub is_enabled: bool,
}

impl GitClientConfig {
    fn new(name: &str, path: &str, commands: [&str; 3], is_enabled: bool) -> Self {
        let [commit_command, push_command, pull_command] = commands;
        Self {
            name: name.to_string(),
            path: path.to_string(),
            commit_command: commit_command.to_string(),
            push_command: push_command.to_string(),
            pull_command: pull_command.to_string(),
            is_enabled,
        }
    }
}

pub fn default_git_clients() -> Vec<GitClientConfig> {
    vec![
        GitClientConfig::new(
            "TortoiseGit",
            r"C:\Program Files\TortoiseGit\bin\TortoiseGitProc.exe",
            [
                "/command:commit /path:\"{0}\"",
                "/command:push /path:\"{0}\"",
                "/command:pull /path:\"{0}\"",
            ],
            true,
        ),
        GitClientConfig::new(
            "SourceTree",
            r"C:\Users\%USERNAME%\AppData\Local\SourceTree\SourceTree.exe",
            ["-f \"{0}\" commit", "-f \"{0}\" push", "-f \"{0}\" pull"],
            false,
        ),
        GitClientConfig::new(
            "GitExtensions",
            r"C:\Program Files (x86)\GitExtensions\GitExtensions.exe",
            ["commit \"{0}\"", "push \"{0}\"", "pull \"{0}\""],
            false,
        ),
        GitClientConfig::new(
            "Fork",
            r"C:\Users\%USERNAME%\AppData\Local\Fork\Fork.exe",
            ["commit \"{0}\"", "push \"{0}\"", "pull \"{0}\""],
            false,
        ),
    ]
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    pub last_workspace_path: Option<PathBuf>,
    pub workspace_paths: Vec<PathBuf>,
    pub show_remote_branches: bool,
    pub git_executable: PathBuf,
    pub refresh_interval_secs: u64,
    /// Timer ticks stay local-only unless this is set.
    pub fetch_on_tick: bool,
    pub git_clients: Vec<GitClientConfig>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            last_workspace_path: None,
            workspace_paths: Vec::new(),
            show_remote_branches: false,
            git_executable: PathBuf::from("git"),
            refresh_interval_secs: 60,
            fetch_on_tick: false,
            git_clients: default_git_clients(),
        }
    }
}

impl AppSettings {
    pub fn load() -> Result<Self> {
        Self::load_from(&get_settings_path()?)
    }

    /// Loads settings, falling back to defaults when the file is unreadable.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            log::warn!("Using default settings: {e}");
            Self::default()
        })
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Settings file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| GitDeckError::settings_read_failed(path, e))?;
        let mut settings: Self = serde_json::from_str(&content)
            .map_err(|e| GitDeckError::settings_parse_failed(path, e))?;
        settings.merge_default_clients();
        Ok(settings)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&get_settings_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| GitDeckError::settings_write_failed(parent, e))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| GitDeckError::settings_write_failed(path, e))?;
        log::debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Appends any built-in client the file does not mention by name.
    fn merge_default_clients(&mut self) {
        for client in default_git_clients() {
            if !self.git_clients.iter().any(|c| c.name == client.name) {
                self.git_clients.push(client);
            }
        }
    }

    /// Picks the workspace to open: explicit override, last used, first listed, or the
    /// current directory.
    pub fn active_workspace(&self, override_path: Option<&str>) -> Result<PathBuf> {
        if let Some(raw) = override_path {
            return Ok(normalize_workspace_path(raw));
        }
        if let Some(last) = &self.last_workspace_path {
            return Ok(last.clone());
        }
        if let Some(first) = self.workspace_paths.first() {
            return Ok(first.clone());
        }
        Ok(std::env::current_dir()?)
    }

    /// Records `path` as known and last used. Returns false when it was already listed.
    pub fn add_workspace(&mut self, path: PathBuf) -> bool {
        let added = if self.workspace_paths.contains(&path) {
            false
        } else {
            self.workspace_paths.push(path.clone());
            true
        };
        self.last_workspace_path = Some(path);
        added
    }

    /// Removes a workspace path and makes the first remaining one active.
    pub fn remove_workspace(&mut self, path: &Path) -> Result<PathBuf> {
        if self.workspace_paths.len() <= 1 {
            return Err(GitDeckError::LastWorkspace);
        }
        self.workspace_paths.retain(|p| p != path);
        let next = self
            .workspace_paths
            .first()
            .cloned()
            .ok_or(GitDeckError::LastWorkspace)?;
        self.last_workspace_path = Some(next.clone());
        Ok(next)
    }
}
