//! Shared setup for commands that operate on the active workspace.
//!
//! # Public API
//! - [`WorkspaceCommandInit`]: loads settings, resolves the workspace and opens a session
//! - [`WorkspaceCommandContext`]: the opened session plus the settings it came from
//!
//! # Initialization Steps
//! 1. **Settings**: load `settings.json`, falling back to defaults
//! 2. **Workspace**: `--workspace` override, last used, first listed, or the current dir
//! 3. **Session**: libgit2 fetcher and `git credential fill` helper
//! 4. **Scan** (`initialize` only): one local-only refresh

use crate::core::{
    config::AppSettings,
    dirs::{normalize_workspace_path, resolve_repository_path},
    error::{GitDeckError, Result},
    events::{EventReceiver, WorkspaceEvent},
    output::print_notification,
    session::{SessionConfig, WorkspaceSession},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct WorkspaceCommandContext {
    pub settings: AppSettings,
    pub root: PathBuf,
    pub session: Arc<WorkspaceSession>,
    pub events: EventReceiver,
}

pub struct WorkspaceCommandInit;

impl WorkspaceCommandInit {
    /// Opens the session without scanning.
    pub fn open(workspace: Option<&str>) -> Result<WorkspaceCommandContext> {
        let settings = AppSettings::load_or_default();
        let root = canonical_or_raw(&settings.active_workspace(workspace)?);
        log::debug!("Opening workspace {}", root.display());

        let (session, events) =
            WorkspaceSession::new(SessionConfig::from_settings(&settings, root.clone()));
        Ok(WorkspaceCommandContext {
            settings,
            root,
            session,
            events,
        })
    }

    /// Opens the session and runs one local-only scan.
    pub async fn initialize(workspace: Option<&str>) -> Result<WorkspaceCommandContext> {
        let context = Self::open(workspace)?;
        context.session.refresh(false).await?;
        Ok(context)
    }
}

fn canonical_or_raw(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

impl WorkspaceCommandContext {
    /// Resolves a repository argument (name or path) to a listed repository.
    pub fn repository_path(&self, repo: &str) -> Result<PathBuf> {
        let normalized = normalize_workspace_path(repo);
        let path = canonical_or_raw(&resolve_repository_path(
            &self.root,
            &normalized.to_string_lossy(),
        ));
        match self.session.entry(&path) {
            Some(entry) => Ok(entry.path().to_path_buf()),
            None => Err(GitDeckError::repository_not_in_workspace(path)),
        }
    }

    /// Prints every queued notice and drops the other events.
    pub fn print_notices(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            if let WorkspaceEvent::Notice(notice) = event {
                print_notification(&notice);
            }
        }
    }

    /// Stores the workspace as last used. Failures are logged, not returned.
    pub fn remember_workspace(&mut self) {
        let added = self.settings.add_workspace(self.root.clone());
        if let Err(e) = self.settings.save() {
            log::warn!("Could not remember workspace {}: {e}", self.root.display());
        } else if added {
            log::debug!("Added {} to the workspace list", self.root.display());
        }
    }
}
