//! One open workspace: the repository list and everything that refreshes it.
//!
//! [`WorkspaceSession`] owns the list, the fetch coordinator and the credential cache, and
//! tears down in-flight fetches in [`WorkspaceSession::shutdown`]. Scans replace the list as
//! a whole; fetches and branch switches update single entries in place.

use crate::core::{
    config::{AppSettings, GitClientConfig},
    credentials::{CredentialCache, CredentialSource, GitCredentialHelper},
    error::{GitDeckError, Result},
    events::{EventReceiver, EventSink, Severity, WorkspaceEvent},
    external::{self, ClientOperation, ResetMode},
    fetch::{FetchCoordinator, Git2RemoteFetcher, RemoteFetcher},
    probe::{self, ProbeOptions},
    scanner::scan,
    scheduler::Refresher,
    snapshot::{display_name, RepositoryEntry, RepositorySnapshot},
};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::task::JoinHandle;

/// Values a session takes from the application settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub root: PathBuf,
    pub probe_options: ProbeOptions,
    pub git_executable: PathBuf,
    pub git_clients: Vec<GitClientConfig>,
}

impl SessionConfig {
    pub fn from_settings(settings: &AppSettings, root: PathBuf) -> Self {
        Self {
            root,
            probe_options: ProbeOptions {
                include_remote_branches: settings.show_remote_branches,
            },
            git_executable: settings.git_executable.clone(),
            git_clients: settings.git_clients.clone(),
        }
    }
}

pub struct WorkspaceSession {
    root: RwLock<PathBuf>,
    repositories: RwLock<Vec<Arc<RepositoryEntry>>>,
    last_error: RwLock<Option<String>>,
    coordinator: FetchCoordinator,
    probe_options: ProbeOptions,
    git_executable: PathBuf,
    git_clients: Vec<GitClientConfig>,
    events: EventSink,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl WorkspaceSession {
    /// Session backed by libgit2 fetches and `git credential fill`.
    pub fn new(config: SessionConfig) -> (Arc<Self>, EventReceiver) {
        let helper = Arc::new(GitCredentialHelper::new(config.git_executable.clone()));
        Self::with_parts(config, Arc::new(Git2RemoteFetcher), helper)
    }

    pub fn with_parts(
        config: SessionConfig,
        fetcher: Arc<dyn RemoteFetcher>,
        credential_source: Arc<dyn CredentialSource>,
    ) -> (Arc<Self>, EventReceiver) {
        let (events, rx) = EventSink::channel();
        let credentials = Arc::new(CredentialCache::new(credential_source));
        let coordinator = FetchCoordinator::new(
            fetcher,
            credentials,
            config.probe_options.clone(),
            events.clone(),
        );

        let session = Self {
            root: RwLock::new(config.root),
            repositories: RwLock::new(Vec::new()),
            last_error: RwLock::new(None),
            coordinator,
            probe_options: config.probe_options,
            git_executable: config.git_executable,
            git_clients: config.git_clients,
            events,
        };
        (Arc::new(session), rx)
    }

    pub fn root(&self) -> PathBuf {
        read(&self.root).clone()
    }

    /// Points the session at another workspace. Takes effect on the next refresh.
    pub fn set_root(&self, root: PathBuf) {
        *write(&self.root) = root;
    }

    pub fn repositories(&self) -> Vec<RepositorySnapshot> {
        read(&self.repositories)
            .iter()
            .map(|entry| entry.snapshot())
            .collect()
    }

    pub fn entry(&self, path: &Path) -> Option<Arc<RepositoryEntry>> {
        read(&self.repositories)
            .iter()
            .find(|entry| entry.path() == path)
            .cloned()
    }

    /// Error of the most recent failed scan, cleared by the next successful one.
    pub fn last_error(&self) -> Option<String> {
        read(&self.last_error).clone()
    }

    pub fn in_flight_fetches(&self) -> usize {
        self.coordinator.in_flight()
    }

    /// Rescans the workspace and, when `fetch` is set, starts a fetch for every repository.
    /// Returns the number of repositories found.
    pub async fn refresh(&self, fetch: bool) -> Result<usize> {
        let count = self.rescan().await?;
        if fetch {
            self.fetch_all();
        }
        Ok(count)
    }

    async fn rescan(&self) -> Result<usize> {
        let root = self.root();
        let scan_root = root.clone();
        let options = self.probe_options.clone();
        let result = tokio::task::spawn_blocking(move || scan(&scan_root, &options)).await?;

        match result {
            Ok(report) => {
                for warning in &report.warnings {
                    self.events.warn(format!(
                        "Repository {}: {}",
                        display_name(&warning.path),
                        warning.message
                    ));
                }
                let count = self.replace_list(report.snapshots);
                *write(&self.last_error) = None;
                self.events.emit(WorkspaceEvent::ListReplaced { count });
                Ok(count)
            }
            Err(e) => {
                self.replace_list(Vec::new());
                *write(&self.last_error) = Some(e.to_string());
                self.events
                    .error(format!("Cannot scan workspace {}: {e}", root.display()));
                self.events.emit(WorkspaceEvent::ListReplaced { count: 0 });
                Err(e)
            }
        }
    }

    /// Builds the new list. Entries with a fetch in flight are carried over so the running
    /// fetch keeps writing to the entry that is displayed.
    fn replace_list(&self, snapshots: Vec<RepositorySnapshot>) -> usize {
        let mut repositories = write(&self.repositories);
        let mut fetching: HashMap<PathBuf, Arc<RepositoryEntry>> = repositories
            .drain(..)
            .filter(|entry| entry.is_fetching())
            .map(|entry| (entry.path().to_path_buf(), entry))
            .collect();

        let next: Vec<Arc<RepositoryEntry>> = snapshots
            .into_iter()
            .map(|snapshot| match fetching.remove(&snapshot.path) {
                Some(entry) => {
                    entry.update(snapshot);
                    entry
                }
                None => Arc::new(RepositoryEntry::new(snapshot)),
            })
            .collect();

        for orphan in fetching.keys() {
            log::debug!("{} left the workspace during a fetch", orphan.display());
        }

        *repositories = next;
        repositories.len()
    }

    /// Starts a fetch for every listed repository not already fetching.
    pub fn fetch_all(&self) -> Vec<JoinHandle<()>> {
        read(&self.repositories)
            .iter()
            .filter_map(|entry| self.coordinator.fetch_async(entry))
            .collect()
    }

    pub fn fetch(&self, path: &Path) -> Result<Option<JoinHandle<()>>> {
        let entry = self.require_entry(path)?;
        Ok(self.coordinator.fetch_async(&entry))
    }

    fn require_entry(&self, path: &Path) -> Result<Arc<RepositoryEntry>> {
        self.entry(path)
            .ok_or_else(|| GitDeckError::repository_not_in_workspace(path))
    }

    /// Checks out `branch` and updates the entry in place.
    pub async fn switch_branch(&self, path: &Path, branch: &str) -> Result<RepositorySnapshot> {
        let entry = self.require_entry(path)?;
        let repo_path = path.to_path_buf();
        let name = branch.to_string();
        let options = self.probe_options.clone();
        let snapshot =
            tokio::task::spawn_blocking(move || probe::switch_branch(&repo_path, &name, &options))
                .await??;

        entry.update(snapshot);
        self.events.emit(WorkspaceEvent::RepositoryUpdated {
            path: path.to_path_buf(),
        });
        self.events.notify(
            Severity::Success,
            format!("Repository {}: switched to {branch}", display_name(path)),
        );
        Ok(entry.snapshot())
    }

    /// Resets the repository through the git executable, then rescans without fetching.
    pub async fn reset(&self, path: &Path, mode: ResetMode) -> Result<()> {
        self.require_entry(path)?;
        let git = self.git_executable.clone();
        let repo_path = path.to_path_buf();
        tokio::task::spawn_blocking(move || external::reset_repository(&git, &repo_path, mode))
            .await??;

        self.events.notify(
            Severity::Success,
            format!("Repository {}: reset ({mode:?})", display_name(path)),
        );
        self.refresh(false).await?;
        Ok(())
    }

    /// Opens the configured GUI client for `operation`. Returns the client's name.
    pub fn launch_client(&self, operation: ClientOperation, path: &Path) -> Result<String> {
        self.require_entry(path)?;
        external::launch_client(&self.git_clients, operation, path)
    }

    /// Detaches in-flight fetches. The session stays readable but starts nothing new on its
    /// own.
    pub fn shutdown(&self) {
        self.coordinator.shutdown();
    }
}

impl Refresher for WorkspaceSession {
    fn run_refresh(self: Arc<Self>, fetch: bool) -> impl Future<Output = ()> + Send {
        async move {
            if let Err(e) = self.refresh(fetch).await {
                log::debug!("Scheduled refresh failed: {e}");
            }
        }
    }
}
