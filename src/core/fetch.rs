//! Background fetches, at most one per repository.
//!
//! [`FetchCoordinator::fetch_async`] claims the repository path and the entry's fetch flag,
//! fetches every remote in turn on the blocking pool, re-probes the repository and releases
//! both. A second call for the same path does nothing while the claim is held, even when it
//! comes through a newer entry built by a rescan. Fetches of different repositories run in
//! parallel and in no particular order.

use crate::core::{
    credentials::{Credential, CredentialCache},
    error::{GitDeckError, Result},
    events::{EventSink, WorkspaceEvent},
    probe::{probe, ProbeOptions},
    snapshot::{display_name, RepositoryEntry},
};
use git2::{AutotagOption, Cred, CredentialType, FetchOptions, RemoteCallbacks, Repository};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::{AbortHandle, JoinHandle};

/// Credential callbacks allowed per remote before the fetch gives up.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Network side of a fetch, split out so the coordination logic can run against a fake.
pub trait RemoteFetcher: Send + Sync {
    fn remote_names(&self, repo_path: &Path) -> Result<Vec<String>>;

    fn fetch_remote(
        &self,
        repo_path: &Path,
        remote: &str,
        credentials: &CredentialCache,
    ) -> Result<()>;
}

/// Fetches through libgit2 using each remote's configured ref-specs.
#[derive(Debug, Default, Clone, Copy)]
pub struct Git2RemoteFetcher;

impl RemoteFetcher for Git2RemoteFetcher {
    fn remote_names(&self, repo_path: &Path) -> Result<Vec<String>> {
        let repo = Repository::open(repo_path)?;
        let remotes = repo.remotes()?;
        Ok(remotes.iter().flatten().map(str::to_string).collect())
    }

    fn fetch_remote(
        &self,
        repo_path: &Path,
        remote_name: &str,
        credentials: &CredentialCache,
    ) -> Result<()> {
        let repo = Repository::open(repo_path)?;
        let mut remote = repo.find_remote(remote_name)?;
        let refspecs: Vec<String> = remote
            .fetch_refspecs()?
            .iter()
            .flatten()
            .map(str::to_string)
            .collect();

        let mut attempts = 0;
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |url, username_from_url, allowed| {
            attempts += 1;
            if attempts > MAX_CREDENTIAL_ATTEMPTS {
                credentials.evict_if_durable(url, username_from_url);
                return Err(git2::Error::from_str("credentials rejected by remote"));
            }
            credential_for(credentials, url, username_from_url, allowed)
        });

        let mut options = FetchOptions::new();
        options
            .remote_callbacks(callbacks)
            .download_tags(AutotagOption::Auto)
            .prune(git2::FetchPrune::Off);

        let reflog = format!("fetch: updating from {remote_name}");
        remote
            .fetch(&refspecs, Some(&mut options), Some(&reflog))
            .map_err(|e| GitDeckError::fetch_failed(remote_name, e))
    }
}

fn credential_for(
    credentials: &CredentialCache,
    url: &str,
    username_from_url: Option<&str>,
    allowed: CredentialType,
) -> std::result::Result<Cred, git2::Error> {
    let username = username_from_url.unwrap_or("git");
    if allowed.contains(CredentialType::SSH_KEY) {
        return Cred::ssh_key_from_agent(username);
    }
    if allowed.contains(CredentialType::USERNAME) {
        return Cred::username(username);
    }

    match credentials.resolve(url, username_from_url) {
        Credential::UserPass { username, password }
            if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) =>
        {
            Cred::userpass_plaintext(&username, &password)
        }
        _ => Cred::default(),
    }
}

/// Releases the path claim and the fetch flag when the fetch body ends, however it ends.
struct FetchGuard {
    entry: Arc<RepositoryEntry>,
    claimed: Arc<Mutex<HashSet<PathBuf>>>,
    events: EventSink,
}

impl Drop for FetchGuard {
    fn drop(&mut self) {
        self.entry.end_fetch();
        lock(&self.claimed).remove(self.entry.path());
        self.events.emit(WorkspaceEvent::RepositoryUpdated {
            path: self.entry.path().to_path_buf(),
        });
    }
}

pub struct FetchCoordinator {
    fetcher: Arc<dyn RemoteFetcher>,
    credentials: Arc<CredentialCache>,
    probe_options: ProbeOptions,
    events: EventSink,
    claimed: Arc<Mutex<HashSet<PathBuf>>>,
    in_flight: Mutex<Vec<AbortHandle>>,
}

impl std::fmt::Debug for FetchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("probe_options", &self.probe_options)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl FetchCoordinator {
    pub fn new(
        fetcher: Arc<dyn RemoteFetcher>,
        credentials: Arc<CredentialCache>,
        probe_options: ProbeOptions,
        events: EventSink,
    ) -> Self {
        Self {
            fetcher,
            credentials,
            probe_options,
            events,
            claimed: Arc::new(Mutex::new(HashSet::new())),
            in_flight: Mutex::new(Vec::new()),
        }
    }

    /// Starts a background fetch for `entry` unless one is already running.
    ///
    /// Must be called from within a tokio runtime. Returns the task handle when a fetch was
    /// started, `None` when the call was a no-op.
    pub fn fetch_async(&self, entry: &Arc<RepositoryEntry>) -> Option<JoinHandle<()>> {
        if !self.claim(entry) {
            log::debug!("Fetch already running for {}", entry.path().display());
            return None;
        }
        self.events.emit(WorkspaceEvent::RepositoryUpdated {
            path: entry.path().to_path_buf(),
        });

        let guard = FetchGuard {
            entry: Arc::clone(entry),
            claimed: Arc::clone(&self.claimed),
            events: self.events.clone(),
        };
        let fetcher = Arc::clone(&self.fetcher);
        let credentials = Arc::clone(&self.credentials);
        let probe_options = self.probe_options.clone();
        let events = self.events.clone();

        let handle = tokio::task::spawn_blocking(move || {
            run_fetch(&guard.entry, fetcher.as_ref(), &credentials, &probe_options, &events);
        });

        let mut in_flight = lock(&self.in_flight);
        in_flight.retain(|h| !h.is_finished());
        in_flight.push(handle.abort_handle());
        Some(handle)
    }

    /// Claims the path first and the entry flag second, under the path lock.
    fn claim(&self, entry: &RepositoryEntry) -> bool {
        let mut claimed = lock(&self.claimed);
        if claimed.contains(entry.path()) || !entry.try_begin_fetch() {
            return false;
        }
        claimed.insert(entry.path().to_path_buf())
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.in_flight).iter().filter(|h| !h.is_finished()).count()
    }

    /// Whether a fetch currently holds the claim on `path`.
    pub fn is_fetching(&self, path: &Path) -> bool {
        lock(&self.claimed).contains(path)
    }

    /// Detaches every in-flight fetch. Blocking libgit2 calls already running finish on
    /// their own; their results are still written to the entry they own.
    pub fn shutdown(&self) {
        let handles: Vec<_> = lock(&self.in_flight).drain(..).collect();
        for handle in handles {
            handle.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn run_fetch(
    entry: &RepositoryEntry,
    fetcher: &dyn RemoteFetcher,
    credentials: &CredentialCache,
    probe_options: &ProbeOptions,
    events: &EventSink,
) {
    let path = entry.path();
    let name = display_name(path);

    match fetcher.remote_names(path) {
        Ok(remotes) => {
            for remote in remotes {
                log::debug!("Fetching {name} from {remote}");
                if let Err(e) = fetcher.fetch_remote(path, &remote, credentials) {
                    events.warn(format!("Repository {name}: fetch from {remote} failed: {e}"));
                }
            }
        }
        Err(e) => events.warn(format!("Repository {name}: cannot list remotes: {e}")),
    }

    match probe(path, probe_options) {
        Ok(Some(snapshot)) => entry.update(snapshot),
        Ok(None) => events.warn(format!("Repository {name} is no longer a repository")),
        Err(e) => events.warn(format!("Repository {name}: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::{EventReceiver, Severity};
    use crate::core::test_support::*;

    fn coordinator(fetcher: Arc<FakeFetcher>) -> (FetchCoordinator, EventReceiver) {
        let (events, rx) = EventSink::channel();
        let credentials = Arc::new(CredentialCache::new(Arc::new(NoHelper)));
        let coordinator =
            FetchCoordinator::new(fetcher, credentials, ProbeOptions::default(), events);
        (coordinator, rx)
    }

    fn tracked_entry(ws: &TestWorkspace, name: &str) -> Result<Arc<RepositoryEntry>> {
        let (path, repo) = ws.init_repo(name)?;
        commit_files(&repo, &[("a.txt", "a")], "Initial commit")?;
        track_origin_main(&repo)?;
        let snapshot = probe(&path, &ProbeOptions::default())?.expect("repository");
        Ok(Arc::new(RepositoryEntry::new(snapshot)))
    }

    fn drain(rx: &mut EventReceiver) -> Vec<WorkspaceEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_second_fetch_while_in_flight_is_noop() -> Result<()> {
        let ws = TestWorkspace::new()?;
        let entry = tracked_entry(&ws, "repoA")?;
        let fetcher = Arc::new(FakeFetcher::new(&["origin"]).gated());
        let (coordinator, _rx) = coordinator(Arc::clone(&fetcher));

        let first = coordinator.fetch_async(&entry).expect("first fetch starts");
        assert!(entry.is_fetching());
        assert!(coordinator.fetch_async(&entry).is_none());

        fetcher.gate.release();
        first.await?;

        assert_eq!(fetcher.sequence_count(), 1);
        assert_eq!(fetcher.fetched(), vec!["origin".to_string()]);
        assert!(!entry.is_fetching());
        Ok(())
    }

    #[tokio::test]
    async fn test_second_entry_for_same_path_does_not_fetch() -> Result<()> {
        let ws = TestWorkspace::new()?;
        let entry = tracked_entry(&ws, "repoA")?;
        let rescanned = Arc::new(RepositoryEntry::new(entry.snapshot()));
        let fetcher = Arc::new(FakeFetcher::new(&["origin"]).gated());
        let (coordinator, _rx) = coordinator(Arc::clone(&fetcher));

        let first = coordinator.fetch_async(&entry).expect("first fetch starts");
        assert!(coordinator.fetch_async(&rescanned).is_none());
        assert!(!rescanned.is_fetching());
        assert!(coordinator.is_fetching(entry.path()));

        fetcher.gate.release();
        first.await?;
        assert!(!coordinator.is_fetching(entry.path()));
        assert_eq!(fetcher.sequence_count(), 1);

        coordinator
            .fetch_async(&rescanned)
            .expect("claim released after the first fetch")
            .await?;
        assert_eq!(fetcher.sequence_count(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_on_entry_marked_fetching_does_nothing() -> Result<()> {
        let ws = TestWorkspace::new()?;
        let entry = tracked_entry(&ws, "repoA")?;
        let fetcher = Arc::new(FakeFetcher::new(&["origin"]));
        let (coordinator, mut rx) = coordinator(Arc::clone(&fetcher));

        assert!(entry.try_begin_fetch());
        assert!(coordinator.fetch_async(&entry).is_none());

        assert_eq!(fetcher.sequence_count(), 0);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(coordinator.in_flight(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_remote_does_not_stop_the_others() -> Result<()> {
        let ws = TestWorkspace::new()?;
        let entry = tracked_entry(&ws, "repoA")?;
        let fetcher = Arc::new(FakeFetcher::new(&["broken", "origin"]).failing("broken"));
        let (coordinator, mut rx) = coordinator(Arc::clone(&fetcher));

        coordinator.fetch_async(&entry).expect("fetch starts").await?;

        assert_eq!(
            fetcher.fetched(),
            vec!["broken".to_string(), "origin".to_string()]
        );
        let warnings: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                WorkspaceEvent::Notice(notice) if notice.severity == Severity::Warning => {
                    Some(notice.message)
                }
                _ => None,
            })
            .collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("repoA"));
        assert!(warnings[0].contains("broken"));
        assert!(!entry.is_fetching());
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_reprobes_and_publishes_updates() -> Result<()> {
        let ws = TestWorkspace::new()?;
        let entry = tracked_entry(&ws, "repoA")?;
        assert_eq!(entry.snapshot().behind, 0);

        let mut fake = FakeFetcher::new(&["origin"]);
        fake.advance_upstream = true;
        let (coordinator, mut rx) = coordinator(Arc::new(fake));

        coordinator.fetch_async(&entry).expect("fetch starts").await?;

        let snapshot = entry.snapshot();
        assert_eq!(snapshot.behind, 1);
        assert!(!snapshot.is_fetching);

        let updates = drain(&mut rx)
            .into_iter()
            .filter(|event| matches!(event, WorkspaceEvent::RepositoryUpdated { .. }))
            .count();
        assert_eq!(updates, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_fetches_of_different_repositories_run_independently() -> Result<()> {
        let ws = TestWorkspace::new()?;
        let repo_a = tracked_entry(&ws, "repoA")?;
        let repo_b = tracked_entry(&ws, "repoB")?;
        let fetcher = Arc::new(FakeFetcher::new(&["origin"]).gated());
        let (coordinator, _rx) = coordinator(Arc::clone(&fetcher));

        let a = coordinator.fetch_async(&repo_a).expect("repoA fetch starts");
        let b = coordinator.fetch_async(&repo_b).expect("repoB fetch starts");
        assert!(repo_a.is_fetching() && repo_b.is_fetching());

        fetcher.gate.release();
        a.await?;
        b.await?;
        assert_eq!(fetcher.sequence_count(), 2);
        Ok(())
    }

    #[test]
    fn test_git2_fetcher_lists_configured_remotes() -> Result<()> {
        let ws = TestWorkspace::new()?;
        let (path, repo) = ws.init_repo("repoA")?;
        commit_files(&repo, &[("a.txt", "a")], "Initial commit")?;
        repo.remote("origin", "https://example.invalid/a.git")?;
        repo.remote("mirror", "https://example.invalid/b.git")?;

        let mut remotes = Git2RemoteFetcher.remote_names(&path)?;
        remotes.sort();
        assert_eq!(remotes, vec!["mirror".to_string(), "origin".to_string()]);
        Ok(())
    }

    #[test]
    fn test_git2_fetcher_reports_unreachable_remote() -> Result<()> {
        let ws = TestWorkspace::new()?;
        let (path, repo) = ws.init_repo("repoA")?;
        commit_files(&repo, &[("a.txt", "a")], "Initial commit")?;
        let missing = ws.root().join("does-not-exist.git");
        repo.remote("origin", missing.to_str().unwrap())?;

        let credentials = CredentialCache::new(Arc::new(NoHelper));
        let result = Git2RemoteFetcher.fetch_remote(&path, "origin", &credentials);
        assert!(matches!(result, Err(GitDeckError::FetchFailed { .. })));
        Ok(())
    }
}
