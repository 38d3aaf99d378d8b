//! Repository fixtures for unit tests, built directly with git2.

use crate::core::credentials::{Credential, CredentialCache, CredentialSource};
use crate::core::error::{GitDeckError, Result};
use crate::core::fetch::RemoteFetcher;
use git2::{BranchType, Repository, RepositoryInitOptions, Signature};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use tempfile::TempDir;

pub struct TestWorkspace {
    pub temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
        })
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn init_repo(&self, name: &str) -> Result<(PathBuf, Repository)> {
        let path = self.root().join(name);
        let repo = init_repo(&path)?;
        Ok((path, repo))
    }

    pub fn plain_dir(&self, name: &str) -> Result<PathBuf> {
        let path = self.root().join(name);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }
}

pub fn init_repo(path: &Path) -> Result<Repository> {
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("main");
    let repo = Repository::init_opts(path, &opts)?;
    {
        let mut config = repo.config()?;
        config.set_str("user.name", "Test User")?;
        config.set_str("user.email", "test@example.com")?;
    }
    Ok(repo)
}

fn signature() -> Result<Signature<'static>> {
    Ok(Signature::now("Test User", "test@example.com")?)
}

/// Writes `files` into the work tree, stages them and commits on HEAD.
pub fn commit_files(repo: &Repository, files: &[(&str, &str)], message: &str) -> Result<git2::Oid> {
    let workdir = repo.workdir().expect("test repositories have a work tree");
    let mut index = repo.index()?;
    for (name, content) in files {
        std::fs::write(workdir.join(name), content)?;
        index.add_path(Path::new(name))?;
    }
    index.write()?;

    let tree = repo.find_tree(index.write_tree()?)?;
    let sig = signature()?;
    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit()?),
        Err(_) => None,
    };
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    Ok(repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?)
}

/// Adds a fake `origin` remote whose `main` points at the current HEAD and makes local
/// `main` track it.
pub fn track_origin_main(repo: &Repository) -> Result<()> {
    repo.remote("origin", "https://example.invalid/team/repo.git")?;
    let head = repo.head()?.peel_to_commit()?;
    repo.reference("refs/remotes/origin/main", head.id(), true, "test upstream")?;
    let mut branch = repo.find_branch("main", BranchType::Local)?;
    branch.set_upstream(Some("origin/main"))?;
    Ok(())
}

/// Adds a commit on `refs/remotes/origin/main` without touching HEAD.
pub fn advance_origin_main(repo: &Repository, message: &str) -> Result<()> {
    let upstream = repo
        .find_reference("refs/remotes/origin/main")?
        .peel_to_commit()?;
    let tree = upstream.tree()?;
    let sig = signature()?;
    repo.commit(
        Some("refs/remotes/origin/main"),
        &sig,
        &sig,
        message,
        &tree,
        &[&upstream],
    )?;
    Ok(())
}

pub fn create_branch(repo: &Repository, name: &str) -> Result<()> {
    let head = repo.head()?.peel_to_commit()?;
    repo.branch(name, &head, false)?;
    Ok(())
}

pub fn modify_file(repo: &Repository, name: &str, content: &str) -> Result<()> {
    let workdir = repo.workdir().expect("test repositories have a work tree");
    std::fs::write(workdir.join(name), content)?;
    Ok(())
}

/// Credential source that never knows anything.
pub struct NoHelper;

impl CredentialSource for NoHelper {
    fn resolve_external_credential(&self, _url: &str) -> Option<Credential> {
        None
    }
}

/// Blocks fetch threads until released.
#[derive(Default)]
pub struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    pub fn opened() -> Self {
        Self {
            open: Mutex::new(true),
            cv: Condvar::new(),
        }
    }

    pub fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cv.wait(open).unwrap();
        }
    }

    pub fn release(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }
}

/// Records fetch sequences instead of touching the network.
pub struct FakeFetcher {
    pub remotes: Vec<String>,
    pub failing: Vec<String>,
    pub gate: Gate,
    /// Number of fetch sequences started (one per `remote_names` call).
    pub sequences: AtomicUsize,
    pub fetched: Mutex<Vec<String>>,
    /// Moves `origin/main` one commit ahead on every successful remote fetch.
    pub advance_upstream: bool,
}

impl FakeFetcher {
    pub fn new(remotes: &[&str]) -> Self {
        Self {
            remotes: remotes.iter().map(|r| r.to_string()).collect(),
            failing: Vec::new(),
            gate: Gate::opened(),
            sequences: AtomicUsize::new(0),
            fetched: Mutex::new(Vec::new()),
            advance_upstream: false,
        }
    }

    pub fn gated(mut self) -> Self {
        self.gate = Gate::default();
        self
    }

    pub fn failing(mut self, remote: &str) -> Self {
        self.failing.push(remote.to_string());
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn sequence_count(&self) -> usize {
        self.sequences.load(Ordering::SeqCst)
    }
}

impl RemoteFetcher for FakeFetcher {
    fn remote_names(&self, _repo_path: &Path) -> Result<Vec<String>> {
        self.sequences.fetch_add(1, Ordering::SeqCst);
        self.gate.wait();
        Ok(self.remotes.clone())
    }

    fn fetch_remote(
        &self,
        repo_path: &Path,
        remote: &str,
        _credentials: &CredentialCache,
    ) -> Result<()> {
        self.fetched.lock().unwrap().push(remote.to_string());
        if self.failing.iter().any(|r| r == remote) {
            return Err(GitDeckError::fetch_failed(
                remote,
                git2::Error::from_str("connection refused"),
            ));
        }
        if self.advance_upstream {
            let repo = Repository::open(repo_path)?;
            advance_origin_main(&repo, "Fetched upstream commit")?;
        }
        Ok(())
    }
}
