//! Repository status snapshots and the shared entries the workspace list is made of.
//!
//! # Public API
//! - [`RepositorySnapshot`]: status of one repository at probe time
//! - [`CommitInfo`]: id, message, author and time of the HEAD tip
//! - [`RepositoryEntry`]: a list slot that a fetch can update in place
//!
//! The workspace list itself is replaced wholesale on every scan. Only the fields inside an
//! entry change afterwards, under the entry's own lock.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: String,
    pub message: String,
    pub author_name: String,
    pub author_time: DateTime<FixedOffset>,
}

impl CommitInfo {
    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(7)]
    }

    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySnapshot {
    pub path: PathBuf,
    pub current_branch: String,
    pub branches: Vec<String>,
    /// `None` while the repository has no commits.
    pub last_commit: Option<CommitInfo>,
    pub pending_changes: usize,
    pub ahead: usize,
    pub behind: usize,
    pub is_fetching: bool,
}

impl RepositorySnapshot {
    /// Directory name used in user-facing messages.
    pub fn display_name(&self) -> String {
        display_name(&self.path)
    }
}

pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// One slot of the workspace list.
///
/// The fetch flag lives outside the snapshot lock so the at-most-one-fetch check is a single
/// atomic compare-exchange.
#[derive(Debug)]
pub struct RepositoryEntry {
    path: PathBuf,
    fetching: AtomicBool,
    snapshot: RwLock<RepositorySnapshot>,
}

impl RepositoryEntry {
    pub fn new(snapshot: RepositorySnapshot) -> Self {
        Self {
            path: snapshot.path.clone(),
            fetching: AtomicBool::new(false),
            snapshot: RwLock::new(snapshot),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_fetching(&self) -> bool {
        self.fetching.load(Ordering::Acquire)
    }

    /// Current state of the entry, with `is_fetching` reflecting the live flag.
    pub fn snapshot(&self) -> RepositorySnapshot {
        let mut snapshot = match self.snapshot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        snapshot.is_fetching = self.is_fetching();
        snapshot
    }

    /// Replaces the probed fields. The fetch flag is left untouched.
    pub fn update(&self, snapshot: RepositorySnapshot) {
        let mut guard = match self.snapshot.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = snapshot;
    }

    /// Marks a fetch as started. Returns false if one is already in flight.
    pub(crate) fn try_begin_fetch(&self) -> bool {
        self.fetching
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn end_fetch(&self) {
        self.fetching.store(false, Ordering::Release);
    }
}

#[cfg(test)]
pub(crate) fn sample_snapshot(path: &str) -> RepositorySnapshot {
    RepositorySnapshot {
        path: PathBuf::from(path),
        current_branch: "main".to_string(),
        branches: vec!["main".to_string()],
        last_commit: None,
        pending_changes: 0,
        ahead: 0,
        behind: 0,
        is_fetching: false,
    }
}
