//! Repository probing and branch switching.
//!
//! [`probe`] turns a directory into a [`RepositorySnapshot`]. It opens the repository without
//! searching parent directories, reads everything the dashboard shows, and drops the handle
//! before returning so a concurrent fetch never contends with a lingering open repository.
//!
//! # Public API
//! - [`probe`]: `Ok(None)` for directories that are not repositories
//! - [`switch_branch`]: check out a local branch, or a local tracking copy of a remote one
//! - [`ProbeOptions`]: whether remote branches are listed

use crate::core::{
    error::{GitDeckError, Result},
    snapshot::{CommitInfo, RepositorySnapshot},
};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use git2::{
    build::CheckoutBuilder, BranchType, ErrorCode, Repository, RepositoryOpenFlags, Status,
    StatusOptions,
};
use std::ffi::OsStr;
use std::path::Path;

const HEAD_PSEUDO_BRANCH: &str = "HEAD";

/// Status bits counted as a pending change, one count per matching category.
const PENDING_CATEGORIES: [Status; 4] = [
    Status::INDEX_MODIFIED,
    Status::INDEX_NEW,
    Status::INDEX_DELETED,
    Status::WT_MODIFIED,
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOptions {
    pub include_remote_branches: bool,
}

fn open_repository(path: &Path) -> Result<Option<Repository>> {
    match Repository::open_ext(path, RepositoryOpenFlags::NO_SEARCH, &[] as &[&OsStr]) {
        Ok(repo) => Ok(Some(repo)),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(GitDeckError::probe_failed(path, e)),
    }
}

pub fn probe(path: &Path, options: &ProbeOptions) -> Result<Option<RepositorySnapshot>> {
    let Some(repo) = open_repository(path)? else {
        log::debug!("Skipping {}: not a repository", path.display());
        return Ok(None);
    };

    let snapshot =
        read_snapshot(&repo, path, options).map_err(|e| GitDeckError::probe_failed(path, e))?;
    Ok(Some(snapshot))
}

fn read_snapshot(
    repo: &Repository,
    path: &Path,
    options: &ProbeOptions,
) -> std::result::Result<RepositorySnapshot, git2::Error> {
    let (ahead, behind) = ahead_behind(repo)?.unwrap_or((0, 0));

    Ok(RepositorySnapshot {
        path: path.to_path_buf(),
        current_branch: current_branch(repo)?,
        branches: list_branches(repo, options.include_remote_branches)?,
        last_commit: last_commit(repo)?,
        pending_changes: pending_changes(repo)?,
        ahead,
        behind,
        is_fetching: false,
    })
}

fn current_branch(repo: &Repository) -> std::result::Result<String, git2::Error> {
    match repo.head() {
        Ok(head) => {
            if head.is_branch() {
                Ok(head.shorthand().unwrap_or("-none-").to_string())
            } else {
                match head.target() {
                    Some(oid) => Ok(format!("detached at {}", &oid.to_string()[..7])),
                    None => Ok("-none-".to_string()),
                }
            }
        }
        Err(e) if e.code() == ErrorCode::UnbornBranch => {
            // No commits yet: HEAD still names the branch it will create.
            let head = repo.find_reference("HEAD")?;
            let target = head.symbolic_target().unwrap_or("-none-");
            Ok(target.trim_start_matches("refs/heads/").to_string())
        }
        Err(e) => Err(e),
    }
}

/// Ahead/behind of the current branch relative to its upstream.
/// Returns None when HEAD is unborn, detached, or has no upstream.
fn ahead_behind(repo: &Repository) -> std::result::Result<Option<(usize, usize)>, git2::Error> {
    let head = match repo.head() {
        Ok(head) => head,
        Err(_) => return Ok(None),
    };
    if !head.is_branch() {
        return Ok(None);
    }

    let (Some(local_oid), Some(branch_name)) = (head.target(), head.shorthand()) else {
        return Ok(None);
    };

    let local_branch = match repo.find_branch(branch_name, BranchType::Local) {
        Ok(branch) => branch,
        Err(_) => return Ok(None),
    };

    let upstream_branch = match local_branch.upstream() {
        Ok(upstream) => upstream,
        Err(_) => return Ok(None),
    };

    let Some(upstream_oid) = upstream_branch.get().target() else {
        return Ok(None);
    };

    repo.graph_ahead_behind(local_oid, upstream_oid).map(Some)
}

/// `HEAD` itself, or a remote's `<remote>/HEAD`. Local names ending in `/HEAD` are real.
fn is_head_pseudo_branch(name: &str, kind: BranchType) -> bool {
    name == HEAD_PSEUDO_BRANCH || (kind == BranchType::Remote && name.ends_with("/HEAD"))
}

/// Local branches sorted by name, followed by remote branches when requested.
fn list_branches(
    repo: &Repository,
    include_remote: bool,
) -> std::result::Result<Vec<String>, git2::Error> {
    let filter = if include_remote {
        None
    } else {
        Some(BranchType::Local)
    };

    let mut local = Vec::new();
    let mut remote = Vec::new();
    for branch in repo.branches(filter)? {
        let (branch, kind) = branch?;
        let Some(name) = branch.name()? else {
            continue;
        };
        if is_head_pseudo_branch(name, kind) {
            continue;
        }
        match kind {
            BranchType::Local => local.push(name.to_string()),
            BranchType::Remote => remote.push(name.to_string()),
        }
    }

    local.sort();
    remote.sort();
    local.extend(remote);
    Ok(local)
}

fn pending_changes(repo: &Repository) -> std::result::Result<usize, git2::Error> {
    if repo.is_bare() {
        return Ok(0);
    }

    let mut opts = StatusOptions::new();
    opts.include_untracked(false)
        .include_ignored(false)
        .exclude_submodules(true);

    let statuses = repo.statuses(Some(&mut opts))?;
    Ok(statuses
        .iter()
        .map(|entry| {
            let status = entry.status();
            PENDING_CATEGORIES
                .iter()
                .filter(|category| status.contains(**category))
                .count()
        })
        .sum())
}

fn last_commit(repo: &Repository) -> std::result::Result<Option<CommitInfo>, git2::Error> {
    let head = match repo.head() {
        Ok(head) => head,
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            return Ok(None)
        }
        Err(e) => return Err(e),
    };

    let commit = head.peel_to_commit()?;
    let author = commit.author();
    let time = author.when();

    Ok(Some(CommitInfo {
        id: commit.id().to_string(),
        message: commit.message().unwrap_or("").to_string(),
        author_name: author.name().unwrap_or("").to_string(),
        author_time: to_datetime(time),
    }))
}

fn to_datetime(time: git2::Time) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60).unwrap_or_else(|| Utc.fix());
    DateTime::from_timestamp(time.seconds(), 0)
        .unwrap_or_default()
        .with_timezone(&offset)
}

/// Checks out `name` and returns the re-probed snapshot.
///
/// A remote branch `remote/x` is checked out through a local `x`, created at the remote tip
/// and set to track it when it does not exist yet.
pub fn switch_branch(path: &Path, name: &str, options: &ProbeOptions) -> Result<RepositorySnapshot> {
    {
        let repo =
            open_repository(path)?.ok_or_else(|| GitDeckError::repository_not_in_workspace(path))?;
        let refname = resolve_checkout_target(&repo, name)?;

        let target = repo.revparse_single(&refname)?;
        repo.checkout_tree(&target, Some(CheckoutBuilder::new().safe()))?;
        repo.set_head(&refname)?;
        log::info!("Switched {} to {}", path.display(), refname);
    }

    probe(path, options)?.ok_or_else(|| GitDeckError::repository_not_in_workspace(path))
}

fn resolve_checkout_target(repo: &Repository, name: &str) -> Result<String> {
    if let Ok(local) = repo.find_branch(name, BranchType::Local) {
        return reference_name(&local);
    }

    let remote = repo
        .find_branch(name, BranchType::Remote)
        .map_err(|_| GitDeckError::branch_not_found(name))?;
    let remote_ref = reference_name(&remote)?;
    let remote_name = repo.branch_remote_name(&remote_ref)?;
    let remote_name = remote_name.as_str().unwrap_or_default();
    let local_name = name
        .strip_prefix(&format!("{remote_name}/"))
        .unwrap_or(name);

    if let Ok(existing) = repo.find_branch(local_name, BranchType::Local) {
        return reference_name(&existing);
    }

    let tip = remote.get().peel_to_commit()?;
    let mut local = repo.branch(local_name, &tip, false)?;
    local.set_upstream(Some(name))?;
    log::debug!("Created local branch {local_name} tracking {name}");
    reference_name(&local)
}

fn reference_name(branch: &git2::Branch<'_>) -> Result<String> {
    branch
        .get()
        .name()
        .map(str::to_string)
        .ok_or_else(|| GitDeckError::branch_not_found("<invalid utf-8>"))
}
