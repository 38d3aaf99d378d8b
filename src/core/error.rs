//! Domain-specific error types and error handling utilities.
//!
//! This module defines [`GitDeckError`], covering every failure the workspace engine can
//! surface. It uses `thiserror` for the definitions and offers small constructors for the
//! structured variants.
//!
//! # Error Categories
//! - **Scan**: workspace root missing or unreadable (aborts the whole scan)
//! - **Probe**: a single directory failed to yield a snapshot (soft)
//! - **Fetch**: one remote of one repository failed (soft)
//! - **Credential**: helper negotiation failed (always swallowed by the cache)
//! - **External process**: git client launch or local git command failures
//! - **Settings**: config directory, read, parse and write failures

use std::path::PathBuf;
use thiserror::Error;

/// Domain-specific error types for gitdeck
#[derive(Error, Debug)]
pub enum GitDeckError {
    // Scan errors
    #[error("Workspace path does not exist: {path}")]
    WorkspaceNotFound { path: PathBuf },

    #[error("Cannot read workspace '{path}': {source}")]
    WorkspaceUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    // Probe errors
    #[error("Failed to read repository '{path}': {source}")]
    ProbeFailed { path: PathBuf, source: git2::Error },

    // Fetch errors
    #[error("Fetch from remote '{remote}' failed: {source}")]
    FetchFailed { remote: String, source: git2::Error },

    // Credential helper errors
    #[error("Credential helper failed: {message}")]
    CredentialHelper { message: String },

    // External process errors
    #[error("Failed to launch '{program}': {source}")]
    ProcessLaunchFailed {
        program: PathBuf,
        source: std::io::Error,
    },

    #[error("git command failed: {stderr}")]
    GitCommandFailed { code: Option<i32>, stderr: String },

    #[error("No git client is enabled. Enable one in settings.json")]
    NoGitClientEnabled,

    #[error("Enabled git clients have invalid paths: {names}")]
    GitClientPathInvalid { names: String },

    // Repository operation errors
    #[error("Branch '{name}' not found")]
    BranchNotFound { name: String },

    #[error("'{path}' is not a repository in the current workspace")]
    RepositoryNotInWorkspace { path: PathBuf },

    // Settings errors
    #[error("Workspace '{path}' is not in the workspace list")]
    WorkspaceNotListed { path: PathBuf },

    #[error("At least one workspace path must remain configured")]
    LastWorkspace,

    #[error("Could not find config directory")]
    ConfigDirectoryNotFound,

    #[error("Failed to read settings file '{path}': {source}")]
    SettingsReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse settings file '{path}': {source}")]
    SettingsParseFailed {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to write settings file '{path}': {source}")]
    SettingsWriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    // Runtime errors
    #[error("Background task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),

    #[error("Git repository error: {0}")]
    GitRepo(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for Results using GitDeckError
pub type Result<T> = std::result::Result<T, GitDeckError>;

impl GitDeckError {
    pub fn workspace_not_found(path: impl Into<PathBuf>) -> Self {
        Self::WorkspaceNotFound { path: path.into() }
    }

    pub fn workspace_unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WorkspaceUnreadable {
            path: path.into(),
            source,
        }
    }

    pub fn probe_failed(path: impl Into<PathBuf>, source: git2::Error) -> Self {
        Self::ProbeFailed {
            path: path.into(),
            source,
        }
    }

    pub fn fetch_failed(remote: impl Into<String>, source: git2::Error) -> Self {
        Self::FetchFailed {
            remote: remote.into(),
            source,
        }
    }

    pub fn credential_helper(message: impl Into<String>) -> Self {
        Self::CredentialHelper {
            message: message.into(),
        }
    }

    pub fn process_launch_failed(program: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ProcessLaunchFailed {
            program: program.into(),
            source,
        }
    }

    pub fn git_command_failed(code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::GitCommandFailed {
            code,
            stderr: stderr.into(),
        }
    }

    pub fn branch_not_found(name: impl Into<String>) -> Self {
        Self::BranchNotFound { name: name.into() }
    }

    pub fn repository_not_in_workspace(path: impl Into<PathBuf>) -> Self {
        Self::RepositoryNotInWorkspace { path: path.into() }
    }

    pub fn settings_read_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SettingsReadFailed {
            path: path.into(),
            source,
        }
    }

    pub fn settings_parse_failed(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::SettingsParseFailed {
            path: path.into(),
            source,
        }
    }

    pub fn settings_write_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::SettingsWriteFailed {
            path: path.into(),
            source,
        }
    }
}
