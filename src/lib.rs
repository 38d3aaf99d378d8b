//! gitdeck - a live status dashboard for every git repository in a workspace directory.
//!
//! The [`core`] module holds the engine: a scanner that lists the repositories directly under
//! a workspace root, background fetches limited to one per repository, a credential cache
//! shared by those fetches, and a scheduler that collapses overlapping refresh requests.
//! [`commands`] holds the CLI entry points built on top of it.

pub mod commands;
pub mod core;

pub use core::{
    AppSettings, ClientOperation, GitDeckError, RefreshScheduler, RepositorySnapshot, ResetMode,
    Result, SessionConfig, Trigger, WorkspaceEvent, WorkspaceSession,
};
