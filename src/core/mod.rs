//! Workspace engine for gitdeck.
//!
//! Probing, fetching, credential caching and refresh scheduling for every repository under
//! one workspace directory, plus the settings and terminal output the commands share.

pub mod command_init;
pub mod config;
pub mod credentials;
pub mod dirs;
pub mod error;
pub mod events;
pub mod external;
pub mod fetch;
pub mod output;
pub mod probe;
pub mod scanner;
pub mod scheduler;
pub mod session;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod test_support;

// === Error handling ===
pub use error::{GitDeckError, Result};

// === Command setup ===
pub use command_init::{WorkspaceCommandContext, WorkspaceCommandInit};

// === Settings ===
pub use config::{AppSettings, GitClientConfig};

// === Repository state ===
pub use snapshot::{CommitInfo, RepositoryEntry, RepositorySnapshot};

// === Workspace engine ===
pub use events::{EventReceiver, EventSink, Notification, Severity, WorkspaceEvent};
pub use scheduler::{RefreshScheduler, SchedulerHandle, SchedulerState, Trigger};
pub use session::{SessionConfig, WorkspaceSession};

// === External processes ===
pub use external::{ClientOperation, ResetMode};

// === Output formatting ===
pub use output::{
    print_error, print_info, print_notification, print_section_header, print_success,
    print_warning,
};
