//! Workspace scanning.
//!
//! Only the immediate children of the workspace root are considered. Each call builds a new
//! list; a directory that fails to probe is left out and reported, and only a root that
//! cannot be listed fails the scan.

use crate::core::{
    error::{GitDeckError, Result},
    probe::{probe, ProbeOptions},
    snapshot::RepositorySnapshot,
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const METADATA_DIR: &str = ".git";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeWarning {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Sorted by path.
    pub snapshots: Vec<RepositorySnapshot>,
    pub warnings: Vec<ProbeWarning>,
}

pub fn scan(root: &Path, options: &ProbeOptions) -> Result<ScanReport> {
    let entries = std::fs::read_dir(root).map_err(|e| match e.kind() {
        ErrorKind::NotFound => GitDeckError::workspace_not_found(root),
        _ => GitDeckError::workspace_unreadable(root, e),
    })?;

    let mut directories = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| GitDeckError::workspace_unreadable(root, e))?;
        if entry.file_name() == METADATA_DIR {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            directories.push(path);
        }
    }
    directories.sort();

    let mut report = ScanReport::default();
    for path in directories {
        match probe(&path, options) {
            Ok(Some(snapshot)) => report.snapshots.push(snapshot),
            Ok(None) => {}
            Err(e) => {
                log::warn!("Skipping {}: {e}", path.display());
                report.warnings.push(ProbeWarning {
                    message: e.to_string(),
                    path,
                });
            }
        }
    }

    log::debug!(
        "Scanned {}: {} repositories, {} warnings",
        root.display(),
        report.snapshots.len(),
        report.warnings.len()
    );
    Ok(report)
}
