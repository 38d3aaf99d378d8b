use crate::core::error::{GitDeckError, Result};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "gitdeck";
const SETTINGS_FILE: &str = "settings.json";

pub fn get_config_directory() -> Result<PathBuf> {
    let base = match std::env::consts::OS {
        "linux" | "freebsd" | "netbsd" | "openbsd" => std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|_| {
                dirs::home_dir()
                    .map(|home| home.join(".config"))
                    .ok_or(GitDeckError::ConfigDirectoryNotFound)
            })?,
        "macos" => dirs::home_dir()
            .ok_or(GitDeckError::ConfigDirectoryNotFound)?
            .join("Library/Application Support"),
        _ => dirs::config_dir().ok_or(GitDeckError::ConfigDirectoryNotFound)?,
    };

    Ok(base.join(APP_DIR))
}

pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_config_directory()?.join(SETTINGS_FILE))
}

/// Strips the trailing separator and stray quote a shell can leave on a pasted path.
pub fn normalize_workspace_path(raw: &str) -> PathBuf {
    let mut trimmed = raw.trim();
    if let Some(stripped) = trimmed.strip_suffix('"') {
        trimmed = stripped;
    }
    while trimmed.len() > 1 && (trimmed.ends_with('/') || trimmed.ends_with('\\')) {
        trimmed = &trimmed[..trimmed.len() - 1];
    }
    PathBuf::from(trimmed)
}

/// Resolves a repository argument against the workspace root.
pub fn resolve_repository_path(workspace_root: &Path, repo: &str) -> PathBuf {
    let candidate = PathBuf::from(repo);
    if candidate.is_absolute() {
        candidate
    } else {
        workspace_root.join(candidate)
    }
}
