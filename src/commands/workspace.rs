use crate::core::{
    config::AppSettings,
    dirs::normalize_workspace_path,
    error::{GitDeckError, Result},
    print_info, print_section_header, print_success,
};
use colored::*;
use std::path::PathBuf;

fn existing_directory(raw: &str) -> Result<PathBuf> {
    let path = normalize_workspace_path(raw);
    if !path.is_dir() {
        return Err(GitDeckError::workspace_not_found(path));
    }
    Ok(std::fs::canonicalize(&path)?)
}

/// Resolves `raw` to the form stored in the list: canonical when the directory still
/// exists, as typed otherwise.
fn listed_path(settings: &AppSettings, raw: &str) -> Result<PathBuf> {
    let path = normalize_workspace_path(raw);
    let canonical = std::fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
    [canonical, path]
        .into_iter()
        .find(|candidate| settings.workspace_paths.contains(candidate))
        .ok_or_else(|| GitDeckError::WorkspaceNotListed {
            path: normalize_workspace_path(raw),
        })
}

pub fn execute_workspace_list() -> Result<()> {
    let settings = AppSettings::load()?;
    if settings.workspace_paths.is_empty() {
        print_info("No workspaces configured. Add one with `gitdeck workspace add <path>`.");
        return Ok(());
    }

    print_section_header("Workspaces");
    let active = settings.last_workspace_path.as_ref();
    for path in &settings.workspace_paths {
        let marker = if Some(path) == active { "*" } else { " " };
        println!(
            "{}{}{} {}",
            "[".bright_black(),
            marker.white(),
            "]".bright_black(),
            path.display().to_string().blue()
        );
    }
    Ok(())
}

pub fn execute_workspace_add(raw: &str) -> Result<()> {
    let mut settings = AppSettings::load()?;
    let path = existing_directory(raw)?;

    let added = settings.add_workspace(path.clone());
    settings.save()?;
    if added {
        print_success(&format!("Added workspace {}", path.display()));
    } else {
        print_success(&format!("Workspace {} is already listed, now active", path.display()));
    }
    Ok(())
}

pub fn execute_workspace_remove(raw: &str) -> Result<()> {
    let mut settings = AppSettings::load()?;
    let path = listed_path(&settings, raw)?;

    let active = settings.remove_workspace(&path)?;
    settings.save()?;
    print_success(&format!(
        "Removed workspace {}. Active workspace: {}",
        path.display(),
        active.display()
    ));
    Ok(())
}

pub fn execute_workspace_use(raw: &str) -> Result<()> {
    let mut settings = AppSettings::load()?;
    let path = match listed_path(&settings, raw) {
        Ok(listed) => listed,
        Err(_) => existing_directory(raw)?,
    };

    settings.add_workspace(path.clone());
    settings.save()?;
    print_success(&format!("Active workspace: {}", path.display()));
    Ok(())
}
