use crate::core::{
    command_init::WorkspaceCommandInit, error::Result, output::format_repository_row,
    print_info, print_section_header, snapshot::RepositorySnapshot,
};
use colored::*;
use std::path::Path;

pub async fn execute_status(workspace: Option<&str>, fetch: bool) -> Result<()> {
    let mut context = WorkspaceCommandInit::initialize(workspace).await?;

    if fetch {
        let handles = context.session.fetch_all();
        log::debug!("Waiting for {} fetches", handles.len());
        for handle in handles {
            handle.await?;
        }
    }

    print_repositories(&context.root, &context.session.repositories());
    context.print_notices();
    context.remember_workspace();
    Ok(())
}

pub fn print_repositories(root: &Path, repositories: &[RepositorySnapshot]) {
    if repositories.is_empty() {
        print_info(&format!("No repositories found in {}", root.display()));
        return;
    }

    print_section_header(&format!("Workspace {}", root.display()));

    let width = repositories
        .iter()
        .map(|s| s.display_name().chars().count())
        .max()
        .unwrap_or(0);
    for snapshot in repositories {
        println!("{}", format_repository_row(snapshot, width));
    }

    let dirty = repositories.iter().filter(|s| s.pending_changes > 0).count();
    let behind = repositories.iter().filter(|s| s.behind > 0).count();
    println!(
        "\n{}",
        format!(
            "{} repositories, {} with pending changes, {} behind upstream",
            repositories.len(),
            dirty,
            behind
        )
        .bright_black()
    );
}
