use crate::core::{
    command_init::WorkspaceCommandInit, error::Result, external::ResetMode,
    output::format_repository_row,
};

pub async fn execute_reset(workspace: Option<&str>, repo: &str, mode: ResetMode) -> Result<()> {
    let mut context = WorkspaceCommandInit::initialize(workspace).await?;
    let path = context.repository_path(repo)?;

    context.session.reset(&path, mode).await?;
    context.print_notices();
    if let Some(entry) = context.session.entry(&path) {
        println!("{}", format_repository_row(&entry.snapshot(), 0));
    }
    Ok(())
}
