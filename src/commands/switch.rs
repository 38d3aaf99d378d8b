use crate::core::{
    command_init::WorkspaceCommandInit, error::Result, output::format_repository_row,
};

pub async fn execute_switch(workspace: Option<&str>, repo: &str, branch: &str) -> Result<()> {
    let mut context = WorkspaceCommandInit::initialize(workspace).await?;
    let path = context.repository_path(repo)?;

    let snapshot = context.session.switch_branch(&path, branch).await?;
    context.print_notices();
    println!("{}", format_repository_row(&snapshot, 0));
    Ok(())
}
