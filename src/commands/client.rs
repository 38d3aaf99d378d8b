use crate::core::{
    command_init::WorkspaceCommandInit, error::Result, external::ClientOperation,
    print_success, snapshot::display_name,
};

/// Opens the configured Git GUI client for commit, push or pull.
pub async fn execute_client(
    workspace: Option<&str>,
    repo: &str,
    operation: ClientOperation,
) -> Result<()> {
    let context = WorkspaceCommandInit::initialize(workspace).await?;
    let path = context.repository_path(repo)?;

    let client = context.session.launch_client(operation, &path)?;
    print_success(&format!(
        "Opened {client} to {} {}",
        operation.label(),
        display_name(&path)
    ));
    Ok(())
}
