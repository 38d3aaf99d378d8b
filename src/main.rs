use clap::{Parser, Subcommand};
use gitdeck::commands::*;
use gitdeck::core::{error::Result, print_error, ClientOperation, ResetMode};

#[derive(Parser)]
#[command(name = "gitdeck")]
#[command(about = "Live status of every git repository in a workspace directory")]
#[command(version = "0.1.0")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Workspace directory to use instead of the last one opened
    #[arg(long, global = true, value_name = "PATH")]
    workspace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every repository in the workspace once
    Status {
        /// Fetch all remotes before printing
        #[arg(long)]
        fetch: bool,
    },
    /// Keep refreshing the workspace and print changes as they happen
    Watch {
        /// Seconds between local refreshes (defaults to the configured interval)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// Check out a local or remote branch in one repository
    Switch {
        /// Repository directory name or path
        repo: String,
        /// Branch name, e.g. "main" or "origin/feature"
        branch: String,
    },
    /// Reset a repository to HEAD
    Reset {
        /// Repository directory name or path
        repo: String,
        /// Keep changes in the index and work tree
        #[arg(long, conflicts_with = "hard", required_unless_present = "hard")]
        soft: bool,
        /// Discard all uncommitted changes
        #[arg(long)]
        hard: bool,
    },
    /// Open the configured Git client to commit
    Commit { repo: String },
    /// Open the configured Git client to push
    Push { repo: String },
    /// Open the configured Git client to pull
    Pull { repo: String },
    /// Manage the list of workspace directories
    Workspace {
        #[command(subcommand)]
        action: WorkspaceAction,
    },
}

#[derive(Subcommand)]
enum WorkspaceAction {
    /// List configured workspaces
    List,
    /// Add a workspace and make it active
    Add { path: String },
    /// Remove a workspace from the list
    Remove { path: String },
    /// Make a workspace active
    Use { path: String },
}

fn init_logging(debug: bool) {
    let mut builder = if debug {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(log::LevelFilter::Debug);
        builder
    } else {
        // Off unless RUST_LOG says otherwise.
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off"))
    };
    builder.init();
}

async fn run(cli: Cli) -> Result<()> {
    let workspace = cli.workspace.as_deref();
    match cli.command {
        Commands::Status { fetch } => execute_status(workspace, fetch).await,
        Commands::Watch { interval } => execute_watch(workspace, interval).await,
        Commands::Switch { repo, branch } => execute_switch(workspace, &repo, &branch).await,
        Commands::Reset { repo, hard, .. } => {
            let mode = if hard { ResetMode::Hard } else { ResetMode::Soft };
            execute_reset(workspace, &repo, mode).await
        }
        Commands::Commit { repo } => execute_client(workspace, &repo, ClientOperation::Commit).await,
        Commands::Push { repo } => execute_client(workspace, &repo, ClientOperation::Push).await,
        Commands::Pull { repo } => execute_client(workspace, &repo, ClientOperation::Pull).await,
        Commands::Workspace { action } => match action {
            WorkspaceAction::List => execute_workspace_list(),
            WorkspaceAction::Add { path } => execute_workspace_add(&path),
            WorkspaceAction::Remove { path } => execute_workspace_remove(&path),
            WorkspaceAction::Use { path } => execute_workspace_use(&path),
        },
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(e) = run(cli).await {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}
