//! Workspace and repository builders for integration tests.
//!
//! Repositories are created with git2 directly. Commands run with `XDG_CONFIG_HOME` and
//! `HOME` pointed at a per-test directory and with colors disabled.

#![allow(dead_code)]

use anyhow::Result;
use assert_cmd::prelude::*;
use git2::{BranchType, Repository, RepositoryInitOptions, Signature};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// A workspace root plus an isolated config directory. Both are removed on drop.
pub struct TestWorkspace {
    pub temp_dir: TempDir,
    pub root: PathBuf,
    pub config_home: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let base = fs::canonicalize(temp_dir.path())?;
        let root = base.join("workspace");
        let config_home = base.join("config");
        fs::create_dir_all(&root)?;
        fs::create_dir_all(&config_home)?;
        Ok(Self {
            temp_dir,
            root,
            config_home,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Directory outside the workspace, for upstream repositories and extra workspaces.
    pub fn outside(&self, name: &str) -> Result<PathBuf> {
        let path = self.root.parent().expect("workspace has a parent").join(name);
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config_home.join("gitdeck").join("settings.json")
    }

    /// `gitdeck` with isolated config, no colors, and no workspace argument.
    pub fn bare_command(&self) -> Result<Command> {
        let mut cmd = Command::cargo_bin("gitdeck")?;
        cmd.env("XDG_CONFIG_HOME", &self.config_home)
            .env("HOME", &self.config_home)
            .env("NO_COLOR", "1")
            .env("GIT_TERMINAL_PROMPT", "0")
            .env_remove("RUST_LOG");
        Ok(cmd)
    }

    /// `gitdeck --workspace <root>`.
    pub fn command(&self) -> Result<Command> {
        let mut cmd = self.bare_command()?;
        cmd.arg("--workspace").arg(&self.root);
        Ok(cmd)
    }

    pub fn init_repo(&self, name: &str) -> Result<(PathBuf, Repository)> {
        let path = self.root.join(name);
        let repo = init_repo(&path)?;
        Ok((path, repo))
    }

    pub fn plain_dir(&self, name: &str) -> Result<PathBuf> {
        let path = self.root.join(name);
        fs::create_dir_all(&path)?;
        Ok(path)
    }
}

pub fn init_repo(path: &Path) -> Result<Repository> {
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("main");
    let repo = Repository::init_opts(path, &opts)?;
    {
        let mut config = repo.config()?;
        config.set_str("user.name", "Test User")?;
        config.set_str("user.email", "test@example.com")?;
    }
    Ok(repo)
}

fn signature() -> Result<Signature<'static>> {
    Ok(Signature::now("Test User", "test@example.com")?)
}

/// Writes and stages `files`, then commits them on HEAD.
pub fn commit_files(repo: &Repository, files: &[(&str, &str)], message: &str) -> Result<git2::Oid> {
    let workdir = repo.workdir().expect("work tree").to_path_buf();
    let mut index = repo.index()?;
    for (name, content) in files {
        fs::write(workdir.join(name), content)?;
        index.add_path(Path::new(name))?;
    }
    index.write()?;

    let tree = repo.find_tree(index.write_tree()?)?;
    let sig = signature()?;
    let parent = repo.head().ok().map(|head| head.peel_to_commit()).transpose()?;
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    Ok(repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?)
}

pub fn modify_file(repo: &Repository, name: &str, content: &str) -> Result<()> {
    let workdir = repo.workdir().expect("work tree");
    fs::write(workdir.join(name), content)?;
    Ok(())
}

pub fn create_branch(repo: &Repository, name: &str) -> Result<()> {
    let head = repo.head()?.peel_to_commit()?;
    repo.branch(name, &head, false)?;
    Ok(())
}

/// Clones `upstream` into `dest`; `main` tracks `origin/main`.
pub fn clone_from(upstream: &Path, dest: &Path) -> Result<Repository> {
    let repo = Repository::clone(upstream.to_str().expect("utf-8 path"), dest)?;
    {
        let mut config = repo.config()?;
        config.set_str("user.name", "Test User")?;
        config.set_str("user.email", "test@example.com")?;
    }
    if repo.find_branch("main", BranchType::Local).is_err() {
        anyhow::bail!("clone of {} has no main branch", upstream.display());
    }
    Ok(repo)
}

pub fn detach_head(repo: &Repository) -> Result<()> {
    let head = repo.head()?.peel_to_commit()?;
    repo.set_head_detached(head.id())?;
    Ok(())
}

pub fn write_settings(workspace: &TestWorkspace, json: &str) -> Result<()> {
    let file = workspace.settings_file();
    fs::create_dir_all(file.parent().expect("settings dir"))?;
    fs::write(file, json)?;
    Ok(())
}

pub fn read_settings(workspace: &TestWorkspace) -> Result<serde_json::Value> {
    let content = fs::read_to_string(workspace.settings_file())?;
    Ok(serde_json::from_str(&content)?)
}
