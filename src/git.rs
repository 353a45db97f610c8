//! Git command line integration
//!
//! [`Vcs`] is the set of primitives the kloners drive; [`GitClient`] runs them
//! through the `git` binary and sorts failures into the [`GitError`] variants
//! callers tolerate.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command as AsyncCommand;
use tracing::debug;

use crate::config::Config;
use crate::error::GitError;

/// A configured remote of a local checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remote {
    pub name: String,
    pub url: String,
}

/// VCS primitives klone drives.
///
/// Each call reports the idempotent conditions as distinct [`GitError`]
/// variants (`AlreadyExists`, `NotFound`) so callers can decide what counts as
/// success. Transport and credentials are the implementation's business.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Clone `url` into `path`
    async fn clone_to(&self, url: &str, path: &Path) -> Result<(), GitError>;

    /// List configured remotes
    async fn remotes(&self, path: &Path) -> Result<Vec<Remote>, GitError>;

    async fn add_remote(&self, path: &Path, name: &str, url: &str) -> Result<(), GitError>;

    async fn delete_remote(&self, path: &Path, name: &str) -> Result<(), GitError>;

    async fn fetch(&self, path: &Path, remote: &str) -> Result<(), GitError>;

    /// Pull `branch` of `remote` into the current branch
    async fn pull(&self, path: &Path, remote: &str, branch: &str) -> Result<(), GitError>;

    /// Commit hash of HEAD, if there is one
    async fn head_commit(&self, path: &Path) -> Result<Option<String>, GitError>;
}

/// Git operations through the `git` command line
#[derive(Debug, Clone)]
pub struct GitClient {
    recurse_submodules: bool,
    fast_forward_only: bool,
}

impl GitClient {
    /// Create a new Git client with the given configuration
    pub fn new(config: &Config) -> Self {
        Self {
            recurse_submodules: config.clone.recurse_submodules,
            fast_forward_only: config.sync.fast_forward_only,
        }
    }

    /// Run git and return stdout, classifying failures from stderr
    async fn run(&self, dir: Option<&Path>, args: &[&str]) -> Result<String, GitError> {
        debug!("git {}", args.join(" "));

        let mut command = AsyncCommand::new("git");
        command.args(args);
        if let Some(dir) = dir {
            command.current_dir(dir);
        }

        let output = command.output().await?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(classify_failure(args.first().copied().unwrap_or("git"), stderr))
    }

    /// Whether `path` is the top level of a work tree.
    ///
    /// A directory nested inside some other repository is not: git would
    /// resolve remote commands there against the enclosing repository.
    async fn is_checkout_root(&self, path: &Path) -> bool {
        if !path.is_dir() {
            return false;
        }
        let toplevel = match self.run(Some(path), &["rev-parse", "--show-toplevel"]).await {
            Ok(stdout) => PathBuf::from(stdout.trim()),
            Err(_) => return false,
        };

        match (
            tokio::fs::canonicalize(path).await,
            tokio::fs::canonicalize(&toplevel).await,
        ) {
            (Ok(path), Ok(toplevel)) => path == toplevel,
            _ => false,
        }
    }
}

/// Whether something other than an empty directory sits at `path`
async fn occupied(path: &Path) -> Result<bool, GitError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => {
            let mut entries = tokio::fs::read_dir(path).await?;
            Ok(entries.next_entry().await?.is_some())
        }
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Map git's stderr onto the conditions callers care about.
///
/// A clone destination that already exists is never `AlreadyExists`: checkouts
/// are recognised before cloning, so anything git trips over here is fatal.
fn classify_failure(command: &str, stderr: String) -> GitError {
    let lowered = stderr.to_lowercase();

    if lowered.contains("destination path") {
        GitError::Command {
            command: command.to_string(),
            stderr,
        }
    } else if lowered.contains("already exists") {
        GitError::AlreadyExists(stderr)
    } else if lowered.contains("no such remote") {
        GitError::NotFound(stderr)
    } else if lowered.contains("unknown capability") || lowered.contains("does not support") {
        GitError::Capability(stderr)
    } else {
        GitError::Command {
            command: command.to_string(),
            stderr,
        }
    }
}

/// Parse `git config --get-regexp` output for remote URLs
fn parse_remote_urls(output: &str) -> Vec<Remote> {
    output
        .lines()
        .filter_map(|line| {
            let (key, url) = line.split_once(char::is_whitespace)?;
            let name = key.strip_prefix("remote.")?.strip_suffix(".url")?;
            Some(Remote {
                name: name.to_string(),
                url: url.trim().to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl Vcs for GitClient {
    async fn clone_to(&self, url: &str, path: &Path) -> Result<(), GitError> {
        if self.is_checkout_root(path).await {
            return Err(GitError::AlreadyExists(format!(
                "{} is already a git checkout",
                path.display()
            )));
        }
        if occupied(path).await? {
            return Err(GitError::Command {
                command: "clone".to_string(),
                stderr: format!(
                    "{} exists and is not a git checkout; move it aside and retry",
                    path.display()
                ),
            });
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let target = path.to_string_lossy();
        let mut args = vec!["clone"];
        if self.recurse_submodules {
            args.push("--recurse-submodules");
        }
        args.push(url);
        args.push(target.as_ref());

        self.run(None, &args).await.map(|_| ())
    }

    async fn remotes(&self, path: &Path) -> Result<Vec<Remote>, GitError> {
        match self
            .run(Some(path), &["config", "--get-regexp", r"^remote\..*\.url$"])
            .await
        {
            Ok(stdout) => Ok(parse_remote_urls(&stdout)),
            // --get-regexp exits non-zero with empty stderr when nothing matches
            Err(GitError::Command { stderr, .. }) if stderr.is_empty() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn add_remote(&self, path: &Path, name: &str, url: &str) -> Result<(), GitError> {
        self.run(Some(path), &["remote", "add", name, url])
            .await
            .map(|_| ())
    }

    async fn delete_remote(&self, path: &Path, name: &str) -> Result<(), GitError> {
        self.run(Some(path), &["remote", "remove", name])
            .await
            .map(|_| ())
    }

    async fn fetch(&self, path: &Path, remote: &str) -> Result<(), GitError> {
        self.run(Some(path), &["fetch", remote]).await.map(|_| ())
    }

    async fn pull(&self, path: &Path, remote: &str, branch: &str) -> Result<(), GitError> {
        let mut args = vec!["pull"];
        if self.fast_forward_only {
            args.push("--ff-only");
        }
        args.push(remote);
        args.push(branch);

        let stdout = self.run(Some(path), &args).await?;
        if stdout.contains("Already up to date") {
            debug!("{} is already up to date with {}", path.display(), remote);
        }
        Ok(())
    }

    async fn head_commit(&self, path: &Path) -> Result<Option<String>, GitError> {
        match self.run(Some(path), &["rev-parse", "HEAD"]).await {
            Ok(stdout) => {
                let hash = stdout.trim();
                Ok((!hash.is_empty()).then(|| hash.to_string()))
            }
            // Empty repository: HEAD points at an unborn branch
            Err(GitError::Command { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
