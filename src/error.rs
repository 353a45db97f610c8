//! Error types for klone
//!
//! Lookup and fork failures come from the repository directory, git failures
//! come from the VCS layer, and [`KloneError`] is what a klone run reports.
//! Idempotent no-ops (already cloned, remote already present, remote missing on
//! delete, already up to date) are recognised at the kloner layer and never
//! reach the caller.

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a [`RepositoryDirectory`](crate::directory::RepositoryDirectory)
#[derive(Error, Debug)]
pub enum DirectoryError {
    /// No repository exists under this owner and name
    #[error("repository {owner}/{name} not found")]
    NotFound { owner: String, name: String },

    /// The fork was accepted but is not queryable yet
    #[error("fork {owner}/{name} is scheduled but not yet available")]
    ForkScheduled { owner: String, name: String },

    /// The fork (or a repository with its name) already exists
    #[error("repository {owner}/{name} already exists")]
    AlreadyExists { owner: String, name: String },

    /// Any other API failure
    #[error(transparent)]
    Api(#[from] anyhow::Error),
}

impl DirectoryError {
    pub fn not_found(owner: &str, name: &str) -> Self {
        Self::NotFound {
            owner: owner.to_string(),
            name: name.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors reported by a [`Vcs`](crate::git::Vcs) primitive
#[derive(Error, Debug)]
pub enum GitError {
    /// Destination already cloned, or a remote with this name already exists
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The remote or repository being addressed does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Transport capability negotiation failed
    #[error("unsupported transport capability: {0}")]
    Capability(String),

    /// git exited with a failure status
    #[error("git {command} failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("failed to run git: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by a klone run
#[derive(Error, Debug)]
pub enum KloneError {
    #[error("invalid repository name: {0:?} (expected \"name\" or \"owner/name\")")]
    InvalidName(String),

    /// Repository or user lookup failed
    #[error(transparent)]
    Lookup(DirectoryError),

    #[error("unable to fork repository {repository}: {source}")]
    ForkFailed {
        repository: String,
        #[source]
        source: DirectoryError,
    },

    #[error(
        "fork {repository} did not become available after {attempts} attempts ({}s)",
        .waited.as_secs()
    )]
    ForkTimeout {
        repository: String,
        attempts: u32,
        waited: Duration,
    },

    #[error("repository {repository} has no clone URL")]
    NoCloneUrl { repository: String },

    #[error("unable to clone {url}: {source}")]
    Clone {
        url: String,
        #[source]
        source: GitError,
    },

    #[error("unable to {action}: {source}")]
    Git {
        action: String,
        #[source]
        source: GitError,
    },

    /// A step after a successful clone failed; the checkout at `path` is usable
    /// and re-running klone converges it
    #[error("{} is cloned but not fully configured: {source}", .path.display())]
    Incomplete {
        path: PathBuf,
        #[source]
        source: Box<KloneError>,
    },

    #[error("klone did not finish within {}s", .0.as_secs())]
    TimedOut(Duration),
}

impl KloneError {
    /// Local path already achieved when the run failed part way
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Self::Incomplete { path, .. } => Some(path),
            _ => None,
        }
    }

    pub(crate) fn git(action: impl Into<String>, source: GitError) -> Self {
        Self::Git {
            action: action.into(),
            source,
        }
    }
}
