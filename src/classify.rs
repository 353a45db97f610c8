//! Provenance classification
//!
//! Decides how a repository relates to the acting user, which in turn decides
//! which remotes the local checkout needs and whether a fork has to be made.

use std::fmt;
use tracing::{debug, info, warn};

use crate::directory::RepositoryDirectory;
use crate::error::DirectoryError;
use crate::repository::Repository;

/// Ownership/fork relationship between a repository and the acting user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Style {
    /// The user owns the repository and it is not a fork
    Owner,
    /// The user owns the repository and it was forked from somewhere
    AlreadyForked,
    /// The user does not own the repository and has no fork of it
    NeedsFork,
    /// The user does not own the repository, which is itself a fork
    TryingFork,
}

impl Style {
    /// Whether this style needs a fork under the acting user
    pub fn needs_fork(self) -> bool {
        matches!(self, Style::NeedsFork | Style::TryingFork)
    }

    /// Style from the ownership truth table, before any dedupe lookup
    pub fn of(repo: &Repository, acting_user: &str) -> Style {
        match (repo.owner == acting_user, repo.is_fork()) {
            (true, false) => Style::Owner,
            (true, true) => Style::AlreadyForked,
            (false, false) => Style::NeedsFork,
            (false, true) => Style::TryingFork,
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Style::Owner => "OWNER",
            Style::AlreadyForked => "ALREADY-FORKED",
            Style::NeedsFork => "NEEDS-FORK",
            Style::TryingFork => "TRYING-FORK",
        };
        f.write_str(label)
    }
}

/// Outcome of classifying a repository for the acting user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub style: Style,
    /// The repository the user asked for
    pub primary: Repository,
    /// The repository used as the clone source; an existing fork of `primary`
    /// when one was found under the acting user
    pub resolved: Repository,
}

/// Classify `repo` for `acting_user`.
///
/// Only the "not ours, not a fork" branch touches the directory: it looks for
/// `acting_user/<name>` so an existing fork is reused instead of forking again.
/// Lookup failures other than not-found are logged and fall through to
/// [`Style::NeedsFork`]; the fork orchestrator copes with a fork that exists.
pub async fn classify(
    repo: Repository,
    acting_user: &str,
    directory: &dyn RepositoryDirectory,
) -> Classification {
    let style = Style::of(&repo, acting_user);

    if style != Style::NeedsFork {
        log_style(style, &repo, acting_user);
        return Classification {
            style,
            resolved: repo.clone(),
            primary: repo,
        };
    }

    match directory.get_repository(acting_user, &repo.name).await {
        Ok(existing) if existing.is_fork() => {
            info!(
                "Found existing fork {} of {}, reusing it",
                existing.full_name(),
                repo.full_name()
            );
            log_style(Style::AlreadyForked, &existing, acting_user);
            Classification {
                style: Style::AlreadyForked,
                primary: repo,
                resolved: existing,
            }
        }
        Ok(existing) => {
            warn!(
                "{} exists but is not a fork; treating {} as needing a fork",
                existing.full_name(),
                repo.full_name()
            );
            needs_fork(repo, acting_user)
        }
        Err(DirectoryError::NotFound { .. }) => {
            debug!("No fork of {} under {}", repo.full_name(), acting_user);
            needs_fork(repo, acting_user)
        }
        Err(e) => {
            warn!(
                "Unable to check for an existing fork of {} under {}: {}",
                repo.full_name(),
                acting_user,
                e
            );
            needs_fork(repo, acting_user)
        }
    }
}

fn needs_fork(repo: Repository, acting_user: &str) -> Classification {
    log_style(Style::NeedsFork, &repo, acting_user);
    Classification {
        style: Style::NeedsFork,
        resolved: repo.clone(),
        primary: repo,
    }
}

fn log_style(style: Style, repo: &Repository, acting_user: &str) {
    match repo.parent() {
        Some(parent) => info!(
            "[{}] klone {} (forked from {}) as {}",
            style,
            repo.full_name(),
            parent.full_name(),
            acting_user
        ),
        None => info!("[{}] klone {} as {}", style, repo.full_name(), acting_user),
    }
}
