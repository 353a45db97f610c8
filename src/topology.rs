//! Remote topology
//!
//! Turns a [`Classification`] into a [`KlonePlan`] (what to clone, which
//! remotes to point where) and drives a plan into existence on disk with a
//! [`Kloner`].
//!
//! | Style                     | clone    | origin   | upstream    |
//! |---------------------------|----------|----------|-------------|
//! | Owner                     | repo     | repo     | -           |
//! | AlreadyForked             | repo     | repo     | repo.parent |
//! | NeedsFork / TryingFork    | repo     | new fork | repo        |
//!
//! Every step is idempotent: re-running a plan against the same path leaves
//! the same remote set. There is no rollback; a failure after the clone is
//! reported as [`KloneError::Incomplete`] with the path that was reached.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::classify::{Classification, Style};
use crate::directory::RepositoryDirectory;
use crate::error::KloneError;
use crate::fork::{ensure_fork, ForkPolicy};
use crate::kloners::Kloner;
use crate::repository::Repository;

pub const ORIGIN: &str = "origin";
pub const UPSTREAM: &str = "upstream";

/// One remote the checkout must end up with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDescriptor {
    pub name: String,
    pub source: Repository,
    pub path: PathBuf,
}

impl fmt::Display for RemoteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.name, self.source.full_name())
    }
}

/// What a klone run does for one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KlonePlan {
    pub style: Style,
    /// Repository the checkout is cloned from
    pub clone_source: Repository,
    /// Where `origin` points: the user's writable copy
    pub origin: Repository,
    /// Where `upstream` points, for forks
    pub upstream: Option<Repository>,
}

impl KlonePlan {
    /// Build the plan for `classification`, creating the fork when the style
    /// calls for one
    pub async fn build(
        classification: Classification,
        acting_user: &str,
        directory: &dyn RepositoryDirectory,
        policy: ForkPolicy,
    ) -> Result<Self, KloneError> {
        let Classification {
            style,
            primary,
            resolved,
        } = classification;

        if !style.needs_fork() {
            return Ok(Self::without_fork(style, resolved));
        }

        let fork = ensure_fork(&primary, acting_user, directory, policy).await?;
        Ok(Self::with_fork(style, primary, fork))
    }

    /// The plan [`build`](Self::build) would produce, without creating a fork.
    /// The fork is predicted from the acting user's name.
    pub fn predict(classification: Classification, acting_user: &str) -> Self {
        let Classification {
            style,
            primary,
            resolved,
        } = classification;

        if style.needs_fork() {
            let fork = primary.predicted_fork(acting_user);
            Self::with_fork(style, primary, fork)
        } else {
            Self::without_fork(style, resolved)
        }
    }

    fn without_fork(style: Style, repo: Repository) -> Self {
        Self {
            style,
            upstream: repo.parent().cloned(),
            clone_source: repo.clone(),
            origin: repo,
        }
    }

    fn with_fork(style: Style, primary: Repository, fork: Repository) -> Self {
        Self {
            style,
            clone_source: primary.clone(),
            origin: fork,
            upstream: Some(primary),
        }
    }

    /// The remotes a checkout at `path` must have, and no others
    pub fn required_remotes(&self, path: &Path) -> Vec<RemoteDescriptor> {
        let mut remotes = vec![RemoteDescriptor {
            name: ORIGIN.to_string(),
            source: self.origin.clone(),
            path: path.to_path_buf(),
        }];

        if let Some(upstream) = &self.upstream {
            remotes.push(RemoteDescriptor {
                name: UPSTREAM.to_string(),
                source: upstream.clone(),
                path: path.to_path_buf(),
            });
        }

        remotes
    }
}

/// Drive `plan` into existence at `path` and return the checkout path.
///
/// With `prune` set, remotes outside the plan are deleted so the remote set
/// matches the plan exactly.
pub async fn synchronize(
    kloner: &dyn Kloner,
    plan: &KlonePlan,
    path: &Path,
    prune: bool,
) -> Result<PathBuf, KloneError> {
    info!(
        "[{}] synchronizing {} with kloner [{}]",
        plan.style,
        plan.origin.full_name(),
        kloner.name()
    );

    let path = kloner.clone_repo(&plan.clone_source, path).await?;

    match reconcile(kloner, plan, &path, prune).await {
        Ok(()) => {
            info!("Klone of {} complete at [{}]", plan.origin.full_name(), path.display());
            Ok(path)
        }
        Err(source) => Err(KloneError::Incomplete {
            path,
            source: Box::new(source),
        }),
    }
}

async fn reconcile(
    kloner: &dyn Kloner,
    plan: &KlonePlan,
    path: &Path,
    prune: bool,
) -> Result<(), KloneError> {
    let required = plan.required_remotes(path);

    for remote in &required {
        kloner.delete_remote(&remote.name, &remote.path).await?;
        kloner
            .add_remote(&remote.name, &remote.source, &remote.path)
            .await?;
    }

    if prune {
        let wanted: BTreeSet<&str> = required.iter().map(|r| r.name.as_str()).collect();
        for remote in kloner.remotes(path).await? {
            if !wanted.contains(remote.name.as_str()) {
                debug!("Pruning unmanaged remote [{}] ({})", remote.name, remote.url);
                kloner.delete_remote(&remote.name, path).await?;
            }
        }
    }

    if plan.upstream.is_some() {
        kloner.pull(UPSTREAM, path).await?;
    }

    Ok(())
}
