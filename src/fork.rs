//! Fork orchestration
//!
//! Hosts create forks asynchronously: the request is accepted, but the new
//! repository may not be queryable for a while. [`ensure_fork`] asks for the
//! fork and, when the host says it is scheduled, polls for it at a fixed
//! interval up to a bounded number of attempts.
//!
//! The poll loop holds no state outside its own future. Dropping the future
//! (for example through `tokio::time::timeout`) cancels it.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::directory::RepositoryDirectory;
use crate::error::{DirectoryError, KloneError};
use crate::repository::Repository;

/// How long to wait for a scheduled fork
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for ForkPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 20,
        }
    }
}

/// Make sure `acting_user` has a fork of `repo` and return it.
///
/// A fork that already exists is returned as is. The host may give the fork a
/// different name than `repo` (when the user already has a repository by that
/// name); the name it reports is the one looked up. Only a repository that is
/// itself a fork is accepted. The returned repository always carries `repo` as
/// its fork parent, even when the host left it out.
pub async fn ensure_fork(
    repo: &Repository,
    acting_user: &str,
    directory: &dyn RepositoryDirectory,
    policy: ForkPolicy,
) -> Result<Repository, KloneError> {
    info!(
        "Forking {} to {}/{}",
        repo.full_name(),
        acting_user,
        repo.name
    );

    let fork = match directory.create_fork(repo, acting_user).await {
        Ok(fork) => fork,
        Err(DirectoryError::AlreadyExists { owner, name }) => {
            info!("Fork {}/{} already exists", owner, name);
            let existing = directory
                .get_repository(&owner, &name)
                .await
                .map_err(|source| KloneError::ForkFailed {
                    repository: repo.full_name(),
                    source,
                })?;
            if !existing.is_fork() {
                return Err(KloneError::ForkFailed {
                    repository: repo.full_name(),
                    source: DirectoryError::AlreadyExists { owner, name },
                });
            }
            existing
        }
        Err(DirectoryError::ForkScheduled { owner, name }) => {
            wait_for_fork(repo, &owner, &name, directory, policy).await?
        }
        Err(source) => {
            return Err(KloneError::ForkFailed {
                repository: repo.full_name(),
                source,
            })
        }
    };

    Ok(with_parent(fork, repo))
}

async fn wait_for_fork(
    repo: &Repository,
    owner: &str,
    name: &str,
    directory: &dyn RepositoryDirectory,
    policy: ForkPolicy,
) -> Result<Repository, KloneError> {
    let started = Instant::now();
    info!(
        "Fork of {} scheduled, waiting for {}/{} (up to {} checks)",
        repo.full_name(),
        owner,
        name,
        policy.max_attempts
    );

    for attempt in 1..=policy.max_attempts {
        sleep(policy.interval).await;

        match directory.get_repository(owner, name).await {
            Ok(fork) if fork.is_fork() => {
                info!(
                    "Fork {} available after {} checks ({:.1}s)",
                    fork.full_name(),
                    attempt,
                    started.elapsed().as_secs_f64()
                );
                return Ok(fork);
            }
            Ok(other) => {
                debug!(
                    "{} is not a fork (check {}/{})",
                    other.full_name(),
                    attempt,
                    policy.max_attempts
                );
            }
            Err(DirectoryError::NotFound { .. }) => {
                debug!("Fork not available yet (check {}/{})", attempt, policy.max_attempts);
            }
            Err(e) => {
                warn!(
                    "Checking for fork failed (check {}/{}): {}",
                    attempt, policy.max_attempts, e
                );
            }
        }
    }

    Err(KloneError::ForkTimeout {
        repository: format!("{}/{}", owner, name),
        attempts: policy.max_attempts,
        waited: policy.interval * policy.max_attempts,
    })
}

fn with_parent(mut fork: Repository, parent: &Repository) -> Repository {
    if fork.fork_parent.is_none() {
        fork.fork_parent = Some(Box::new(parent.clone()));
    }
    fork
}
