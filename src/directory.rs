//! Repository directory abstraction
//!
//! The directory is the hosting service as klone needs it: look a repository up
//! by owner and name, ask for a fork, and say who the acting user is.

use async_trait::async_trait;

use crate::error::DirectoryError;
use crate::repository::Repository;

/// Hosting-service capabilities consumed by the klone core
///
/// Implement this trait to add support for new git hosting providers.
#[async_trait]
pub trait RepositoryDirectory: Send + Sync {
    /// Login of the authenticated (acting) user
    fn acting_user(&self) -> &str;

    /// Look a repository up by owner and name, including its fork parent
    async fn get_repository(&self, owner: &str, name: &str) -> Result<Repository, DirectoryError>;

    /// Request a fork of `repo` owned by `new_owner`.
    ///
    /// Returns [`DirectoryError::ForkScheduled`] when the host accepted the
    /// request but the fork cannot be queried yet, and
    /// [`DirectoryError::AlreadyExists`] when the host refuses because the fork
    /// is already there.
    async fn create_fork(
        &self,
        repo: &Repository,
        new_owner: &str,
    ) -> Result<Repository, DirectoryError>;
}
