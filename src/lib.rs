//! klone - clone a GitHub repository into the right place with the right remotes
//!
//! Given `name` or `owner/name`, klone works out how the repository relates to
//! the authenticated user, forks it when the user does not own it, clones it
//! into a conventional location and leaves `origin` pointing at the user's copy
//! and `upstream` at the source it was forked from.
//!
//! ## Modules
//!
//! - [`classify`]: ownership/fork styles
//! - [`fork`]: fork creation and polling for asynchronous forks
//! - [`topology`]: remote plans and synchronization
//! - [`path`]: local checkout locations
//! - [`kloners`]: per-language checkout engines
//! - [`github`]: GitHub API integration and authentication
//! - [`config`]: Configuration management and parsing

pub mod classify;
pub mod config;
pub mod directory;
pub mod error;
pub mod fork;
pub mod git;
pub mod github;
pub mod health;
pub mod klone;
pub mod kloners;
pub mod path;
pub mod repository;
pub mod topology;

#[cfg(test)]
mod testing;

pub use classify::{Classification, Style};
pub use config::Config;
pub use directory::RepositoryDirectory;
pub use error::{DirectoryError, GitError, KloneError};
pub use git::{GitClient, Vcs};
pub use github::GitHubClient;
pub use health::HealthReport;
pub use klone::{Klone, KloneReport};
pub use repository::{CloneProtocol, RepoName, Repository};
