//! Kloners: language-specific checkout engines
//!
//! A [`Kloner`] knows where a repository belongs on disk and how to clone it
//! and manage its remotes. Engines are picked by the repository's primary
//! language from a [`KlonerRegistry`] of constructors; each engine is a
//! standalone implementation of the trait.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{GitError, KloneError};
use crate::git::{Remote, Vcs};
use crate::repository::{CloneProtocol, Repository};

pub mod generic;
pub mod golang;

pub use generic::GenericKloner;
pub use golang::GoKloner;

/// Branch pulled from upstream: whatever the remote's HEAD points at
pub const UPSTREAM_BRANCH: &str = "HEAD";

/// Checkout engine contract.
///
/// Every operation is tolerant of the state a previous run left behind:
/// cloning into an existing checkout, adding a remote that exists and
/// deleting one that does not all succeed without changes.
#[async_trait]
pub trait Kloner: Send + Sync {
    /// Engine name for logging
    fn name(&self) -> &'static str;

    /// Local directory `repo` is checked out into
    fn clone_directory(&self, repo: &Repository) -> PathBuf;

    /// Clone `source` into `path`, returning the checkout path
    async fn clone_repo(&self, source: &Repository, path: &Path) -> Result<PathBuf, KloneError>;

    async fn remotes(&self, path: &Path) -> Result<Vec<Remote>, KloneError>;

    async fn delete_remote(&self, name: &str, path: &Path) -> Result<(), KloneError>;

    /// Add remote `name` pointing at `remote` and fetch it
    async fn add_remote(&self, name: &str, remote: &Repository, path: &Path)
        -> Result<(), KloneError>;

    async fn pull(&self, name: &str, path: &Path) -> Result<(), KloneError>;
}

/// Everything a kloner constructor needs
#[derive(Clone)]
pub struct KlonerContext {
    pub vcs: Arc<dyn Vcs>,
    pub workspace_root: PathBuf,
    pub gopath: Option<String>,
    pub protocol: CloneProtocol,
}

impl KlonerContext {
    pub fn new(config: &Config, vcs: Arc<dyn Vcs>) -> Self {
        Self {
            vcs,
            workspace_root: PathBuf::from(&config.workspace_root),
            gopath: config.languages.go.gopath.clone(),
            protocol: config.clone.protocol,
        }
    }
}

/// Constructor stored in the registry
pub type NewKlonerFn = fn(&KlonerContext) -> Box<dyn Kloner>;

/// Language to kloner constructor table.
///
/// Keys are lower case; lookups lower-case the language first. Unknown and
/// empty languages get the generic kloner.
pub struct KlonerRegistry {
    constructors: HashMap<String, NewKlonerFn>,
}

impl KlonerRegistry {
    /// Registry with the built-in kloners
    pub fn new() -> Self {
        let mut registry = Self {
            constructors: HashMap::new(),
        };
        registry.register("", GenericKloner::boxed);
        registry.register("go", GoKloner::boxed);
        registry
    }

    pub fn register(&mut self, language: &str, constructor: NewKlonerFn) {
        self.constructors
            .insert(language.to_lowercase(), constructor);
    }

    /// Kloner for a repository whose primary language is `language`
    pub fn select(&self, language: &str, ctx: &KlonerContext) -> Box<dyn Kloner> {
        let key = language.trim().to_lowercase();
        match self.constructors.get(&key) {
            Some(constructor) => {
                let kloner = constructor(ctx);
                debug!("Found kloner [{}] for language [{}]", kloner.name(), language);
                kloner
            }
            None => {
                info!("Unsupported language [{}], using kloner [generic]", language);
                GenericKloner::boxed(ctx)
            }
        }
    }
}

impl Default for KlonerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// URL to reach `repo` with the preferred protocol
pub(crate) fn remote_url(repo: &Repository, protocol: CloneProtocol) -> Result<String, KloneError> {
    repo.clone_url(protocol)
        .map(str::to_string)
        .ok_or_else(|| KloneError::NoCloneUrl {
            repository: repo.full_name(),
        })
}

/// Delete `name`, treating a missing remote as done
pub(crate) async fn delete_remote_tolerant(
    vcs: &dyn Vcs,
    name: &str,
    path: &Path,
) -> Result<(), KloneError> {
    match vcs.delete_remote(path, name).await {
        Ok(()) => {
            debug!("Deleted remote [{}]", name);
            Ok(())
        }
        Err(GitError::NotFound(_)) => {
            debug!("Remote [{}] not present, nothing to delete", name);
            Ok(())
        }
        Err(source) => Err(KloneError::git(format!("delete remote {}", name), source)),
    }
}

/// Add `name` → `url` and fetch it, treating an existing remote as done
pub(crate) async fn add_remote_tolerant(
    vcs: &dyn Vcs,
    name: &str,
    url: &str,
    path: &Path,
) -> Result<(), KloneError> {
    info!("Adding remote [{}] [{}]", name, url);
    match vcs.add_remote(path, name, url).await {
        Ok(()) => {}
        Err(GitError::AlreadyExists(message)) => {
            debug!("Remote: {}", message);
            return Ok(());
        }
        Err(source) => return Err(KloneError::git(format!("add remote {}", name), source)),
    }

    info!("Fetching remote [{}]", name);
    vcs.fetch(path, name)
        .await
        .map_err(|source| KloneError::git(format!("fetch remote {}", name), source))
}

/// Pull upstream's HEAD into the current branch
pub(crate) async fn pull_remote(vcs: &dyn Vcs, name: &str, path: &Path) -> Result<(), KloneError> {
    info!("Pulling remote [{}]", name);
    vcs.pull(path, name, UPSTREAM_BRANCH)
        .await
        .map_err(|source| KloneError::git(format!("pull {}", name), source))
}
