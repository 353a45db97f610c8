//! Go kloner
//!
//! Go code lives in a single shared workspace, so checkouts go under
//! `<gopath>/src` instead of the klone workspace root.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{add_remote_tolerant, delete_remote_tolerant, pull_remote, remote_url};
use super::{Kloner, KlonerContext};
use crate::error::{GitError, KloneError};
use crate::git::{Remote, Vcs};
use crate::path::{gopath, PathResolver};
use crate::repository::{CloneProtocol, Repository};

pub struct GoKloner {
    vcs: Arc<dyn Vcs>,
    resolver: PathResolver,
    protocol: CloneProtocol,
}

impl GoKloner {
    pub fn new(ctx: &KlonerContext) -> Self {
        let root = gopath(ctx.gopath.as_deref()).join("src");
        Self {
            vcs: Arc::clone(&ctx.vcs),
            resolver: PathResolver::new(root),
            protocol: ctx.protocol,
        }
    }

    pub fn boxed(ctx: &KlonerContext) -> Box<dyn Kloner> {
        Box::new(Self::new(ctx))
    }

    async fn report_head(&self, path: &Path) {
        match self.vcs.head_commit(path).await {
            Ok(Some(hash)) => info!("Checked out HEAD [{}]", hash),
            Ok(None) => debug!("Checkout at [{}] has no commits", path.display()),
            Err(e) => warn!("Unable to read HEAD at [{}]: {}", path.display(), e),
        }
    }
}

#[async_trait]
impl Kloner for GoKloner {
    fn name(&self) -> &'static str {
        "go"
    }

    fn clone_directory(&self, repo: &Repository) -> PathBuf {
        self.resolver.resolve(repo)
    }

    async fn clone_repo(&self, source: &Repository, path: &Path) -> Result<PathBuf, KloneError> {
        let url = remote_url(source, self.protocol)?;
        info!("Cloning [{}] into GOPATH [{}]", url, path.display());

        match self.vcs.clone_to(&url, path).await {
            Ok(()) => {}
            Err(GitError::AlreadyExists(_)) => {
                info!("Already cloned at [{}]", path.display());
                return Ok(path.to_path_buf());
            }
            Err(GitError::Capability(message)) => {
                warn!("Clone of {} reported: {}; continuing", source.full_name(), message);
            }
            Err(source) => return Err(KloneError::Clone { url, source }),
        }

        self.report_head(path).await;
        Ok(path.to_path_buf())
    }

    async fn remotes(&self, path: &Path) -> Result<Vec<Remote>, KloneError> {
        self.vcs
            .remotes(path)
            .await
            .map_err(|source| KloneError::git("list remotes", source))
    }

    async fn delete_remote(&self, name: &str, path: &Path) -> Result<(), KloneError> {
        delete_remote_tolerant(self.vcs.as_ref(), name, path).await
    }

    async fn add_remote(
        &self,
        name: &str,
        remote: &Repository,
        path: &Path,
    ) -> Result<(), KloneError> {
        let url = remote_url(remote, self.protocol)?;
        add_remote_tolerant(self.vcs.as_ref(), name, &url, path).await
    }

    async fn pull(&self, name: &str, path: &Path) -> Result<(), KloneError> {
        pull_remote(self.vcs.as_ref(), name, path).await
    }
}
