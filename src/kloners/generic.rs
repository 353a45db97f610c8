use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::{add_remote_tolerant, delete_remote_tolerant, pull_remote, remote_url};
use super::{Kloner, KlonerContext};
use crate::error::{GitError, KloneError};
use crate::git::{Remote, Vcs};
use crate::path::PathResolver;
use crate::repository::{CloneProtocol, Repository};

/// Language-agnostic kloner rooted at the configured workspace
pub struct GenericKloner {
    vcs: Arc<dyn Vcs>,
    resolver: PathResolver,
    protocol: CloneProtocol,
}

impl GenericKloner {
    pub fn new(ctx: &KlonerContext) -> Self {
        Self {
            vcs: Arc::clone(&ctx.vcs),
            resolver: PathResolver::new(&ctx.workspace_root),
            protocol: ctx.protocol,
        }
    }

    pub fn boxed(ctx: &KlonerContext) -> Box<dyn Kloner> {
        Box::new(Self::new(ctx))
    }
}

#[async_trait]
impl Kloner for GenericKloner {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn clone_directory(&self, repo: &Repository) -> PathBuf {
        self.resolver.resolve(repo)
    }

    async fn clone_repo(&self, source: &Repository, path: &Path) -> Result<PathBuf, KloneError> {
        let url = remote_url(source, self.protocol)?;
        info!("Cloning [{}] into [{}]", url, path.display());

        match self.vcs.clone_to(&url, path).await {
            Ok(()) => info!("Cloned {}", source.full_name()),
            Err(GitError::AlreadyExists(_)) => {
                info!("Already cloned at [{}]", path.display());
            }
            Err(GitError::Capability(message)) => {
                warn!("Clone of {} reported: {}; continuing", source.full_name(), message);
            }
            Err(source) => return Err(KloneError::Clone { url, source }),
        }

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
