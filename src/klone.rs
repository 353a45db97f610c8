//! The klone operation
//!
//! [`Klone::klone`] takes `name` or `owner/name`, works out how the repository
//! relates to the acting user, forks it when needed, and leaves a checkout with
//! `origin` (and `upstream`, for forks) configured. The whole run is bounded by
//! the configured timeout; hitting it drops the run wherever it is, including
//! a fork poll in progress.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::classify::{classify, Classification, Style};
use crate::config::Config;
use crate::directory::RepositoryDirectory;
use crate::error::KloneError;
use crate::fork::ForkPolicy;
use crate::git::Vcs;
use crate::kloners::{Kloner, KlonerContext, KlonerRegistry};
use crate::repository::{RepoName, Repository};
use crate::topology::{synchronize, KlonePlan, RemoteDescriptor};

/// Entry point tying the directory, VCS and kloners together
pub struct Klone {
    directory: Arc<dyn RepositoryDirectory>,
    context: KlonerContext,
    registry: KlonerRegistry,
    fork_policy: ForkPolicy,
    prune_remotes: bool,
    timeout: Duration,
}

/// What a run would do, as reported by a dry run
#[derive(Debug, Clone)]
pub struct KloneReport {
    pub style: Style,
    pub kloner: &'static str,
    pub path: PathBuf,
    pub clone_source: Repository,
    pub remotes: Vec<RemoteDescriptor>,
    /// A fork would be requested
    pub forks: bool,
}

impl fmt::Display for KloneReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Style:   {}", self.style)?;
        writeln!(f, "Kloner:  {}", self.kloner)?;
        writeln!(f, "Path:    {}", self.path.display())?;
        writeln!(f, "Clone:   {}", self.clone_source.full_name())?;
        if self.forks {
            writeln!(f, "Fork:    yes")?;
        }
        for remote in &self.remotes {
            writeln!(f, "Remote:  {}", remote)?;
        }
        Ok(())
    }
}

impl Klone {
    pub fn new(config: &Config, directory: Arc<dyn RepositoryDirectory>, vcs: Arc<dyn Vcs>) -> Self {
        Self {
            directory,
            context: KlonerContext::new(config, vcs),
            registry: KlonerRegistry::new(),
            fork_policy: config.fork_policy(),
            prune_remotes: config.sync.prune_remotes,
            timeout: config.sync_timeout(),
        }
    }

    /// Replace the kloner registry
    pub fn with_registry(mut self, registry: KlonerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Override the overall run timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn acting_user(&self) -> &str {
        self.directory.acting_user()
    }

    /// Klone `name` and return the local checkout path.
    ///
    /// On [`KloneError::Incomplete`] the checkout exists at
    /// [`KloneError::local_path`] and running klone again finishes the job.
    pub async fn klone(&self, name: &str) -> Result<PathBuf, KloneError> {
        match tokio::time::timeout(self.timeout, self.run(name)).await {
            Ok(result) => result,
            Err(_) => Err(KloneError::TimedOut(self.timeout)),
        }
    }

    /// Work out what [`klone`](Self::klone) would do without forking, cloning
    /// or touching remotes
    pub async fn plan(&self, name: &str) -> Result<KloneReport, KloneError> {
        let classification = self.classify(name).await?;
        let kloner = self.kloner_for(&classification);
        let plan = KlonePlan::predict(classification, self.acting_user());
        let path = kloner.clone_directory(&plan.origin);

        Ok(KloneReport {
            style: plan.style,
            kloner: kloner.name(),
            remotes: plan.required_remotes(&path),
            forks: plan.style.needs_fork(),
            clone_source: plan.clone_source,
            path,
        })
    }

    async fn run(&self, name: &str) -> Result<PathBuf, KloneError> {
        let classification = self.classify(name).await?;
        let kloner = self.kloner_for(&classification);

        let plan = KlonePlan::build(
            classification,
            self.acting_user(),
            self.directory.as_ref(),
            self.fork_policy,
        )
        .await?;

        let path = kloner.clone_directory(&plan.origin);
        synchronize(kloner.as_ref(), &plan, &path, self.prune_remotes).await
    }

    async fn classify(&self, name: &str) -> Result<Classification, KloneError> {
        let name = RepoName::parse(name)?;
        let owner = name.owner_or(self.acting_user());
        debug!("Looking up {}/{}", owner, name.name);

        let repo = self
            .directory
            .get_repository(owner, &name.name)
            .await
            .map_err(KloneError::Lookup)?;

        Ok(classify(repo, self.acting_user(), self.directory.as_ref()).await)
    }

    /// The kloner for the repository's primary language; an existing fork may
    /// not report one, so the requested repository's language is the fallback
    fn kloner_for(&self, classification: &Classification) -> Box<dyn Kloner> {
        let language = if classification.resolved.language.is_empty() {
            &classification.primary.language
        } else {
            &classification.resolved.language
        };
        let kloner = self.registry.select(language, &self.context);
        info!("Using kloner [{}]", kloner.name());
        kloner
    }
}
