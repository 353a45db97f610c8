//! In-memory directory and VCS doubles for unit tests

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::directory::RepositoryDirectory;
use crate::error::{DirectoryError, GitError};
use crate::git::{Remote, Vcs};
use crate::repository::Repository;

/// How [`FakeDirectory::create_fork`] behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkBehavior {
    /// The fork is returned straight away
    Immediate,
    /// The fork is scheduled and shows up after this many lookups of it
    VisibleAfter(usize),
    /// The fork is scheduled and never shows up
    NeverVisible,
    /// The host answers that the fork already exists
    AlreadyExists,
    /// The host refuses because the name is taken, without making a fork
    NameTaken,
    /// The fork is scheduled under another name and shows up on first lookup
    RenamedTo(&'static str),
    /// The host rejects the fork
    Rejected,
}

pub struct FakeDirectory {
    acting_user: String,
    repositories: Mutex<HashMap<(String, String), Repository>>,
    pending_fork: Mutex<Option<(Repository, usize)>>,
    fork_behavior: ForkBehavior,
    failing_lookups: bool,
    lookups: AtomicUsize,
    fork_calls: AtomicUsize,
}

impl FakeDirectory {
    pub fn new(acting_user: &str) -> Self {
        Self {
            acting_user: acting_user.to_string(),
            repositories: Mutex::new(HashMap::new()),
            pending_fork: Mutex::new(None),
            fork_behavior: ForkBehavior::Immediate,
            failing_lookups: false,
            lookups: AtomicUsize::new(0),
            fork_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_repository(self, repo: Repository) -> Self {
        self.insert(repo);
        self
    }

    pub fn with_fork_behavior(mut self, behavior: ForkBehavior) -> Self {
        self.fork_behavior = behavior;
        self
    }

    pub fn failing_lookups(mut self) -> Self {
        self.failing_lookups = true;
        self
    }

    pub fn insert(&self, repo: Repository) {
        self.repositories
            .lock()
            .unwrap()
            .insert((repo.owner.clone(), repo.name.clone()), repo);
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn fork_calls(&self) -> usize {
        self.fork_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepositoryDirectory for FakeDirectory {
    fn acting_user(&self) -> &str {
        &self.acting_user
    }

    async fn get_repository(&self, owner: &str, name: &str) -> Result<Repository, DirectoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if self.failing_lookups {
            return Err(DirectoryError::Api(anyhow::anyhow!("503 Service Unavailable")));
        }

        {
            let mut pending = self.pending_fork.lock().unwrap();
            if let Some((fork, remaining)) = pending.as_mut() {
                if fork.owner == owner && fork.name == name {
                    if *remaining <= 1 {
                        let fork = fork.clone();
                        *pending = None;
                        self.insert(fork);
                    } else {
                        *remaining -= 1;
                    }
                }
            }
        }

        self.repositories
            .lock()
            .unwrap()
            .get(&(owner.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| DirectoryError::not_found(owner, name))
    }

    async fn create_fork(
        &self,
        repo: &Repository,
        new_owner: &str,
    ) -> Result<Repository, DirectoryError> {
        self.fork_calls.fetch_add(1, Ordering::SeqCst);
        let fork = repo.predicted_fork(new_owner);

        match self.fork_behavior {
            ForkBehavior::Immediate => {
                self.insert(fork.clone());
                Ok(fork)
            }
            ForkBehavior::VisibleAfter(lookups) => {
                *self.pending_fork.lock().unwrap() = Some((fork, lookups));
                Err(DirectoryError::ForkScheduled {
                    owner: new_owner.to_string(),
                    name: repo.name.clone(),
                })
            }
            ForkBehavior::NeverVisible => Err(DirectoryError::ForkScheduled {
                owner: new_owner.to_string(),
                name: repo.name.clone(),
            }),
            ForkBehavior::AlreadyExists => {
                self.insert(fork);
                Err(DirectoryError::AlreadyExists {
                    owner: new_owner.to_string(),
                    name: repo.name.clone(),
                })
            }
            ForkBehavior::NameTaken => Err(DirectoryError::AlreadyExists {
                owner: new_owner.to_string(),
                name: repo.name.clone(),
            }),
            ForkBehavior::RenamedTo(renamed) => {
                let fork = Repository::new(&repo.host, new_owner, renamed)
                    .with_language(&repo.language)
                    .forked_from(repo.clone());
                *self.pending_fork.lock().unwrap() = Some((fork, 1));
                Err(DirectoryError::ForkScheduled {
                    owner: new_owner.to_string(),
                    name: renamed.to_string(),
                })
            }
            ForkBehavior::Rejected => Err(DirectoryError::Api(anyhow::anyhow!(
                "403 Forbidden: forking is disabled"
            ))),
        }
    }
}

/// A local checkout as tracked by [`FakeVcs`]
#[derive(Debug, Clone, Default)]
pub struct Checkout {
    pub cloned_from: String,
    pub remotes: BTreeMap<String, String>,
    pub pulls: Vec<String>,
}

/// VCS double that keeps checkouts in memory, keyed by path
#[derive(Default)]
pub struct FakeVcs {
    checkouts: Mutex<HashMap<PathBuf, Checkout>>,
    clone_error: Mutex<Option<GitError>>,
    failing_pull: bool,
    clones: AtomicUsize,
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next clone fails with `error`
    pub fn failing_clone(self, error: GitError) -> Self {
        *self.clone_error.lock().unwrap() = Some(error);
        self
    }

    pub fn failing_pull(mut self) -> Self {
        self.failing_pull = true;
        self
    }

    pub fn checkout(&self, path: &Path) -> Option<Checkout> {
        self.checkouts.lock().unwrap().get(path).cloned()
    }

    /// Remote name to URL for the checkout at `path`
    pub fn remote_set(&self, path: &Path) -> BTreeMap<String, String> {
        self.checkout(path).map(|c| c.remotes).unwrap_or_default()
    }

    /// Plant a checkout as if a previous run (or the user) made it
    pub fn plant(&self, path: &Path, checkout: Checkout) {
        self.checkouts
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), checkout);
    }

    pub fn clones(&self) -> usize {
        self.clones.load(Ordering::SeqCst)
    }

    fn with_checkout<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&mut Checkout) -> Result<T, GitError>,
    ) -> Result<T, GitError> {
        let mut checkouts = self.checkouts.lock().unwrap();
        let checkout = checkouts
            .get_mut(path)
            .ok_or_else(|| GitError::NotFound(format!("{} is not a repository", path.display())))?;
        f(checkout)
    }
}

#[async_trait]
impl Vcs for FakeVcs {
    async fn clone_to(&self, url: &str, path: &Path) -> Result<(), GitError> {
        self.clones.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.clone_error.lock().unwrap().take() {
            if !matches!(error, GitError::Capability(_)) {
                return Err(error);
            }
            // A capability failure still leaves a usable checkout behind
            self.plant(
                path,
                Checkout {
                    cloned_from: url.to_string(),
                    remotes: BTreeMap::from([("origin".to_string(), url.to_string())]),
                    pulls: Vec::new(),
                },
            );
            return Err(error);
        }

        let mut checkouts = self.checkouts.lock().unwrap();
        if checkouts.contains_key(path) {
            return Err(GitError::AlreadyExists(format!(
                "destination path '{}' already exists",
                path.display()
            )));
        }
        checkouts.insert(
            path.to_path_buf(),
            Checkout {
                cloned_from: url.to_string(),
                remotes: BTreeMap::from([("origin".to_string(), url.to_string())]),
                pulls: Vec::new(),
            },
        );
        Ok(())
    }

    async fn remotes(&self, path: &Path) -> Result<Vec<Remote>, GitError> {
        self.with_checkout(path, |checkout| {
            Ok(checkout
                .remotes
                .iter()
                .map(|(name, url)| Remote {
                    name: name.clone(),
                    url: url.clone(),
                })
                .collect())
        })
    }

    async fn add_remote(&self, path: &Path, name: &str, url: &str) -> Result<(), GitError> {
        self.with_checkout(path, |checkout| {
            if checkout.remotes.contains_key(name) {
                return Err(GitError::AlreadyExists(format!(
                    "remote {} already exists",
                    name
                )));
            }
            checkout.remotes.insert(name.to_string(), url.to_string());
            Ok(())
        })
    }

    async fn delete_remote(&self, path: &Path, name: &str) -> Result<(), GitError> {
        self.with_checkout(path, |checkout| {
            checkout
                .remotes
                .remove(name)
                .map(|_| ())
                .ok_or_else(|| GitError::NotFound(format!("No such remote: '{}'", name)))
        })
    }

    async fn fetch(&self, path: &Path, remote: &str) -> Result<(), GitError> {
        self.with_checkout(path, |checkout| {
            if checkout.remotes.contains_key(remote) {
                Ok(())
            } else {
                Err(GitError::NotFound(format!("No such remote: '{}'", remote)))
            }
        })
    }

    async fn pull(&self, path: &Path, remote: &str, branch: &str) -> Result<(), GitError> {
        let failing = self.failing_pull;
        self.with_checkout(path, |checkout| {
            if failing {
                return Err(GitError::Command {
                    command: "pull".to_string(),
                    stderr: "fatal: Not possible to fast-forward, aborting.".to_string(),
                });
            }
            checkout.pulls.push(format!("{}/{}", remote, branch));
            Ok(())
        })
    }

    async fn head_commit(&self, path: &Path) -> Result<Option<String>, GitError> {
        self.with_checkout(path, |_| Ok(Some("0123456789abcdef".to_string())))
    }
}
