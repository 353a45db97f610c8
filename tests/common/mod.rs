//! Shared helpers for klone integration tests: local bare repositories standing
//! in for GitHub, and a directory that serves them.
#![allow(dead_code)]

use assert_fs::prelude::*;
use assert_fs::TempDir;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use klone::{CloneProtocol, Config, DirectoryError, Repository, RepositoryDirectory};

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Run git in `dir`, panicking with stderr on failure
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=klone",
            "-c",
            "user.email=klone@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");

    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A scratch area holding "hosted" bare repositories and a workspace root
pub struct GitFixture {
    pub temp: TempDir,
}

impl GitFixture {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn workspace(&self) -> PathBuf {
        self.temp.child("src").path().to_path_buf()
    }

    fn seed_dir(&self, owner: &str, name: &str) -> PathBuf {
        self.temp.child("seed").child(owner).child(name).path().to_path_buf()
    }

    pub fn bare_dir(&self, owner: &str, name: &str) -> PathBuf {
        self.temp
            .child("hosted")
            .child(owner)
            .child(format!("{}.git", name))
            .path()
            .to_path_buf()
    }

    /// Create `owner/name` with one commit on `main`
    pub fn publish(&self, owner: &str, name: &str) -> Repository {
        let seed = self.seed_dir(owner, name);
        std::fs::create_dir_all(&seed).unwrap();
        git(&seed, &["init", "-q"]);
        git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        std::fs::write(seed.join("README.md"), format!("# {}\n", name)).unwrap();
        git(&seed, &["add", "README.md"]);
        git(&seed, &["commit", "-q", "-m", "Initial commit"]);

        let bare = self.bare_dir(owner, name);
        std::fs::create_dir_all(bare.parent().unwrap()).unwrap();
        git(
            self.temp.path(),
            &["clone", "-q", "--bare", seed.to_str().unwrap(), bare.to_str().unwrap()],
        );

        self.repository(owner, name)
    }

    /// Fork `source` to `owner` on the "host"
    pub fn fork(&self, source: &Repository, owner: &str) -> Repository {
        let bare = self.bare_dir(owner, &source.name);
        std::fs::create_dir_all(bare.parent().unwrap()).unwrap();
        git(
            self.temp.path(),
            &[
                "clone",
                "-q",
                "--bare",
                self.bare_dir(&source.owner, &source.name).to_str().unwrap(),
                bare.to_str().unwrap(),
            ],
        );

        self.repository(owner, &source.name)
            .forked_from(source.clone())
    }

    /// Commit `file` to `owner/name` on the host
    pub fn commit(&self, owner: &str, name: &str, file: &str) {
        let seed = self.seed_dir(owner, name);
        std::fs::write(seed.join(file), "change\n").unwrap();
        git(&seed, &["add", file]);
        git(&seed, &["commit", "-q", "-m", &format!("Add {}", file)]);
        git(
            &seed,
            &["push", "-q", self.bare_dir(owner, name).to_str().unwrap(), "main"],
        );
    }

    fn repository(&self, owner: &str, name: &str) -> Repository {
        let mut repo = Repository::new("github.com", owner, name);
        repo.ssh_url = None;
        repo.https_url = Some(self.bare_dir(owner, name).to_string_lossy().into_owned());
        repo
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.workspace_root = self.workspace().to_string_lossy().into_owned();
        config.clone.protocol = CloneProtocol::Https;
        config.clone.recurse_submodules = false;
        config
    }
}

/// Repository directory serving a [`GitFixture`]'s repositories
pub struct LocalDirectory {
    user: String,
    fixture: Arc<GitFixture>,
    repositories: Mutex<HashMap<(String, String), Repository>>,
    fork_calls: AtomicUsize,
}

impl LocalDirectory {
    pub fn new(user: &str, fixture: Arc<GitFixture>) -> Self {
        Self {
            user: user.to_string(),
            fixture,
            repositories: Mutex::new(HashMap::new()),
            fork_calls: AtomicUsize::new(0),
        }
    }

    pub fn serve(&self, repo: Repository) {
        self.repositories
            .lock()
            .unwrap()
            .insert((repo.owner.clone(), repo.name.clone()), repo);
    }

    pub fn fork_calls(&self) -> usize {
        self.fork_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepositoryDirectory for LocalDirectory {
    fn acting_user(&self) -> &str {
        &self.user
    }

    async fn get_repository(&self, owner: &str, name: &str) -> Result<Repository, DirectoryError> {
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
        let fork = self.fixture.fork(repo, new_owner);
        self.serve(fork.clone());
        Ok(fork)
    }
}

/// Remote name to URL of the checkout at `path`
pub fn remotes(path: &Path) -> Vec<(String, String)> {
    let mut remotes: Vec<(String, String)> = git(path, &["remote"])
        .lines()
        .map(|name| {
            let url = git(path, &["remote", "get-url", name]);
            (name.to_string(), url)
        })
        .collect();
    remotes.sort();
    remotes
}
