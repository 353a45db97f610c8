//! Clone path resolution
//!
//! Checkouts live at `<root>/<host>/<owner>/<name>`. A few well-known projects
//! are conventionally checked out under a fixed namespace instead; anything
//! forked from one of those owners resolves to `<root>/<namespace>/<name>`.

use path_clean::PathClean;
use std::env;
use std::path::PathBuf;

use crate::repository::Repository;

/// Fork-parent owners whose forks are checked out under a fixed namespace
const FLATTENED_NAMESPACES: &[(&str, &str)] = &[("kubernetes", "k8s.io")];

/// Maps repositories to local checkout directories under one root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        Self { root: root.clean() }
    }

    /// Local directory for `repo`
    pub fn resolve(&self, repo: &Repository) -> PathBuf {
        if let Some(namespace) = repo.parent().and_then(|p| flattened_namespace(&p.owner)) {
            return self.root.join(namespace).join(&repo.name);
        }

        self.root.join(&repo.host).join(&repo.owner).join(&repo.name)
    }
}

fn flattened_namespace(owner: &str) -> Option<&'static str> {
    FLATTENED_NAMESPACES
        .iter()
        .find(|(known, _)| *known == owner)
        .map(|(_, namespace)| *namespace)
}

/// The Go workspace: the configured override, else the first `$GOPATH` entry,
/// else `$HOME/go`
pub fn gopath(configured: Option<&str>) -> PathBuf {
    if let Some(path) = configured.filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }

    env::var_os("GOPATH")
        .and_then(|value| env::split_paths(&value).find(|p| !p.as_os_str().is_empty()))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("go")
        })
}
