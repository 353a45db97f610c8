//! Repository values as klone sees them
//!
//! A [`Repository`] is a snapshot of what the hosting service reports: who owns
//! it, what it is called, its primary language, where to clone it from, and at
//! most one fork parent.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::KloneError;

/// Transport preference when choosing a clone URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CloneProtocol {
    /// Use SSH (git@github.com:user/repo.git)
    #[default]
    Ssh,
    /// Use HTTPS (https://github.com/user/repo.git)
    Https,
}

/// A repository on the hosting service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub owner: String,
    pub name: String,
    /// Host the repository lives on (e.g. "github.com")
    pub host: String,
    /// Primary language, empty when the host does not know it
    pub language: String,
    pub ssh_url: Option<String>,
    pub https_url: Option<String>,
    /// The repository this one was forked from
    pub fork_parent: Option<Box<Repository>>,
}

impl Repository {
    /// A root repository with conventional URLs on `host`
    pub fn new(host: &str, owner: &str, name: &str) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            host: host.to_string(),
            language: String::new(),
            ssh_url: Some(format!("git@{}:{}/{}.git", host, owner, name)),
            https_url: Some(format!("https://{}/{}/{}.git", host, owner, name)),
            fork_parent: None,
        }
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    pub fn forked_from(mut self, parent: Repository) -> Self {
        self.fork_parent = Some(Box::new(parent));
        self
    }

    pub fn parent(&self) -> Option<&Repository> {
        self.fork_parent.as_deref()
    }

    pub fn is_fork(&self) -> bool {
        self.fork_parent.is_some()
    }

    /// Display name (owner/name format)
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Clone URL for the preferred protocol, falling back to the other one
    pub fn clone_url(&self, protocol: CloneProtocol) -> Option<&str> {
        let (preferred, fallback) = match protocol {
            CloneProtocol::Ssh => (&self.ssh_url, &self.https_url),
            CloneProtocol::Https => (&self.https_url, &self.ssh_url),
        };
        preferred.as_deref().or(fallback.as_deref())
    }

    /// The fork of this repository that `owner` would get from the host.
    ///
    /// URLs are rewritten by swapping the owner segment, which is how the host
    /// names forks. Only used for planning before the fork exists.
    pub fn predicted_fork(&self, owner: &str) -> Repository {
        let rewrite = |url: &Option<String>| {
            url.as_ref().map(|u| {
                u.replacen(
                    &format!("{}/{}", self.owner, self.name),
                    &format!("{}/{}", owner, self.name),
                    1,
                )
            })
        };

        Repository {
            owner: owner.to_string(),
            name: self.name.clone(),
            host: self.host.clone(),
            language: self.language.clone(),
            ssh_url: rewrite(&self.ssh_url),
            https_url: rewrite(&self.https_url),
            fork_parent: Some(Box::new(self.clone())),
        }
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A repository name as typed on the command line: `name` or `owner/name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoName {
    pub owner: Option<String>,
    pub name: String,
}

impl RepoName {
    pub fn parse(input: &str) -> Result<Self, KloneError> {
        let trimmed = input.trim().trim_end_matches(".git");
        let invalid = || KloneError::InvalidName(input.to_string());

        let parts: Vec<&str> = trimmed.split('/').collect();
        match parts.as_slice() {
            [name] if !name.is_empty() => Ok(Self {
                owner: None,
                name: name.to_string(),
            }),
            [owner, name] if !owner.is_empty() && !name.is_empty() => Ok(Self {
                owner: Some(owner.to_string()),
                name: name.to_string(),
            }),
            _ => Err(invalid()),
        }
    }

    /// Owner to look the repository up under, defaulting to the acting user
    pub fn owner_or<'a>(&'a self, acting_user: &'a str) -> &'a str {
        self.owner.as_deref().unwrap_or(acting_user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_bare_name() {
        let parsed = RepoName::parse("kops").unwrap();
        assert_eq!(parsed.owner, None);
        assert_eq!(parsed.name, "kops");
        assert_eq!(parsed.owner_or("kris-nova"), "kris-nova");
    }

    #[test]
    fn test_parse_owner_and_name() {
        let parsed = RepoName::parse(" kubernetes/kops.git ").unwrap();
        assert_eq!(parsed.owner.as_deref(), Some("kubernetes"));
        assert_eq!(parsed.name, "kops");
        assert_eq!(parsed.owner_or("kris-nova"), "kubernetes");
    }

    #[test]
    fn test_parse_rejects_malformed_names() {
        for input in ["", "/", "a/b/c", "owner/", "/name"] {
            assert_matches!(RepoName::parse(input), Err(KloneError::InvalidName(_)));
        }
    }

    #[test]
    fn test_clone_url_falls_back_to_other_protocol() {
        let mut repo = Repository::new("github.com", "bob", "lib");
        assert_eq!(
            repo.clone_url(CloneProtocol::Ssh),
            Some("git@github.com:bob/lib.git")
        );

        repo.ssh_url = None;
        assert_eq!(
            repo.clone_url(CloneProtocol::Ssh),
            Some("https://github.com/bob/lib.git")
        );

        repo.https_url = None;
        assert_eq!(repo.clone_url(CloneProtocol::Https), None);
    }

    #[test]
    fn test_predicted_fork_rewrites_owner() {
        let upstream = Repository::new("github.com", "bob", "lib").with_language("Go");
        let fork = upstream.predicted_fork("alice");

        assert_eq!(fork.full_name(), "alice/lib");
        assert_eq!(fork.language, "Go");
        assert_eq!(fork.ssh_url.as_deref(), Some("git@github.com:alice/lib.git"));
        assert_eq!(
            fork.https_url.as_deref(),
            Some("https://github.com/alice/lib.git")
        );
        assert_eq!(fork.parent(), Some(&upstream));
    }
}
