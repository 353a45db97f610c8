//! GitHub integration
//!
//! Authentication detection and the octocrab-backed [`RepositoryDirectory`].
//! API failures are mapped onto [`DirectoryError`] so the klone core can tell a
//! missing repository or a still-scheduled fork from a real failure.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use octocrab::models;
use octocrab::Octocrab;
use std::env;
use std::process::Command;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::directory::RepositoryDirectory;
use crate::error::DirectoryError;
use crate::repository::Repository;

/// Environment variables checked for a token, in order
const TOKEN_VARIABLES: &[&str] = &["KLONE_GITHUBTOKEN", "GITHUB_TOKEN"];

/// GitHub-backed repository directory
pub struct GitHubClient {
    client: Octocrab,
    username: String,
    host: String,
}

/// GitHub authentication strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStrategy {
    /// Use GitHub CLI authentication
    GitHubCLI,
    /// Use a token from the named environment variable
    EnvironmentToken(&'static str),
}

impl GitHubClient {
    /// Create a new GitHub client with automatic authentication
    pub async fn new(config: &Config) -> Result<Self> {
        let (auth_strategy, token) = Self::detect_authentication(config)?;

        info!("Using authentication strategy: {:?}", auth_strategy);

        let mut builder = Octocrab::builder().personal_token(token);
        if config.github.host != "github.com" {
            let api = format!("https://{}/api/v3", config.github.host);
            builder = builder
                .base_uri(api.as_str())
                .with_context(|| format!("Invalid GitHub API address: {}", api))?;
        }
        let client = builder.build().context("Failed to create GitHub client")?;

        let username = match &config.github.username {
            Some(username) => username.clone(),
            None => {
                client
                    .current()
                    .user()
                    .await
                    .context("Failed to get current user information. Check your authentication.")?
                    .login
            }
        };

        info!("Authenticated as GitHub user: {}", username);

        Ok(Self::with_octocrab(client, username, &config.github.host))
    }

    /// Wrap an already configured octocrab client
    pub fn with_octocrab(client: Octocrab, username: impl Into<String>, host: &str) -> Self {
        Self {
            client,
            username: username.into(),
            host: host.to_string(),
        }
    }

    /// Detect and obtain GitHub authentication
    pub fn detect_authentication(config: &Config) -> Result<(AuthStrategy, String)> {
        match config.github.auth_method.as_str() {
            "auto" => {
                if let Ok(token) = Self::try_github_cli() {
                    Ok((AuthStrategy::GitHubCLI, token))
                } else if let Ok((variable, token)) = Self::try_environment_token() {
                    Ok((AuthStrategy::EnvironmentToken(variable), token))
                } else {
                    Err(anyhow!(
                        "No GitHub authentication found. Please either:\n\
                         1. Install and authenticate GitHub CLI: gh auth login\n\
                         2. Set KLONE_GITHUBTOKEN or GITHUB_TOKEN"
                    ))
                }
            }
            "gh_cli" => {
                let token = Self::try_github_cli()
                    .context("GitHub CLI authentication failed. Run: gh auth login")?;
                Ok((AuthStrategy::GitHubCLI, token))
            }
            "token" => {
                let (variable, token) = Self::try_environment_token()
                    .context("Neither KLONE_GITHUBTOKEN nor GITHUB_TOKEN is set")?;
                Ok((AuthStrategy::EnvironmentToken(variable), token))
            }
            other => Err(anyhow!("Unknown auth method: {}", other)),
        }
    }

    /// Try to get token from GitHub CLI
    fn try_github_cli() -> Result<String> {
        debug!("Attempting GitHub CLI authentication");

        if !is_command_available("gh") {
            return Err(anyhow!("GitHub CLI (gh) is not installed"));
        }

        let output = Command::new("gh")
            .args(["auth", "token"])
            .output()
            .context("Failed to get GitHub CLI token")?;

        if !output.status.success() {
            return Err(anyhow!(
                "GitHub CLI is not authenticated: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        let token = String::from_utf8(output.stdout)
            .context("GitHub CLI token is not valid UTF-8")?
            .trim()
            .to_string();

        if token.is_empty() {
            return Err(anyhow!("GitHub CLI returned empty token"));
        }

        debug!("Successfully obtained token from GitHub CLI");
        Ok(token)
    }

    /// First non-empty token among [`TOKEN_VARIABLES`]
    fn try_environment_token() -> Result<(&'static str, String)> {
        debug!("Attempting environment variable authentication");

        for variable in TOKEN_VARIABLES {
            match env::var(variable) {
                Ok(token) if !token.trim().is_empty() => {
                    if !["ghp_", "gho_", "ghs_", "github_pat_"]
                        .iter()
                        .any(|prefix| token.starts_with(prefix))
                    {
                        warn!("{} doesn't look like a GitHub token", variable);
                    }
                    debug!("Using token from {}", variable);
                    return Ok((*variable, token.trim().to_string()));
                }
                _ => continue,
            }
        }

        Err(anyhow!("No token environment variable set"))
    }

    /// Get the authenticated username
    pub fn username(&self) -> &str {
        &self.username
    }
}

/// Check if a command is available in PATH
fn is_command_available(command: &str) -> bool {
    Command::new("which")
        .arg(command)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Map an octocrab failure for `owner/name` onto the directory taxonomy
fn directory_error(error: octocrab::Error, owner: &str, name: &str) -> DirectoryError {
    if let octocrab::Error::GitHub { source, .. } = &error {
        match source.status_code.as_u16() {
            404 => return DirectoryError::not_found(owner, name),
            422 if source.message.contains("already exists") => {
                return DirectoryError::AlreadyExists {
                    owner: owner.to_string(),
                    name: name.to_string(),
                }
            }
            _ => {}
        }
    }

    let context = format!("GitHub request for {}/{} failed", owner, name);
    DirectoryError::Api(anyhow::Error::new(error).context(context))
}

/// Convert an API repository into klone's view of it.
///
/// The owner comes from `owner.login`, then the `full_name` prefix, then
/// `fallback_owner`.
fn to_repository(host: &str, repo: models::Repository, fallback_owner: &str) -> Repository {
    let owner = repo
        .owner
        .as_ref()
        .map(|o| o.login.clone())
        .or_else(|| {
            repo.full_name
                .as_deref()
                .and_then(|full| full.split_once('/'))
                .map(|(owner, _)| owner.to_string())
        })
        .unwrap_or_else(|| fallback_owner.to_string());

    let language = match &repo.language {
        Some(serde_json::Value::String(language)) => language.clone(),
        _ => String::new(),
    };

    let parent = repo.parent.map(|parent| {
        let parent_owner = parent
            .full_name
            .as_deref()
            .and_then(|full| full.split_once('/'))
            .map(|(owner, _)| owner.to_string())
            .unwrap_or_default();
        Box::new(to_repository(host, *parent, &parent_owner))
    });

    let mut converted = Repository::new(host, &owner, &repo.name).with_language(&language);
    if let Some(ssh_url) = repo.ssh_url {
        converted.ssh_url = Some(ssh_url);
    }
    if let Some(clone_url) = repo.clone_url {
        converted.https_url = Some(clone_url.to_string());
    }
    converted.fork_parent = parent;
    converted
}

#[async_trait]
impl RepositoryDirectory for GitHubClient {
    fn acting_user(&self) -> &str {
        &self.username
    }

    async fn get_repository(&self, owner: &str, name: &str) -> Result<Repository, DirectoryError> {
        debug!("Fetching repository {}/{}", owner, name);

        let repo = self
            .client
            .repos(owner, name)
            .get()
            .await
            .map_err(|e| directory_error(e, owner, name))?;

        Ok(to_repository(&self.host, repo, owner))
    }

    async fn create_fork(
        &self,
        repo: &Repository,
        new_owner: &str,
    ) -> Result<Repository, DirectoryError> {
        let handler = self.client.repos(&repo.owner, &repo.name);
        let mut request = handler.create_fork();
        if new_owner != self.username {
            debug!("Requesting fork into organization {}", new_owner);
            request = request.organization(new_owner);
        }

        // A name clash is reported against the fork, not the source
        let created = request.send().await.map_err(|e| {
            match directory_error(e, &repo.owner, &repo.name) {
                DirectoryError::AlreadyExists { name, .. } => DirectoryError::AlreadyExists {
                    owner: new_owner.to_string(),
                    name,
                },
                other => other,
            }
        })?;
        let created = to_repository(&self.host, created, new_owner);

        // The host answers before the fork is readable
        match self.get_repository(&created.owner, &created.name).await {
            Ok(fork) => Ok(fork),
            Err(DirectoryError::NotFound { owner, name }) => {
                Err(DirectoryError::ForkScheduled { owner, name })
            }
            Err(e) => Err(e),
        }
    }
}
