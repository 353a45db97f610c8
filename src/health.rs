//! Preflight checks for `klone doctor`
//!
//! Each check reports a [`Status`]; only errors make the run unhealthy.

use std::fmt;
use std::path::Path;
use std::process::Command;

use crate::config::Config;
use crate::github::GitHubClient;
use crate::path::gopath;
use crate::repository::CloneProtocol;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    /// Works, but something may go wrong later
    Warning,
    Error,
}

/// Outcome of one check
#[derive(Debug, Clone)]
pub struct Check {
    pub name: &'static str,
    pub status: Status,
    pub message: String,
    pub details: Option<String>,
}

impl Check {
    fn new(name: &'static str, status: Status, message: impl Into<String>) -> Self {
        Self {
            name,
            status,
            message: message.into(),
            details: None,
        }
    }

    fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.status {
            Status::Ok => "ok",
            Status::Warning => "warn",
            Status::Error => "FAIL",
        };
        write!(f, "[{:>4}] {}: {}", marker, self.name, self.message)?;
        if let Some(details) = &self.details {
            for line in details.lines() {
                write!(f, "\n       {}", line)?;
            }
        }
        Ok(())
    }
}

/// Results of all preflight checks
#[derive(Debug, Clone)]
pub struct HealthReport {
    pub checks: Vec<Check>,
}

impl HealthReport {
    /// Run all checks against `config`
    pub async fn run(config: &Config) -> Self {
        Self {
            checks: vec![
                check_git(),
                check_github_auth(config).await,
                check_workspace_root(Path::new(&config.workspace_root)),
                check_gopath(config.languages.go.gopath.as_deref()),
                check_ssh(config.clone.protocol),
            ],
        }
    }

    /// No check reported an error
    pub fn healthy(&self) -> bool {
        !self.checks.iter().any(|c| c.status == Status::Error)
    }

    pub fn with_status(&self, status: Status) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(move |c| c.status == status)
    }
}

fn check_git() -> Check {
    match Command::new("git").arg("--version").output() {
        Ok(output) if output.status.success() => Check::new("Git", Status::Ok, "installed")
            .details(String::from_utf8_lossy(&output.stdout).trim()),
        Ok(output) => Check::new("Git", Status::Error, "git --version failed")
            .details(String::from_utf8_lossy(&output.stderr).trim()),
        Err(_) => Check::new("Git", Status::Error, "git not found in PATH")
            .details("Install git: https://git-scm.com/downloads"),
    }
}

async fn check_github_auth(config: &Config) -> Check {
    match GitHubClient::new(config).await {
        Ok(client) => Check::new(
            "GitHub authentication",
            Status::Ok,
            format!("acting as {}", client.username()),
        ),
        Err(e) => Check::new("GitHub authentication", Status::Error, "failed")
            .details(format!("{:#}\nRun: gh auth login, or set KLONE_GITHUBTOKEN", e)),
    }
}

fn check_workspace_root(root: &Path) -> Check {
    const NAME: &str = "Workspace root";

    if !root.exists() {
        return Check::new(NAME, Status::Warning, format!("{} does not exist", root.display()))
            .details("It will be created on the first klone");
    }
    if !root.is_dir() {
        return Check::new(NAME, Status::Error, format!("{} is not a directory", root.display()));
    }

    match std::fs::metadata(root) {
        Ok(meta) if meta.permissions().readonly() => {
            Check::new(NAME, Status::Error, format!("{} is read-only", root.display()))
        }
        Ok(_) => Check::new(NAME, Status::Ok, root.display().to_string()),
        Err(e) => Check::new(NAME, Status::Error, format!("{} is not readable", root.display()))
            .details(e.to_string()),
    }
}

fn check_gopath(configured: Option<&str>) -> Check {
    let src = gopath(configured).join("src");
    let status = if src.is_dir() {
        Status::Ok
    } else {
        Status::Warning
    };
    Check::new("Go workspace", status, src.display().to_string())
}

fn check_ssh(protocol: CloneProtocol) -> Check {
    const NAME: &str = "SSH keys";

    if protocol == CloneProtocol::Https {
        return Check::new(NAME, Status::Ok, "not needed for HTTPS clones");
    }

    let ssh_dir = dirs::home_dir().unwrap_or_default().join(".ssh");
    let found: Vec<&str> = ["id_ed25519", "id_ecdsa", "id_rsa"]
        .into_iter()
        .filter(|key| ssh_dir.join(key).exists())
        .collect();

    if found.is_empty() {
        Check::new(NAME, Status::Warning, "no SSH key found")
            .details("SSH clones may fail. Run: ssh-keygen -t ed25519, or set clone.protocol: https")
    } else {
        Check::new(NAME, Status::Ok, found.join(", "))
    }
}
