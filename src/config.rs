use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fork::ForkPolicy;
use crate::repository::CloneProtocol;

/// Main configuration structure for klone
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Root directory checkouts are placed under
    pub workspace_root: String,

    /// GitHub authentication settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Clone behavior settings
    #[serde(default)]
    pub clone: CloneConfig,

    /// Fork availability polling
    #[serde(default)]
    pub fork: ForkConfig,

    /// Remote synchronization settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Per-language workspace conventions
    #[serde(default)]
    pub languages: LanguagesConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitHubConfig {
    /// Authentication method
    #[serde(default = "default_auth_method")]
    pub auth_method: String, // "auto", "gh_cli", "token"

    /// Acting username (auto-detected if null)
    pub username: Option<String>,

    /// Host name used in clone paths
    #[serde(default = "default_host")]
    pub host: String,
}

/// Clone configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CloneConfig {
    /// Preferred clone protocol
    #[serde(default)]
    pub protocol: CloneProtocol,

    /// Clone submodules recursively
    #[serde(default = "default_true")]
    pub recurse_submodules: bool,
}

/// Fork polling configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ForkConfig {
    /// Seconds between availability checks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Availability checks before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Synchronization configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Timeout for a whole klone run in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Fast-forward only pulls
    #[serde(default = "default_true")]
    pub fast_forward_only: bool,

    /// Remove remotes klone does not manage
    #[serde(default = "default_true")]
    pub prune_remotes: bool,
}

/// Language workspace configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct LanguagesConfig {
    #[serde(default)]
    pub go: GoConfig,
}

/// Go workspace configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct GoConfig {
    /// Overrides $GOPATH when set
    pub gopath: Option<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"
}

// Default value functions
fn default_auth_method() -> String {
    "auto".to_string()
}
fn default_host() -> String {
    "github.com".to_string()
}
fn default_true() -> bool {
    true
}
fn default_poll_interval() -> u64 {
    1
}
fn default_max_attempts() -> u32 {
    20
}
fn default_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}

// Default implementations
impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            auth_method: default_auth_method(),
            username: None,
            host: default_host(),
        }
    }
}

impl Default for CloneConfig {
    fn default() -> Self {
        Self {
            protocol: CloneProtocol::default(),
            recurse_submodules: default_true(),
        }
    }
}

impl Default for ForkConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            fast_forward_only: default_true(),
            prune_remotes: default_true(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default location or create a default config
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            let mut config = Self::default();

            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }

            config.save(&config_path)?;
            tracing::info!("Created default configuration at: {:?}", config_path);

            config.expand_paths()?;
            Ok(config)
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        // Expand environment variables in paths
        config.expand_paths()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("klone").join("config.yml"))
    }

    /// Expand environment variables in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.workspace_root = shellexpand::full(&self.workspace_root)
            .context("Failed to expand workspace_root path")?
            .into_owned();

        if let Some(gopath) = &self.languages.go.gopath {
            self.languages.go.gopath = Some(
                shellexpand::full(gopath)
                    .context("Failed to expand languages.go.gopath")?
                    .into_owned(),
            );
        }

        Ok(())
    }

    /// Fork polling policy
    pub fn fork_policy(&self) -> ForkPolicy {
        ForkPolicy {
            interval: Duration::from_secs(self.fork.poll_interval_secs),
            max_attempts: self.fork.max_attempts,
        }
    }

    /// Overall timeout for a klone run
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_root: "${HOME}/src".to_string(),
            github: GitHubConfig::default(),
            clone: CloneConfig::default(),
            fork: ForkConfig::default(),
            sync: SyncConfig::default(),
            languages: LanguagesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
