//! Configuration loading and management
//!
//! Handles parsing of `taskzen.toml` configuration files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable overriding the data directory (session + local store)
pub const DATA_DIR_ENV: &str = "TASKZEN_DATA_DIR";

/// Environment variable holding a pre-issued federated sign-in token
pub const TOKEN_ENV: &str = "TASKZEN_TOKEN";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Auth configuration
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

/// Backend-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend mode: "local" or "remote"
    #[serde(default = "default_backend_mode")]
    pub mode: String,

    /// Remote project identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Remote API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_backend_mode() -> String {
    "local".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            mode: default_backend_mode(),
            project: None,
            api_key: None,
        }
    }
}

impl BackendConfig {
    /// Whether remote mode is requested and fully configured.
    ///
    /// Remote mode with missing pieces degrades to the local fallback
    /// instead of blocking startup.
    pub fn remote_configured(&self) -> bool {
        self.mode == "remote"
            && self.project.as_deref().map_or(false, |p| !p.is_empty())
            && self.api_key.as_deref().map_or(false, |k| !k.is_empty())
    }
}

/// Auth-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Default sign-in method: "federated" or "anonymous"
    #[serde(default = "default_auth_method")]
    pub default_method: String,

    /// Pre-issued federated token (TASKZEN_TOKEN overrides this)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

fn default_auth_method() -> String {
    "federated".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            default_method: default_auth_method(),
            token: None,
        }
    }
}

impl Config {
    /// Load configuration from a `taskzen.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, the default location, or defaults.
    ///
    /// A missing file yields defaults; a present but invalid file is a
    /// configuration error the user has to fix.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_file() {
                Some(path) => path,
                None => return Ok(Self::default()),
            },
        };
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        match self.backend.mode.as_str() {
            "local" | "remote" => {}
            other => {
                return Err(Error::InvalidConfig(format!(
                    "backend.mode: invalid mode '{other}' (expected local|remote)"
                )));
            }
        }
        match self.auth.default_method.as_str() {
            "federated" | "anonymous" => Ok(()),
            other => Err(Error::InvalidConfig(format!(
                "auth.default_method: invalid method '{other}' (expected federated|anonymous)"
            ))),
        }
    }

    /// Resolve the federated token from the environment or the config file.
    pub fn federated_token(&self) -> Option<String> {
        std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| self.auth.token.clone())
    }
}

/// Default config file location (`<config dir>/taskzen.toml`)
pub fn default_config_file() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "taskzen")
        .map(|dirs| dirs.config_dir().join("taskzen.toml"))
}

/// Data directory for the session file and the local fallback store.
///
/// `TASKZEN_DATA_DIR` overrides the platform default, which keeps tests
/// and scripted runs hermetic.
pub fn data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    directories::ProjectDirs::from("", "", "taskzen")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| Error::InvalidConfig("could not determine a data directory".to_string()))
}
