use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkiffError};

/// Client configuration loaded from `~/.config/skiff/config.yaml`.
///
/// The file is optional; every field has a sensible default so first runs
/// work without any setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default login name when the destination carries none.
    #[serde(default = "default_login")]
    pub login: String,

    /// Private key presented during public-key authentication.
    #[serde(default = "default_identity")]
    pub identity_file: String,

    /// Prompt for a password when key-based methods are exhausted.
    #[serde(default = "default_true")]
    pub password_fallback: bool,
}

fn default_login() -> String {
    std::env::var("USER").unwrap_or_else(|_| "root".to_string())
}

fn default_identity() -> String {
    shellexpand::tilde("~/.ssh/id_ed25519").to_string()
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            login: default_login(),
            identity_file: default_identity(),
            password_fallback: true,
        }
    }
}

impl AppConfig {
    pub fn config_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| SkiffError::Config("HOME environment variable not set".to_string()))?;
        Ok(PathBuf::from(home).join(".config").join("skiff"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.yaml"))
    }

    /// Shell command history, rewritten at session end (best-effort).
    pub fn history_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("history"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: AppConfig = serde_yaml::from_str(&content)
            .map_err(|e| SkiffError::Config(format!("Invalid config: {}", e)))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_has_identity() {
        let config = AppConfig::default();
        assert!(config.identity_file.ends_with("id_ed25519"));
        assert!(config.password_fallback);
    }
}
