use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub account: AccountConfig,
    #[serde(default)]
    pub general: GeneralConfig,
}

/// Per-account connection settings. `base_url` is always normalized to end
/// with a trailing slash so endpoint paths can be appended directly.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    pub base_url: String,
    pub username: String,
    /// Name of the SeaFile library that receives the attachments.
    pub library: String,
    /// Create the library on the server when it doesn't exist.
    #[serde(default)]
    pub library_create: bool,
    /// Sharing-link expiry shown by management surfaces. Not consumed by
    /// any upload operation.
    #[serde(default)]
    pub expiry_days: Option<u32>,
    /// Custom path for the secrets file (token + password).
    #[serde(default)]
    pub secrets_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

impl AccountConfig {
    /// Normalize and validate. Called by `load_config` and by hosts that
    /// build the config programmatically.
    pub fn normalize(mut self) -> Result<Self> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("account.base_url must not be empty".into()));
        }
        if self.username.trim().is_empty() {
            return Err(Error::Config("account.username must not be empty".into()));
        }
        if self.library.trim().is_empty() {
            return Err(Error::Config("account.library must not be empty".into()));
        }
        if !self.base_url.ends_with('/') {
            self.base_url.push('/');
        }
        Ok(self)
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir()
        .ok_or_else(|| Error::Config("could not determine config directory".into()))?;
    Ok(dir.join("seaflink").join("config.toml"))
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    let content = std::fs::read_to_string(&path).map_err(|e| {
        Error::Config(format!(
            "failed to read config file {}: {e}\n\
             Create it with your SeaFile server URL and account.\n\
             See config/seaflink.example.toml for an example.",
            path.display()
        ))
    })?;

    let mut config: Config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;

    config.account = config.account.normalize()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> AccountConfig {
        AccountConfig {
            base_url: "https://seafile.example.com".into(),
            username: "user@example.com".into(),
            library: "Attachments".into(),
            library_create: false,
            expiry_days: None,
            secrets_path: None,
        }
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let cfg = base().normalize().unwrap();
        assert_eq!(cfg.base_url, "https://seafile.example.com/");
    }

    #[test]
    fn base_url_with_slash_unchanged() {
        let mut cfg = base();
        cfg.base_url = "https://seafile.example.com/".into();
        let cfg = cfg.normalize().unwrap();
        assert_eq!(cfg.base_url, "https://seafile.example.com/");
    }

    #[test]
    fn empty_fields_rejected() {
        let mut cfg = base();
        cfg.library = "  ".into();
        assert!(cfg.normalize().is_err());
    }

    #[test]
    fn parses_minimal_toml() {
        let config: Config = toml::from_str(
            r#"
            [account]
            base_url = "https://sf.example.org"
            username = "me"
            library = "Mail"
            "#,
        )
        .unwrap();
        assert!(!config.account.library_create);
        assert_eq!(config.general.log_level, "info");
    }
}
