use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::SecretStore;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Secrets {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

/// Secret store backed by a mode-0600 JSON file under the user's data
/// directory. Writes are atomic (tmp file then rename).
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    pub fn new(custom: Option<&Path>) -> Result<Self> {
        Ok(Self {
            path: resolve_secrets_path(custom)?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Secrets> {
        if !self.path.exists() {
            return Ok(Secrets::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, secrets: &Secrets) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(secrets)?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;

        // Restrict permissions to owner-only before renaming into place
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
        }

        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SecretStore for FileSecretStore {
    fn token(&self) -> Result<Option<String>> {
        Ok(self.load()?.token.filter(|t| !t.is_empty()))
    }

    fn set_token(&self, token: Option<&str>) -> Result<()> {
        let mut secrets = self.load()?;
        secrets.token = token.map(String::from).filter(|t| !t.is_empty());
        self.save(&secrets)
    }

    fn password(&self) -> Result<Option<String>> {
        Ok(self.load()?.password.filter(|p| !p.is_empty()))
    }

    fn set_password(&self, password: Option<&str>) -> Result<()> {
        let mut secrets = self.load()?;
        secrets.password = password.map(String::from).filter(|p| !p.is_empty());
        self.save(&secrets)
    }
}

fn resolve_secrets_path(custom: Option<&Path>) -> Result<PathBuf> {
    match custom {
        Some(p) => Ok(p.to_path_buf()),
        None => {
            let dir = dirs::data_dir()
                .ok_or_else(|| Error::Config("could not determine data directory".into()))?;
            Ok(dir.join("seaflink").join("secrets.json"))
        }
    }
}
