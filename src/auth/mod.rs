mod secret_file;

pub use secret_file::FileSecretStore;

use std::sync::Mutex;

use crate::error::Result;

/// Durable secret storage for one account: the opaque auth token issued by
/// the server and the user's password. Injected into the account so tests
/// and hosts can substitute their own backing (keyring, password manager).
pub trait SecretStore: Send + Sync {
    fn token(&self) -> Result<Option<String>>;
    fn set_token(&self, token: Option<&str>) -> Result<()>;
    fn password(&self) -> Result<Option<String>>;
    fn set_password(&self, password: Option<&str>) -> Result<()>;
}

/// Asks the user for a password when an interactive operation finds none
/// stored. Returning `None` means the user declined.
pub trait CredentialPrompt: Send + Sync {
    fn prompt_password(&self, username: &str, server: &str) -> Option<String>;
}

/// In-memory store for tests and hosts that manage persistence themselves.
#[derive(Default)]
pub struct MemorySecretStore {
    inner: Mutex<MemorySecrets>,
}

#[derive(Default)]
struct MemorySecrets {
    token: Option<String>,
    password: Option<String>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password(password: &str) -> Self {
        let store = Self::new();
        store
            .set_password(Some(password))
            .expect("memory store never fails");
        store
    }
}

impl SecretStore for MemorySecretStore {
    fn token(&self) -> Result<Option<String>> {
        Ok(self.inner.lock().unwrap().token.clone())
    }

    fn set_token(&self, token: Option<&str>) -> Result<()> {
        self.inner.lock().unwrap().token = token.map(String::from);
        Ok(())
    }

    fn password(&self) -> Result<Option<String>> {
        Ok(self.inner.lock().unwrap().password.clone())
    }

    fn set_password(&self, password: Option<&str>) -> Result<()> {
        self.inner.lock().unwrap().password = password.map(String::from);
        Ok(())
    }
}
