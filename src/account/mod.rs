mod folders;
mod repos;
mod session;

pub use session::{LastError, QuotaInfo, UploadInfo};

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;

use crate::api::ApiClient;
use crate::auth::{CredentialPrompt, SecretStore};
use crate::config::AccountConfig;
use crate::error::{Error, Result};
use crate::upload::QueueState;
use session::Session;

/// The public operation surface for one SeaFile filelink account. All
/// mutable runtime state lives behind this facade; hosts keep one instance
/// per configured account for the process lifetime.
#[derive(Clone)]
pub struct Account {
    pub(crate) inner: Arc<AccountInner>,
}

pub(crate) struct AccountInner {
    pub(crate) config: AccountConfig,
    pub(crate) api: ApiClient,
    pub(crate) secrets: Arc<dyn SecretStore>,
    pub(crate) prompt: Option<Arc<dyn CredentialPrompt>>,
    offline: AtomicBool,
    pub(crate) session: Mutex<Session>,
    /// Resolved remote upload folder, cached for the account lifetime.
    pub(crate) folder: Mutex<Option<String>>,
    pub(crate) queue: Mutex<QueueState>,
}

impl Account {
    /// Initialize an account from its configuration and an injected secret
    /// store. We consider ourselves logged in when a token is already
    /// stored; the server corrects us via the stale-token path if not.
    pub fn new(
        config: AccountConfig,
        secrets: Arc<dyn SecretStore>,
        prompt: Option<Arc<dyn CredentialPrompt>>,
    ) -> Result<Self> {
        let config = config.normalize()?;
        let api = ApiClient::new(&config.base_url)?;

        let mut session = Session::default();
        session.logged_in = secrets.token()?.is_some();
        tracing::debug!(
            server = %config.base_url,
            library = %config.library,
            logged_in = session.logged_in,
            "account initialized"
        );

        Ok(Self {
            inner: Arc::new(AccountInner {
                config,
                api,
                secrets,
                prompt,
                offline: AtomicBool::new(false),
                session: Mutex::new(session),
                folder: Mutex::new(None),
                queue: Mutex::new(QueueState::default()),
            }),
        })
    }

    /// Mirror of the host's global offline switch. While set, every
    /// network-bearing operation fails fast with `Error::Offline`.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.inner.offline.load(Ordering::SeqCst)
    }

    /// Log in with the stored (or prompted) password. Resolving the
    /// configured library is a postcondition: a token without a valid
    /// library binding is unusable and gets discarded.
    pub async fn logon(&self, interactive: bool) -> Result<()> {
        self.inner.check_online()?;
        self.inner.logon(interactive, true).await
    }

    /// Fetch fresh profile/quota figures, logging in first when needed.
    pub async fn refresh_user_info(&self, with_ui: bool) -> Result<QuotaInfo> {
        self.inner.check_online()?;
        if !self.inner.logged_in() {
            self.inner.logon(with_ui, true).await?;
        }
        self.inner.fetch_user_info().await
    }

    /// Delete a previously uploaded file from the library. Requires the
    /// upload record for that local path; an unknown file is a local fault
    /// and never reaches the server.
    pub async fn delete_file(&self, file: &Path) -> Result<()> {
        self.inner.check_online()?;
        tracing::debug!(file = %file.display(), "deleting remote file");

        let remote_path = {
            let session = self.inner.session.lock().unwrap();
            session.uploads.get(file).map(|u| u.remote_path.clone())
        };
        let Some(remote_path) = remote_path else {
            tracing::error!(file = %file.display(), "no upload record for file");
            return Err(Error::UnknownFile(file.to_path_buf()));
        };

        self.delete_remote_path(&remote_path).await
    }

    /// Delete a file from the library by its remote path. Used directly by
    /// hosts that track remote paths themselves, e.g. across restarts.
    pub async fn delete_remote_path(&self, remote_path: &str) -> Result<()> {
        self.inner.check_online()?;
        let repo_id = self.inner.ensure_repo_id().await?;
        let inner = &self.inner;
        let result = inner
            .with_auth_retry(|| {
                let repo_id = repo_id.clone();
                let remote_path = remote_path.to_string();
                Box::pin(async move {
                    let token = inner.token()?;
                    inner.api.delete_file(&token, &repo_id, &remote_path).await
                })
            })
            .await;
        if let Err(e) = &result {
            inner.record(e);
        }
        result
    }

    /// The sharing URL produced by a completed upload of `file`, if any.
    pub fn url_for_file(&self, file: &Path) -> Option<String> {
        let session = self.inner.session.lock().unwrap();
        session.uploads.get(file).and_then(|u| u.shared_url.clone())
    }

    pub fn upload_info(&self, file: &Path) -> Option<UploadInfo> {
        let session = self.inner.session.lock().unwrap();
        session.uploads.get(file).cloned()
    }

    pub fn last_error(&self) -> Option<LastError> {
        self.inner.session.lock().unwrap().last_error.clone()
    }

    pub fn user_info(&self) -> Option<QuotaInfo> {
        self.inner.session.lock().unwrap().user_info.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.inner.logged_in()
    }

    /// Bytes used on the account, or -1 before any user-info fetch.
    pub fn space_used(&self) -> i64 {
        self.user_info().map(|q| q.usage).unwrap_or(-1)
    }

    /// Bytes left on the account, or -1 when unknown or unlimited.
    pub fn remaining_space(&self) -> i64 {
        self.user_info().map(|q| q.remaining()).unwrap_or(-1)
    }

    pub fn get_password(&self) -> Result<Option<String>> {
        self.inner.secrets.password()
    }

    pub fn clear_password(&self) -> Result<()> {
        self.inner.secrets.set_password(None)
    }

    /// Account self-registration is not offered by this provider.
    pub fn create_new_account(&self) -> Result<()> {
        Err(Error::NotImplemented)
    }

    pub fn config(&self) -> &AccountConfig {
        &self.inner.config
    }
}

impl AccountInner {
    pub(crate) fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            tracing::error!("operation refused: account is offline");
            return Err(Error::Offline);
        }
        Ok(())
    }

    pub(crate) fn logged_in(&self) -> bool {
        self.session.lock().unwrap().logged_in
    }

    /// Current token, empty string when none stored. Authenticated calls
    /// read it per attempt so a mid-flight re-login is picked up.
    pub(crate) fn token(&self) -> Result<String> {
        Ok(self.secrets.token()?.unwrap_or_default())
    }

    pub(crate) fn record(&self, err: &Error) {
        if let Error::Api { status, text } = err {
            self.session.lock().unwrap().record_error(*status, text);
        }
    }

    /// Run an authenticated operation, recovering once from a stale token:
    /// clear the token, silently re-login with the stored password, and
    /// re-issue. Every authenticated call shares this path so concurrent
    /// components never race their own re-logins.
    pub(crate) async fn with_auth_retry<'a, T>(
        &'a self,
        op: impl Fn() -> BoxFuture<'a, Result<T>>,
    ) -> Result<T> {
        match op().await {
            Err(Error::InvalidToken) => {
                tracing::debug!("token went stale, attempting silent re-login");
                self.handle_stale_token().await?;
                match op().await {
                    Err(Error::InvalidToken) => {
                        Err(Error::Auth("token rejected after re-authentication".into()))
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    async fn handle_stale_token(&self) -> Result<()> {
        self.session.lock().unwrap().logged_in = false;
        self.secrets.set_token(None)?;

        if self.secrets.password()?.is_some() {
            tracing::debug!("re-authenticating with saved password");
            // The retried call resolves its own library binding; skip the
            // logon postcondition to keep recovery a single round trip.
            // Boxed: recovery is reachable from within logon itself, so the
            // future type would otherwise be infinitely sized.
            Box::pin(self.logon(false, false)).await
        } else {
            tracing::debug!("no saved password, cannot refresh the token silently");
            Err(Error::Auth("stale token and no stored password".into()))
        }
    }

    /// Exchange credentials for a token. `resolve_library` enables the
    /// login postcondition (binding the configured library).
    pub(crate) async fn logon(&self, interactive: bool, resolve_library: bool) -> Result<()> {
        tracing::debug!(interactive, "logging in");

        let password = match self.secrets.password()? {
            Some(p) => p,
            None if interactive => match self.prompt_password()? {
                Some(p) => p,
                None => return Err(Error::Auth("no password provided".into())),
            },
            None => {
                // Non-interactive with nothing stored: fail without ever
                // contacting the server.
                return Err(Error::Auth("no stored password".into()));
            }
        };

        match self.api.auth_token(&self.config.username, &password).await {
            Ok(token) => {
                self.secrets.set_token(Some(&token))?;
                self.session.lock().unwrap().logged_in = true;
                tracing::debug!("auth token obtained");

                if resolve_library {
                    if let Err(e) = self.ensure_repo_id().await {
                        // A token without a resolvable library is unusable.
                        // The resolver already recorded the specific cause
                        // (missing library, listing failure, name mismatch)
                        // in last-error; don't paper over it here.
                        self.secrets.set_token(None)?;
                        self.secrets.set_password(None)?;
                        self.session.lock().unwrap().logged_in = false;
                        tracing::error!(error = %e, "login postcondition failed");
                        return Err(Error::Auth(e.to_string()));
                    }
                }
                Ok(())
            }
            Err(Error::Api { status, text }) => {
                self.secrets.set_password(None)?;
                self.session.lock().unwrap().record_error(status, &text);
                tracing::error!(status, "login failed: {text}");
                Err(Error::Auth(text))
            }
            Err(Error::Auth(text)) => {
                // 2xx response without a token in it.
                self.secrets.set_password(None)?;
                self.session.lock().unwrap().record_error(0, &text);
                Err(Error::Auth(text))
            }
            Err(other) => Err(other),
        }
    }

    fn prompt_password(&self) -> Result<Option<String>> {
        let Some(prompt) = &self.prompt else {
            return Ok(None);
        };
        match prompt.prompt_password(&self.config.username, &self.config.base_url) {
            Some(password) if !password.is_empty() => {
                self.secrets.set_password(Some(&password))?;
                Ok(Some(password))
            }
            _ => Ok(None),
        }
    }

    /// Fetch profile/quota and cache it. Resolves the library id first:
    /// user info is only meaningful for an account with a valid binding.
    pub(crate) async fn fetch_user_info(&self) -> Result<QuotaInfo> {
        self.ensure_repo_id().await?;
        tracing::debug!("fetching user info");

        let info = self
            .with_auth_retry(|| {
                Box::pin(async move {
                    let token = self.token()?;
                    self.api.account_info(&token).await
                })
            })
            .await;

        match info {
            Ok(info) => {
                let quota = QuotaInfo {
                    email: info.email,
                    usage: info.usage,
                    total: info.total,
                };
                tracing::debug!(usage = quota.usage, total = quota.total, "user info cached");
                self.session.lock().unwrap().user_info = Some(quota.clone());
                Ok(quota)
            }
            Err(e) => {
                self.record(&e);
                Err(e)
            }
        }
    }
}
