use super::AccountInner;
use crate::error::{Error, Result};

/// Description attached to a library we create on demand.
const LIBRARY_DESC: &str = "Mail attachments uploaded by seaflink";

impl AccountInner {
    /// Resolve the configured library to its id, lazily and cached.
    /// No-op when cached; otherwise the first exact name match from the
    /// server listing wins, with optional on-demand creation.
    pub(crate) async fn ensure_repo_id(&self) -> Result<String> {
        if let Some(id) = self.session.lock().unwrap().repo_id.clone() {
            return Ok(id);
        }

        let library = self.config.library.as_str();
        tracing::debug!(library, "resolving library id");

        let repos = self
            .with_auth_retry(|| {
                Box::pin(async move {
                    let token = self.token()?;
                    self.api.list_repos(&token).await
                })
            })
            .await
            .inspect_err(|e| self.record(e))?;

        if let Some(repo) = repos.iter().find(|r| r.name == library) {
            tracing::debug!(library, id = %repo.id, "library found");
            self.session.lock().unwrap().repo_id = Some(repo.id.clone());
            return Ok(repo.id.clone());
        }

        if !self.config.library_create {
            let msg = format!("can't find library: {library}");
            tracing::error!("{msg}");
            self.session.lock().unwrap().record_error(404, &msg);
            return Err(Error::NotFound(msg));
        }

        self.create_repo().await
    }

    /// Create the configured library. The returned id is adopted only when
    /// the server echoes back the exact requested name and a non-empty id;
    /// anything else is treated as a silent collision or partial failure.
    async fn create_repo(&self) -> Result<String> {
        let library = self.config.library.as_str();
        tracing::debug!(library, "creating library");

        let created = self
            .with_auth_retry(|| {
                Box::pin(async move {
                    let token = self.token()?;
                    self.api.create_repo(&token, library, LIBRARY_DESC).await
                })
            })
            .await
            .inspect_err(|e| self.record(e))?;

        if created.repo_name != library || created.repo_id.is_empty() {
            let msg = format!(
                "can't create library. Expected name: [{library}], got: [{}], [{}]",
                created.repo_name, created.repo_id
            );
            tracing::error!("{msg}");
            self.session.lock().unwrap().record_error(500, &msg);
            return Err(Error::NotFound(msg));
        }

        tracing::debug!(library, id = %created.repo_id, "library created");
        self.session.lock().unwrap().repo_id = Some(created.repo_id.clone());
        Ok(created.repo_id)
    }
}
