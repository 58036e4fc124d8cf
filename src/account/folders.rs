use super::AccountInner;
use crate::error::{Error, Result};

/// Fixed two-level folder chain receiving all uploads: `/apps/seaflink`.
const FOLDER_CHAIN: [&str; 2] = ["apps", "seaflink"];

impl AccountInner {
    /// Resolve (find-then-create) the upload folder chain and cache the
    /// full path for the account lifetime.
    pub(crate) async fn ensure_folder(&self) -> Result<String> {
        if let Some(path) = self.folder.lock().unwrap().clone() {
            return Ok(path);
        }

        let repo_id = self.ensure_repo_id().await?;
        let mut parent = String::from("/");
        for name in FOLDER_CHAIN {
            parent = self.find_or_create_folder(&repo_id, name, &parent).await?;
        }

        tracing::debug!(folder = %parent, "upload folder resolved");
        *self.folder.lock().unwrap() = Some(parent.clone());
        Ok(parent)
    }

    /// Locate a child directory of `parent` named `name`, creating it when
    /// absent. A same-named non-directory entry is a fatal naming conflict
    /// reported explicitly rather than silently stalling the upload.
    async fn find_or_create_folder(
        &self,
        repo_id: &str,
        name: &str,
        parent: &str,
    ) -> Result<String> {
        tracing::debug!(name, parent, "resolving folder");

        let entries = self
            .with_auth_retry(|| {
                let repo_id = repo_id.to_string();
                let parent = parent.to_string();
                Box::pin(async move {
                    let token = self.token()?;
                    self.api.list_dir(&token, &repo_id, &parent).await
                })
            })
            .await
            .inspect_err(|e| self.record(e))?;

        let full = join_path(parent, name);

        if let Some(entry) = entries.iter().find(|e| e.name == name) {
            if entry.is_dir() {
                tracing::debug!(folder = %full, "folder found");
                return Ok(full);
            }
            let msg = format!("{name} exists in {parent} but is not a directory");
            tracing::error!("{msg}");
            self.session.lock().unwrap().record_error(500, &msg);
            return Err(Error::Upload(msg));
        }

        tracing::debug!(folder = %full, "folder missing, creating");
        self.with_auth_retry(|| {
            let repo_id = repo_id.to_string();
            let full = full.clone();
            Box::pin(async move {
                let token = self.token()?;
                self.api.mkdir(&token, &repo_id, &full).await
            })
        })
        .await
        .inspect_err(|e| self.record(e))?;

        Ok(full)
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{parent}{name}")
    } else {
        format!("{parent}/{name}")
    }
}
