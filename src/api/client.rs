use std::path::Path;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, LOCATION};
use reqwest::Response;
use serde::Deserialize;
use url::Url;

use super::types::{AccountInfo, CreatedRepo, DirEntry, Repo};
use crate::error::{Error, Result};

/// Server-reported detail that marks a cached token as stale.
const INVALID_TOKEN_DETAIL: &str = "Invalid token";

/// Error bodies are JSON with a `detail` field.
#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Thin typed client for the SeaFile web API (api2). One method per
/// endpoint; the caller owns token lifecycle and retry decisions.
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    /// `base_url` must be normalized to end with `/` (config invariant).
    pub fn new(base_url: &str) -> Result<Self> {
        Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid base URL {base_url}: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self::with_http(http, base_url)
    }

    pub fn with_http(http: reqwest::Client, base_url: &str) -> Result<Self> {
        Ok(Self {
            http,
            base: base_url.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// `POST api2/auth-token/` — exchange credentials for a token.
    pub async fn auth_token(&self, username: &str, password: &str) -> Result<String> {
        let resp = self
            .http
            .post(self.url("api2/auth-token/"))
            .header(ACCEPT, "application/json")
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        #[derive(Deserialize)]
        struct AuthResponse {
            #[serde(default)]
            token: Option<String>,
        }

        let resp = check(resp).await?;
        let auth: AuthResponse = resp.json().await?;
        match auth.token.filter(|t| !t.is_empty()) {
            Some(token) => Ok(token),
            None => Err(Error::Auth("server returned no token".into())),
        }
    }

    /// `GET api2/account/info/` — profile and quota.
    pub async fn account_info(&self, token: &str) -> Result<AccountInfo> {
        let resp = self
            .get(self.url("api2/account/info/"), token)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// `GET api2/repos/` — all libraries visible to the account.
    pub async fn list_repos(&self, token: &str) -> Result<Vec<Repo>> {
        let resp = self.get(self.url("api2/repos/"), token).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    /// `POST api2/repos/` — create a library.
    pub async fn create_repo(&self, token: &str, name: &str, desc: &str) -> Result<CreatedRepo> {
        let resp = self
            .http
            .post(self.url("api2/repos/"))
            .header(AUTHORIZATION, auth_header(token))
            .header(ACCEPT, "application/json")
            .form(&[("name", name), ("desc", desc)])
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// `GET api2/repos/<id>/dir/?p=<path>` — one level of directory entries.
    pub async fn list_dir(&self, token: &str, repo_id: &str, path: &str) -> Result<Vec<DirEntry>> {
        let resp = self
            .get(self.url(&format!("api2/repos/{repo_id}/dir/")), token)
            .query(&[("p", path)])
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// `POST api2/repos/<id>/dir/?p=<path>` with `operation=mkdir`.
    pub async fn mkdir(&self, token: &str, repo_id: &str, path: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.url(&format!("api2/repos/{repo_id}/dir/")))
            .query(&[("p", path)])
            .header(AUTHORIZATION, auth_header(token))
            .header(ACCEPT, "application/json")
            .form(&[("operation", "mkdir")])
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    /// `GET api2/repos/<id>/upload-link/` — one-time upload URL, returned
    /// by the server as a bare JSON string.
    pub async fn upload_link(&self, token: &str, repo_id: &str) -> Result<String> {
        let resp = self
            .get(self.url(&format!("api2/repos/{repo_id}/upload-link/")), token)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    /// POST the file to a previously acquired upload link as a multipart
    /// body: a `parent_dir` field and a `file` field streaming the bytes.
    /// The handle closes on every exit path, including cancellation.
    pub async fn upload(
        &self,
        token: &str,
        upload_url: &str,
        parent_dir: &str,
        remote_name: &str,
        file: &Path,
    ) -> Result<()> {
        let handle = tokio::fs::File::open(file).await?;
        let len = handle.metadata().await?.len();
        let stream = tokio_util::io::ReaderStream::new(handle);
        let part = reqwest::multipart::Part::stream_with_length(
            reqwest::Body::wrap_stream(stream),
            len,
        )
        .file_name(remote_name.to_string())
        .mime_str("application/octet-stream")?;

        let form = reqwest::multipart::Form::new()
            .text("parent_dir", parent_dir.to_string())
            .part("file", part);

        let resp = self
            .http
            .post(upload_url)
            .header(AUTHORIZATION, auth_header(token))
            .multipart(form)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    /// `PUT api2/repos/<id>/file/shared-link/` — request a public sharing
    /// URL for an uploaded path. The URL arrives in the `Location` header;
    /// `None` means the server answered without one.
    pub async fn create_shared_link(
        &self,
        token: &str,
        repo_id: &str,
        remote_path: &str,
    ) -> Result<Option<String>> {
        let resp = self
            .http
            .put(self.url(&format!("api2/repos/{repo_id}/file/shared-link/")))
            .header(AUTHORIZATION, auth_header(token))
            .header(ACCEPT, "application/json")
            .form(&[("p", remote_path)])
            .send()
            .await?;

        let resp = check(resp).await?;
        Ok(resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .filter(|s| !s.is_empty()))
    }

    /// `DELETE api2/repos/<id>/file/?p=<path>` — remove an uploaded file.
    pub async fn delete_file(&self, token: &str, repo_id: &str, remote_path: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(&format!("api2/repos/{repo_id}/file/")))
            .query(&[("p", remote_path)])
            .header(AUTHORIZATION, auth_header(token))
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    fn get(&self, url: String, token: &str) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .header(AUTHORIZATION, auth_header(token))
            .header(ACCEPT, "application/json")
    }
}

/// Trailing space kept for compatibility with servers that scrub auth
/// headers out of their http logs by looking for two spaces.
fn auth_header(token: &str) -> String {
    format!("Token {token} ")
}

/// Map non-2xx responses to errors, surfacing the JSON `detail` field and
/// recognizing the stale-token sentinel.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body).ok().map(|b| b.detail);

    if detail.as_deref() == Some(INVALID_TOKEN_DETAIL) {
        tracing::debug!(status = status.as_u16(), "server rejected token as stale");
        return Err(Error::InvalidToken);
    }

    Err(Error::Api {
        status: status.as_u16(),
        text: detail.unwrap_or(body),
    })
}
