#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use mockito::{Matcher, Mock, ServerGuard};
use tokio::sync::mpsc;

use seaflink::{
    Account, AccountConfig, MemorySecretStore, SecretStore, UploadObserver, UploadStatus,
};

pub const USERNAME: &str = "user@example.com";
pub const PASSWORD: &str = "hunter2";
pub const LIBRARY: &str = "Mail Files";
pub const REPO_ID: &str = "repo-0001";

pub fn test_config(server: &ServerGuard) -> AccountConfig {
    AccountConfig {
        base_url: server.url(),
        username: USERNAME.into(),
        library: LIBRARY.into(),
        library_create: false,
        expiry_days: None,
        secrets_path: None,
    }
}

/// An account wired to the mock server with an in-memory secret store the
/// test can inspect and pre-seed.
pub struct TestAccount {
    pub account: Account,
    pub store: Arc<MemorySecretStore>,
}

pub fn account_with(
    server: &ServerGuard,
    store: Arc<MemorySecretStore>,
    tweak: impl FnOnce(&mut AccountConfig),
) -> TestAccount {
    let mut config = test_config(server);
    tweak(&mut config);
    let account = Account::new(config, store.clone(), None).unwrap();
    TestAccount { account, store }
}

/// Account seeded with a stored token and password, the usual state of a
/// previously logged-in profile.
pub fn logged_in_account(server: &ServerGuard) -> TestAccount {
    let store = Arc::new(MemorySecretStore::with_password(PASSWORD));
    store.set_token(Some("tok-valid")).unwrap();
    account_with(server, store, |_| {})
}

pub enum Event {
    Start(PathBuf),
    Stop(PathBuf, UploadStatus),
}

/// Observer that records the exact event sequence and signals each stop
/// through a channel so tests can await completion.
pub struct RecordingObserver {
    pub events: Mutex<Vec<Event>>,
    tx: mpsc::UnboundedSender<()>,
}

impl RecordingObserver {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
                tx,
            }),
            rx,
        )
    }

    /// Event sequence as compact strings, for order assertions.
    pub fn sequence(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| match e {
                Event::Start(f) => format!("start {}", leaf(f)),
                Event::Stop(f, s) => format!("stop {} {s:?}", leaf(f)),
            })
            .collect()
    }
}

fn leaf(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

impl UploadObserver for RecordingObserver {
    fn on_start(&self, file: &Path) {
        self.events.lock().unwrap().push(Event::Start(file.into()));
    }

    fn on_stop(&self, file: &Path, status: UploadStatus) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Stop(file.into(), status));
        let _ = self.tx.send(());
    }
}

// Mock builders for the api2 endpoints, matching any token by default.

pub async fn mock_auth_token(server: &mut ServerGuard, token: &str) -> Mock {
    server
        .mock("POST", "/api2/auth-token/")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("username".into(), USERNAME.into()),
            Matcher::UrlEncoded("password".into(), PASSWORD.into()),
        ]))
        .with_status(200)
        .with_body(format!(r#"{{"token": "{token}"}}"#))
        .create_async()
        .await
}

pub async fn mock_account_info(server: &mut ServerGuard) -> Mock {
    server
        .mock("GET", "/api2/account/info/")
        .with_status(200)
        .with_body(format!(
            r#"{{"email": "{USERNAME}", "usage": 2048, "total": 1000000}}"#
        ))
        .create_async()
        .await
}

pub async fn mock_list_repos(server: &mut ServerGuard) -> Mock {
    server
        .mock("GET", "/api2/repos/")
        .with_status(200)
        .with_body(format!(
            r#"[{{"id": "{REPO_ID}", "name": "{LIBRARY}", "owner": "{USERNAME}"}},
                {{"id": "repo-9999", "name": "Other", "owner": "{USERNAME}"}}]"#
        ))
        .create_async()
        .await
}

/// `/` already contains `apps`, `/apps` is empty; mkdir fills in the rest.
pub async fn mock_folder_listing(server: &mut ServerGuard) -> (Mock, Mock, Mock) {
    let root = server
        .mock("GET", format!("/api2/repos/{REPO_ID}/dir/").as_str())
        .match_query(Matcher::UrlEncoded("p".into(), "/".into()))
        .with_status(200)
        .with_body(r#"[{"name": "apps", "type": "dir"}]"#)
        .create_async()
        .await;
    let apps = server
        .mock("GET", format!("/api2/repos/{REPO_ID}/dir/").as_str())
        .match_query(Matcher::UrlEncoded("p".into(), "/apps".into()))
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;
    let mkdir = server
        .mock("POST", format!("/api2/repos/{REPO_ID}/dir/").as_str())
        .match_query(Matcher::UrlEncoded("p".into(), "/apps/seaflink".into()))
        .match_body(Matcher::UrlEncoded("operation".into(), "mkdir".into()))
        .with_status(201)
        .create_async()
        .await;
    (root, apps, mkdir)
}

pub async fn mock_upload_link(server: &mut ServerGuard) -> Mock {
    let target = format!("{}/seafhttp/upload-api/ephemeral", server.url());
    server
        .mock("GET", format!("/api2/repos/{REPO_ID}/upload-link/").as_str())
        .with_status(200)
        .with_body(format!(r#""{target}""#))
        .create_async()
        .await
}

pub async fn mock_upload_endpoint(server: &mut ServerGuard) -> Mock {
    server
        .mock("POST", "/seafhttp/upload-api/ephemeral")
        .with_status(200)
        .with_body(r#""ok""#)
        .create_async()
        .await
}

pub async fn mock_shared_link(server: &mut ServerGuard, url: &str) -> Mock {
    server
        .mock("PUT", format!("/api2/repos/{REPO_ID}/file/shared-link/").as_str())
        .with_status(201)
        .with_header("Location", url)
        .create_async()
        .await
}

/// Everything a successful upload needs, against a logged-in account.
pub async fn mock_happy_upload(server: &mut ServerGuard, link: &str) {
    mock_list_repos(server).await;
    mock_account_info(server).await;
    mock_folder_listing(server).await;
    mock_upload_link(server).await;
    mock_upload_endpoint(server).await;
    mock_shared_link(server, link).await;
}

/// A temp dir holding one file with the given name and some content.
pub fn temp_upload(name: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, b"attachment payload").unwrap();
    (dir, path)
}
