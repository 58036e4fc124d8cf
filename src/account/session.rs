use std::collections::HashMap;
use std::path::PathBuf;

/// Cached profile and quota figures for the logged-in user.
/// A negative `total` means the server imposes no quota.
#[derive(Debug, Clone)]
pub struct QuotaInfo {
    pub email: String,
    pub usage: i64,
    pub total: i64,
}

impl QuotaInfo {
    /// Space left on the account, or -1 when the quota is unlimited.
    pub fn remaining(&self) -> i64 {
        if self.total < 0 {
            -1
        } else {
            self.total - self.usage
        }
    }
}

/// Last failure recorded for host diagnostics: HTTP-ish status plus the
/// fuller server- or client-provided text.
#[derive(Debug, Clone)]
pub struct LastError {
    pub status: u16,
    pub text: String,
}

/// Post-transfer record for one uploaded file, keyed by its local path.
/// Overwritten on re-upload.
#[derive(Debug, Clone)]
pub struct UploadInfo {
    /// Remote path including the collision-resistant timestamped name.
    pub remote_path: String,
    pub shared_url: Option<String>,
}

/// Runtime state for one account. The auth token itself lives in the
/// injected secret store; this only tracks whether we believe it valid.
#[derive(Default)]
pub(crate) struct Session {
    pub logged_in: bool,
    /// Resolved library id. Empty-or-valid: never guessed, only adopted
    /// from a server listing or an exact-name create echo.
    pub repo_id: Option<String>,
    pub user_info: Option<QuotaInfo>,
    pub last_error: Option<LastError>,
    pub uploads: HashMap<PathBuf, UploadInfo>,
}

impl Session {
    pub fn record_error(&mut self, status: u16, text: impl Into<String>) {
        self.last_error = Some(LastError {
            status,
            text: text.into(),
        });
    }

    /// Drop quota and library caches so the next read re-resolves.
    pub fn invalidate_caches(&mut self) {
        self.user_info = None;
        self.repo_id = None;
    }
}
