use std::path::PathBuf;

/// Errors surfaced by account operations. Hosts dispatch on the variant;
/// the fuller server-provided text lands in the session's last-error pair.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("account is offline")]
    Offline,

    #[error("authentication failed: {0}")]
    Auth(String),

    /// The server rejected our cached token. Internal sentinel — recovered
    /// via a single silent re-login and never surfaced to the host.
    #[error("invalid token")]
    InvalidToken,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upload failed: {0}")]
    Upload(String),

    #[error("filename too long: {0}")]
    FilenameTooLong(String),

    #[error("upload cancelled")]
    Cancelled,

    #[error("no upload record for {}", .0.display())]
    UnknownFile(PathBuf),

    #[error("not implemented")]
    NotImplemented,

    #[error("server error ({status}): {text}")]
    Api { status: u16, text: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("malformed server response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Terminal status delivered to an upload observer's stop notification.
/// Mirrors the coarse status codes the host dispatches on; detail text is
/// available separately through the account's last-error accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Ok,
    Offline,
    AuthError,
    UploadError,
    FilenameTooLong,
    Cancelled,
}

impl UploadStatus {
    pub fn of(err: &Error) -> Self {
        match err {
            Error::Offline => UploadStatus::Offline,
            Error::Auth(_) | Error::InvalidToken => UploadStatus::AuthError,
            Error::FilenameTooLong(_) => UploadStatus::FilenameTooLong,
            Error::Cancelled => UploadStatus::Cancelled,
            _ => UploadStatus::UploadError,
        }
    }

    pub fn is_ok(self) -> bool {
        self == UploadStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(UploadStatus::of(&Error::Offline), UploadStatus::Offline);
        assert_eq!(
            UploadStatus::of(&Error::Auth("bad credentials".into())),
            UploadStatus::AuthError
        );
        assert_eq!(
            UploadStatus::of(&Error::InvalidToken),
            UploadStatus::AuthError
        );
        assert_eq!(
            UploadStatus::of(&Error::FilenameTooLong("x".into())),
            UploadStatus::FilenameTooLong
        );
        assert_eq!(UploadStatus::of(&Error::Cancelled), UploadStatus::Cancelled);
        assert_eq!(
            UploadStatus::of(&Error::NotFound("lib".into())),
            UploadStatus::UploadError
        );
        assert_eq!(
            UploadStatus::of(&Error::Api {
                status: 500,
                text: "boom".into()
            }),
            UploadStatus::UploadError
        );
    }
}
