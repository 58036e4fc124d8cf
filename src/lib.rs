//! SeaFile filelink client: upload mail attachments into a SeaFile library
//! and hand back a sharing link to paste into the message body.
//!
//! The [`Account`] facade owns all runtime state for one configured server
//! account: the authentication session, the resolved library and upload
//! folder, the FIFO upload queue, and the per-file upload records. Hosts
//! construct one `Account` per configured account and keep it for the
//! process lifetime.

pub mod account;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod upload;

pub use account::{Account, LastError, QuotaInfo, UploadInfo};
pub use auth::{CredentialPrompt, FileSecretStore, MemorySecretStore, SecretStore};
pub use config::{default_config_path, load_config, AccountConfig, Config};
pub use error::{Error, Result, UploadStatus};
pub use upload::UploadObserver;
