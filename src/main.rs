use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use seaflink::{
    Account, CredentialPrompt, FileSecretStore, UploadObserver, UploadStatus,
};

#[derive(Parser)]
#[command(
    name = "seaflink",
    version,
    about = "Upload mail attachments to a SeaFile library and get a sharing link back"
)]
struct Cli {
    /// Path to config file [default: ~/.config/seaflink/config.toml]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the API token (prompts for the password)
    Login,
    /// Upload one or more files and print their sharing links
    Upload {
        /// Files to upload, processed in order
        files: Vec<PathBuf>,
    },
    /// Show account and quota information
    Info,
    /// Upload a single file and print only the sharing link
    Link { file: PathBuf },
    /// Delete a previously uploaded file from the library
    Delete {
        /// Remote path within the library, e.g. /apps/seaflink/169..._x.pdf
        path: String,
    },
    /// Forget the stored password (the token survives until it goes stale)
    Logout,
}

fn init_tracing(verbosity: u8, configured_level: &str) {
    let default_filter = match verbosity {
        0 => format!("seaflink={configured_level}"),
        1 => "seaflink=debug".into(),
        2 => "seaflink=trace".into(),
        _ => "trace".into(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.as_str().into()),
        )
        .init();
}

/// Reads the password from the terminal. Hosts embedding the library
/// plug their own dialog in here instead.
struct StdinPrompt;

impl CredentialPrompt for StdinPrompt {
    fn prompt_password(&self, username: &str, server: &str) -> Option<String> {
        eprint!("Password for {username} at {server}: ");
        std::io::stderr().flush().ok()?;
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line).ok()?;
        let password = line.trim_end_matches(['\r', '\n']).to_string();
        if password.is_empty() {
            None
        } else {
            Some(password)
        }
    }
}

/// Bridges the queue's callbacks back into the command loop so the CLI
/// can await each upload's terminal status.
struct ChannelObserver {
    tx: tokio::sync::mpsc::UnboundedSender<(PathBuf, UploadStatus)>,
}

impl UploadObserver for ChannelObserver {
    fn on_start(&self, file: &Path) {
        eprintln!("uploading {}...", file.display());
    }

    fn on_stop(&self, file: &Path, status: UploadStatus) {
        let _ = self.tx.send((file.to_path_buf(), status));
    }
}

fn open_account(cfg: seaflink::Config) -> Result<Account> {
    let secrets = Arc::new(FileSecretStore::new(cfg.account.secrets_path.as_deref())?);
    Ok(Account::new(cfg.account, secrets, Some(Arc::new(StdinPrompt)))?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = seaflink::load_config(cli.config.as_deref())?;
    init_tracing(cli.verbose, &cfg.general.log_level);

    let account = open_account(cfg)?;

    match &cli.command {
        Command::Login => {
            account.logon(true).await?;
            let info = account.refresh_user_info(false).await?;
            println!("logged in as {}", info.email);
        }
        Command::Upload { files } => {
            if files.is_empty() {
                anyhow::bail!("no files given");
            }
            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
            let observer = Arc::new(ChannelObserver { tx });
            for file in files {
                account.upload_file(file.clone(), observer.clone())?;
            }
            let mut failures = 0;
            for _ in files {
                let Some((file, status)) = rx.recv().await else {
                    break;
                };
                if status.is_ok() {
                    let url = account
                        .url_for_file(&file)
                        .unwrap_or_else(|| "(no link)".into());
                    println!("{}: {url}", file.display());
                } else {
                    failures += 1;
                    let detail = account
                        .last_error()
                        .map(|e| format!(" ({}: {})", e.status, e.text))
                        .unwrap_or_default();
                    eprintln!("{}: failed, {status:?}{detail}", file.display());
                }
            }
            if failures > 0 {
                anyhow::bail!("{failures} upload(s) failed");
            }
        }
        Command::Link { file } => {
            let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
            account.upload_file(file.clone(), Arc::new(ChannelObserver { tx }))?;
            match rx.recv().await {
                Some((_, status)) if status.is_ok() => {
                    let url = account
                        .url_for_file(file)
                        .ok_or_else(|| anyhow::anyhow!("upload succeeded but no link recorded"))?;
                    println!("{url}");
                }
                Some((_, status)) => anyhow::bail!("upload failed: {status:?}"),
                None => anyhow::bail!("upload task aborted"),
            }
        }
        Command::Info => {
            let info = account.refresh_user_info(true).await?;
            println!("account: {}", info.email);
            println!("library: {}", account.config().library);
            if info.total < 0 {
                println!("quota:   unlimited ({} bytes used)", info.usage);
            } else {
                println!(
                    "quota:   {} of {} bytes used ({} free)",
                    info.usage,
                    info.total,
                    info.remaining()
                );
            }
        }
        Command::Delete { path } => {
            account.delete_remote_path(path).await?;
            println!("deleted {path}");
        }
        Command::Logout => {
            account.clear_password()?;
            println!("stored password removed");
        }
    }

    Ok(())
}
