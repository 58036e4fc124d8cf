use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::account::{Account, AccountInner, UploadInfo};
use crate::error::{Error, Result, UploadStatus};

/// Local filenames longer than this make the server refuse a sharing link;
/// the failure is classified specifically so the host can say why.
const FILENAME_LIMIT: usize = 120;

/// Host-supplied observer for one upload request. `on_start` fires when the
/// job actually becomes active (not while queued); `on_stop` fires exactly
/// once with the terminal status.
pub trait UploadObserver: Send + Sync {
    fn on_start(&self, file: &Path);
    fn on_stop(&self, file: &Path, status: UploadStatus);
}

/// Per-account upload queue: at most one job is active, the rest wait in
/// submission order. Draining is automatic on every terminal transition.
#[derive(Default)]
pub(crate) struct QueueState {
    active: Option<ActiveJob>,
    pending: VecDeque<QueuedJob>,
}

struct QueuedJob {
    file: PathBuf,
    observer: Arc<dyn UploadObserver>,
}

struct ActiveJob {
    file: PathBuf,
    observer: Arc<dyn UploadObserver>,
    cancel: CancellationToken,
    /// Terminal-notification guard: whoever flips it first (completion or
    /// a racing cancel) delivers the single stop notification.
    notified: Arc<AtomicBool>,
}

/// What `upload_file` hands back out of the queue lock when a job starts
/// immediately; observer calls and the spawn happen outside the lock.
struct LaunchedJob {
    file: PathBuf,
    observer: Arc<dyn UploadObserver>,
    cancel: CancellationToken,
}

enum CancelOutcome {
    NotFound,
    Active {
        file: PathBuf,
        observer: Arc<dyn UploadObserver>,
        notified: Arc<AtomicBool>,
    },
    Queued(QueuedJob),
}

impl Account {
    /// Request an upload of `file`, replacing the attachment with a sharing
    /// link once done. Returns immediately: when another upload is active
    /// the job queues without any network activity and its observer is not
    /// told about a start until it is dequeued.
    pub fn upload_file(&self, file: PathBuf, observer: Arc<dyn UploadObserver>) -> Result<()> {
        self.inner.check_online()?;

        let launched = {
            let mut queue = self.inner.queue.lock().unwrap();
            if queue.active.is_some() {
                tracing::info!(file = %file.display(), "upload in flight, queueing");
                queue.pending.push_back(QueuedJob { file, observer });
                None
            } else {
                Some(arm_job(&mut queue, QueuedJob { file, observer }))
            }
        };

        if let Some(launched) = launched {
            launch(&self.inner, launched);
        }
        Ok(())
    }

    /// Cancel an upload by local path. The active job gets its transport
    /// aborted; a queued job is removed without ever contacting the server.
    /// Either way the observer receives exactly one Cancelled notification.
    /// Unknown files are a no-op.
    pub fn cancel_file_upload(&self, file: &Path) {
        tracing::info!(file = %file.display(), "cancel requested");

        let outcome = {
            let mut queue = self.inner.queue.lock().unwrap();
            if let Some(active) = queue.active.as_ref().filter(|a| a.file == file) {
                active.cancel.cancel();
                CancelOutcome::Active {
                    file: active.file.clone(),
                    observer: Arc::clone(&active.observer),
                    notified: Arc::clone(&active.notified),
                }
            } else if let Some(pos) = queue.pending.iter().position(|j| j.file == file) {
                match queue.pending.remove(pos) {
                    Some(job) => CancelOutcome::Queued(job),
                    None => CancelOutcome::NotFound,
                }
            } else {
                CancelOutcome::NotFound
            }
        };

        match outcome {
            CancelOutcome::Active {
                file,
                observer,
                notified,
            } => {
                // A completion racing us may have notified already.
                if !notified.swap(true, Ordering::SeqCst) {
                    observer.on_stop(&file, UploadStatus::Cancelled);
                }
            }
            CancelOutcome::Queued(job) => {
                job.observer.on_stop(&job.file, UploadStatus::Cancelled);
            }
            CancelOutcome::NotFound => {
                tracing::debug!(file = %file.display(), "no upload to cancel");
            }
        }
    }
}

/// Install `job` as the active entry. Caller holds the queue lock and must
/// call `launch` afterwards, outside of it.
fn arm_job(queue: &mut QueueState, job: QueuedJob) -> LaunchedJob {
    let cancel = CancellationToken::new();
    queue.active = Some(ActiveJob {
        file: job.file.clone(),
        observer: Arc::clone(&job.observer),
        cancel: cancel.clone(),
        notified: Arc::new(AtomicBool::new(false)),
    });
    LaunchedJob {
        file: job.file,
        observer: job.observer,
        cancel,
    }
}

fn launch(inner: &Arc<AccountInner>, job: LaunchedJob) {
    tracing::info!(file = %job.file.display(), "starting upload");
    job.observer.on_start(&job.file);

    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        let status = tokio::select! {
            biased;
            _ = job.cancel.cancelled() => UploadStatus::Cancelled,
            status = inner.drive_upload(&job.file) => status,
        };
        finish_active(&inner, status);
    });
}

/// Terminal transition for the active job: deliver the (guarded) stop
/// notification, refresh quota caches after a success, advance the queue.
fn finish_active(inner: &Arc<AccountInner>, status: UploadStatus) {
    if status.is_ok() {
        // Quota figures changed server-side; force a re-fetch next time.
        inner.session.lock().unwrap().invalidate_caches();
    }

    let done = inner.queue.lock().unwrap().active.take();
    if let Some(done) = done {
        tracing::info!(file = %done.file.display(), ?status, "upload finished");
        if !done.notified.swap(true, Ordering::SeqCst) {
            done.observer.on_stop(&done.file, status);
        }
    }

    // Automatic draining: a failed job never stalls the queue.
    let next = {
        let mut queue = inner.queue.lock().unwrap();
        queue.pending.pop_front().map(|job| arm_job(&mut queue, job))
    };
    if let Some(next) = next {
        tracing::info!(file = %next.file.display(), "dequeuing next upload");
        launch(inner, next);
    }
}

impl AccountInner {
    async fn drive_upload(&self, file: &Path) -> UploadStatus {
        match self.run_pipeline(file).await {
            Ok(()) => UploadStatus::Ok,
            Err(e) => {
                tracing::error!(file = %file.display(), error = %e, "upload failed");
                self.record(&e);
                UploadStatus::of(&e)
            }
        }
    }

    /// One upload, start to finish: preconditions (login, user info,
    /// folder), then prepare -> transfer -> link retrieval. Strictly
    /// sequential; each step awaits the prior network response.
    async fn run_pipeline(&self, file: &Path) -> Result<()> {
        if !self.logged_in() {
            self.logon(true, true).await?;
        }
        if self.session.lock().unwrap().user_info.is_none() {
            // Auth-flavored failure to the host, as for login itself.
            self.fetch_user_info().await.map_err(|e| match e {
                e @ (Error::Offline | Error::Auth(_)) => e,
                other => Error::Auth(other.to_string()),
            })?;
        }

        let repo_id = self.ensure_repo_id().await?;
        let folder = self.ensure_folder().await?;

        let leaf = file
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Upload(format!("invalid file name: {}", file.display())))?;

        // Prepare: one-time upload target scoped to the library.
        let upload_url = self
            .with_auth_retry(|| {
                let repo_id = repo_id.clone();
                Box::pin(async move {
                    let token = self.token()?;
                    self.api.upload_link(&token, &repo_id).await
                })
            })
            .await
            .inspect_err(|e| self.record(e))?;
        tracing::debug!(file = %file.display(), "upload link acquired");

        // Transfer. The link is one-time, so no stale-token re-issue here;
        // a timestamp prefix keeps same-named uploads from colliding.
        let remote_name = remote_name_for(leaf);
        let token = self.token()?;
        self.api
            .upload(&token, &upload_url, &folder, &remote_name, file)
            .await
            .inspect_err(|e| self.record(e))?;

        let remote_path = format!("{folder}/{remote_name}");
        tracing::debug!(remote = %remote_path, "transfer complete");
        self.session.lock().unwrap().uploads.insert(
            file.to_path_buf(),
            UploadInfo {
                remote_path: remote_path.clone(),
                shared_url: None,
            },
        );

        // Link retrieval.
        let shared = self
            .with_auth_retry(|| {
                let repo_id = repo_id.clone();
                let remote_path = remote_path.clone();
                Box::pin(async move {
                    let token = self.token()?;
                    self.api
                        .create_shared_link(&token, &repo_id, &remote_path)
                        .await
                })
            })
            .await
            .unwrap_or_else(|e| {
                self.record(&e);
                None
            });

        match shared {
            Some(url) => {
                tracing::info!(file = %file.display(), url = %url, "sharing link ready");
                let mut session = self.session.lock().unwrap();
                if let Some(info) = session.uploads.get_mut(file) {
                    info.shared_url = Some(url);
                }
                Ok(())
            }
            None if leaf.chars().count() > FILENAME_LIMIT => {
                Err(Error::FilenameTooLong(leaf.to_string()))
            }
            None => Err(Error::Upload("server returned no sharing link".into())),
        }
    }
}

/// Remote filename for an upload: millisecond-timestamp prefix so two
/// uploads of identically named files don't collide server-side.
fn remote_name_for(leaf: &str) -> String {
    format!("{}_{leaf}", chrono::Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_name_keeps_leaf_and_prefixes_timestamp() {
        let name = remote_name_for("report.pdf");
        let (prefix, rest) = name.split_once('_').unwrap();
        assert_eq!(rest, "report.pdf");
        assert!(prefix.parse::<i64>().unwrap() > 0);
    }
}
