// Copyright 2025 RisingWave Labs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Worker Supervisor. Ensures exactly one active worker across the
//! process, bridges worker events to the Progress Broker, and performs
//! boot-time auto-resume. Modeled on the `RwLock<Core>`-guarded manager
//! pattern of `src/meta/src/manager/cluster.rs`'s `ClusterManager`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::model::entity::import_job::Model as ImportJobModel;
use crate::model::ResumeCheckpoint;
use crate::worker::{ImportWorker, WorkerParams};
use crate::{broker::ProgressBroker, job_store};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Spawning,
    Running,
    Draining,
}

struct Inner {
    state: SupervisorState,
    current_job_id: Option<String>,
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

pub struct WorkerSupervisor {
    db: DatabaseConnection,
    broker: Arc<ProgressBroker>,
    default_csv_path: String,
    resume_overlap: u64,
    read_buffer_capacity: usize,
    inner: Mutex<Inner>,
}

fn resolve_path(requested: Option<&str>, default_path: &str) -> Result<PathBuf, AppError> {
    let raw = requested.filter(|s| !s.trim().is_empty()).unwrap_or(default_path);
    let path = Path::new(raw);
    if !path.is_absolute() {
        return Err(AppError::Validation(format!(
            "filePath must be absolute: {raw}"
        )));
    }
    let meta = std::fs::metadata(path)
        .map_err(|_| AppError::Validation(format!("file does not exist: {raw}")))?;
    if !meta.is_file() {
        return Err(AppError::Validation(format!("not a regular file: {raw}")));
    }
    Ok(path.to_path_buf())
}

impl WorkerSupervisor {
    pub fn new(
        db: DatabaseConnection,
        broker: Arc<ProgressBroker>,
        default_csv_path: String,
        resume_overlap: u64,
        read_buffer_capacity: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            db,
            broker,
            default_csv_path,
            resume_overlap,
            read_buffer_capacity,
            inner: Mutex::new(Inner {
                state: SupervisorState::Idle,
                current_job_id: None,
                cancel: None,
                handle: None,
            }),
        })
    }

    pub async fn state(&self) -> SupervisorState {
        self.inner.lock().await.state
    }

    /// `POST /customers/sync`'s pre-checks and dispatch: resolve the
    /// source path, resume an existing non-terminal job if one exists,
    /// otherwise create and spawn a fresh one.
    #[allow(clippy::too_many_arguments)]
    pub async fn start(
        self: &Arc<Self>,
        file_path: Option<&str>,
        batch_size: Option<usize>,
        progress_every_ms: Option<u64>,
        total_rows: Option<i64>,
    ) -> Result<ImportJobModel, AppError> {
        let path = resolve_path(file_path, &self.default_csv_path)?;

        let mut inner = self.inner.lock().await;
        let existing = job_store::find_latest_running(&self.db).await?;

        let params = WorkerParams::new(
            batch_size.unwrap_or(1000),
            progress_every_ms.unwrap_or(1000),
            total_rows.unwrap_or(2_000_000),
            self.read_buffer_capacity,
        );

        if let Some(job) = existing {
            if inner.state == SupervisorState::Running {
                return Err(AppError::ImportConflict { job_id: job.id });
            }
            let resume = ResumeCheckpoint {
                start_bytes: job.bytes_read.max(0) as u64,
                overlap_bytes: self.resume_overlap,
                last_row_hash: job.last_row_hash.clone(),
                rows_processed: job.rows_processed,
                rows_inserted: job.rows_inserted,
            };
            self.spawn_worker(&mut inner, job.clone(), Some(resume), path, params);
            return Ok(job);
        }

        let job_id = uuid::Uuid::new_v4().to_string();
        let job = job_store::create(&self.db, &job_id, &path.to_string_lossy()).await?;
        self.spawn_worker(&mut inner, job.clone(), None, path, params);
        Ok(job)
    }

    /// Called once at process start. If a RUNNING job survived a crash,
    /// resumes it without operator intervention.
    pub async fn reconcile_on_boot(self: &Arc<Self>) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let Some(job) = job_store::find_latest_running(&self.db).await? else {
            return Ok(());
        };
        let path = Path::new(&job.file_path).to_path_buf();
        let resume = ResumeCheckpoint {
            start_bytes: job.bytes_read.max(0) as u64,
            overlap_bytes: self.resume_overlap,
            last_row_hash: job.last_row_hash.clone(),
            rows_processed: job.rows_processed,
            rows_inserted: job.rows_inserted,
        };
        tracing::info!(job_id = %job.id, "resuming job found RUNNING at boot");
        let params = WorkerParams::new(1000, 1000, 2_000_000, self.read_buffer_capacity);
        self.spawn_worker(&mut inner, job, Some(resume), path, params);
        Ok(())
    }

    fn spawn_worker(
        self: &Arc<Self>,
        inner: &mut Inner,
        job: ImportJobModel,
        resume: Option<ResumeCheckpoint>,
        path: PathBuf,
        params: WorkerParams,
    ) {
        inner.state = SupervisorState::Spawning;
        let (worker, cancel) = ImportWorker::new(
            job.id.clone(),
            path,
            self.db.clone(),
            self.broker.clone(),
            params,
            resume,
        );
        let worker_handle = tokio::spawn(async move { worker.run().await });

        let sup = self.clone();
        let job_id = job.id.clone();
        // A second task joins the worker so a panic inside `run()` (an
        // `Err(JoinError)`, distinct from the `Ok(())` the normal and
        // cancelled paths both return) is observed here rather than
        // silently leaving the job RUNNING forever.
        let supervising_handle = tokio::spawn(async move {
            let outcome = worker_handle.await;
            sup.on_worker_finished(&job_id, outcome.err()).await;
        });

        inner.current_job_id = Some(job.id);
        inner.cancel = Some(cancel);
        inner.handle = Some(supervising_handle);
        inner.state = SupervisorState::Running;
    }

    async fn on_worker_finished(self: &Arc<Self>, job_id: &str, panic: Option<tokio::task::JoinError>) {
        if let Some(join_err) = panic {
            // Only write FAILED if this job is still the one the
            // Supervisor thinks is live; `shutdown()` may have already
            // reassigned supervisor state and written its own terminal
            // status for a cancellation that raced with this panic.
            let is_current = self.inner.lock().await.current_job_id.as_deref() == Some(job_id);
            if is_current {
                tracing::error!(job_id, error = %join_err, "worker task exited abnormally");
                let message = format!("worker exited with code {join_err}");
                if let Err(e) = job_store::mark_failed(&self.db, job_id, &message).await {
                    tracing::error!(job_id, error = %e, "failed to persist FAILED status after worker panic");
                }
                self.broker.publish(crate::model::ProgressEvent::Error {
                    job_id: job_id.to_string(),
                    error: message,
                });
            }
        }

        let mut inner = self.inner.lock().await;
        if inner.current_job_id.as_deref() == Some(job_id) {
            inner.state = SupervisorState::Draining;
            inner.current_job_id = None;
            inner.cancel = None;
            inner.handle = None;
            inner.state = SupervisorState::Idle;
        }
    }

    /// Hard-stops the live worker (if any) and marks its job FAILED.
    pub async fn shutdown(self: &Arc<Self>) {
        let (job_id, handle) = {
            let mut inner = self.inner.lock().await;
            let Some(job_id) = inner.current_job_id.take() else {
                return;
            };
            if let Some(cancel) = inner.cancel.take() {
                cancel.cancel();
            }
            (job_id, inner.handle.take())
        };
        // The lock is released before awaiting: the supervising task
        // this handle belongs to calls `on_worker_finished`, which itself
        // needs the lock, so holding it here across the await would
        // deadlock against its own cleanup.
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        if let Ok(Some(job)) = job_store::find_by_id(&self.db, &job_id).await {
            if job.job_status() == crate::model::JobStatus::Running {
                let _ = job_store::mark_failed(&self.db, &job_id, "application shutdown").await;
            }
        }
        self.inner.lock().await.state = SupervisorState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_relative_path() {
        let err = resolve_path(Some("relative/file.csv"), "/default.csv").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_missing_file() {
        let err = resolve_path(Some("/does/not/exist.csv"), "/default.csv").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_string_lossy().to_string();
        let err = resolve_path(Some(&path), "/default.csv").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn falls_back_to_default_when_unset() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_string_lossy().to_string();
        let resolved = resolve_path(None, &path).unwrap();
        assert_eq!(resolved, file.path());
    }
}
