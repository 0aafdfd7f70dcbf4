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

//! Import Worker. Owns one job's end-to-end execution: read → map →
//! batch → commit → persist progress. The worker runs as its own tokio
//! task and never shares mutable state with the HTTP surface except
//! through the job id and the Progress Broker's channel, mirroring the
//! cross-context isolation of `src/meta/src/manager/cluster.rs`'s
//! `ClusterManager`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;

use crate::broker::ProgressBroker;
use crate::model::{BatchItem, ProgressEvent, ResumeCheckpoint};
use crate::parser::{ParseError, StreamingParser};
use crate::{batch_writer, job_store, mapper};

const MIN_BATCH_SIZE: usize = 100;
const MAX_BATCH_SIZE: usize = 10_000;
const MIN_PROGRESS_EVERY_MS: u64 = 200;
const MAX_PROGRESS_EVERY_MS: u64 = 30_000;
const MIN_TOTAL_ROWS: i64 = 1;
const MAX_TOTAL_ROWS: i64 = 50_000_000;

#[derive(Debug, Clone, Copy)]
pub struct WorkerParams {
    pub batch_size: usize,
    pub progress_every_ms: u64,
    pub total_rows: i64,
    pub read_buffer_capacity: usize,
}

impl WorkerParams {
    pub fn new(batch_size: usize, progress_every_ms: u64, total_rows: i64, read_buffer_capacity: usize) -> Self {
        Self {
            batch_size: batch_size.clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE),
            progress_every_ms: progress_every_ms.clamp(MIN_PROGRESS_EVERY_MS, MAX_PROGRESS_EVERY_MS),
            total_rows: total_rows.clamp(MIN_TOTAL_ROWS, MAX_TOTAL_ROWS),
            read_buffer_capacity,
        }
    }
}

pub struct ImportWorker {
    job_id: String,
    file_path: PathBuf,
    db: DatabaseConnection,
    broker: Arc<ProgressBroker>,
    cancel: CancellationToken,
    params: WorkerParams,
    resume: Option<ResumeCheckpoint>,
}

enum ParserMsg {
    Row { item: BatchItem, bytes_read: u64 },
    Done { bytes_read: u64 },
}

impl ImportWorker {
    pub fn new(
        job_id: String,
        file_path: PathBuf,
        db: DatabaseConnection,
        broker: Arc<ProgressBroker>,
        params: WorkerParams,
        resume: Option<ResumeCheckpoint>,
    ) -> (Self, CancellationToken) {
        let cancel = CancellationToken::new();
        let worker = Self {
            job_id,
            file_path,
            db,
            broker,
            cancel: cancel.clone(),
            params,
            resume,
        };
        (worker, cancel)
    }

    /// Runs to completion, writing the terminal job transition and
    /// emitting the terminal event. Errors are swallowed here: the
    /// terminal handling below is the single place that converts them
    /// into durable state plus a live event.
    pub async fn run(mut self) {
        let job_id = self.job_id.clone();
        let result = self.run_inner().await;
        if self.cancel.is_cancelled() {
            // The Supervisor initiated this stop and owns the terminal
            // transition (marks FAILED "application shutdown"); avoid a
            // race where this task would otherwise mark COMPLETED for
            // work that was actually cut short.
            return;
        }
        match result {
            Ok(()) => {
                if let Err(e) = job_store::mark_completed(&self.db, &job_id).await {
                    tracing::error!(job_id, error = %e, "failed to persist COMPLETED status");
                }
                self.broker.publish(ProgressEvent::Done { job_id });
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(job_id, error = %message, "import job failed");
                // Best-effort: a failure here must not prevent the event below.
                if let Err(write_err) = job_store::mark_failed(&self.db, &job_id, &message).await {
                    tracing::error!(job_id, error = %write_err, "failed to persist FAILED status");
                }
                self.broker.publish(ProgressEvent::Error { job_id, error: message });
            }
        }
    }

    async fn run_inner(&mut self) -> anyhow::Result<()> {
        let (tx, mut rx) = tokio::sync::mpsc::channel::<ParserMsg>(self.params.batch_size * 2);

        let path = self.file_path.clone();
        let resume = self.resume.clone();
        let cancel = self.cancel.clone();
        let buffer_capacity = self.params.read_buffer_capacity;
        let parse_handle = tokio::task::spawn_blocking(move || {
            run_parse_thread(&path, resume, buffer_capacity, tx, cancel)
        });

        let baseline_rows_processed = self.resume.as_ref().map(|r| r.rows_processed).unwrap_or(0);
        let baseline_rows_inserted = self.resume.as_ref().map(|r| r.rows_inserted).unwrap_or(0);
        let mut rows_processed = baseline_rows_processed;
        let mut rows_inserted = baseline_rows_inserted;
        let mut last_row_hash = self.resume.as_ref().and_then(|r| r.last_row_hash.clone());
        let mut bytes_read: i64 = self
            .resume
            .as_ref()
            .map(|r| r.start_bytes as i64)
            .unwrap_or(0);

        let start_time = Instant::now();
        let mut last_progress_write: Option<Instant> = None;
        let mut pending: Vec<BatchItem> = Vec::with_capacity(self.params.batch_size);

        while let Some(msg) = rx.recv().await {
            match msg {
                ParserMsg::Row { item, bytes_read: offset } => {
                    rows_processed += 1;
                    bytes_read = offset as i64;
                    pending.push(item);
                    if pending.len() >= self.params.batch_size {
                        let batch = std::mem::take(&mut pending);
                        let result = batch_writer::flush(&self.db, batch).await?;
                        rows_inserted += result.affected as i64;
                        if let Some(h) = result.last_hash {
                            last_row_hash = Some(h);
                        }
                        self.maybe_persist_progress(
                            false,
                            bytes_read,
                            rows_processed,
                            rows_inserted,
                            last_row_hash.clone(),
                            start_time,
                            baseline_rows_processed,
                            &mut last_progress_write,
                        )
                        .await?;
                    }
                }
                ParserMsg::Done { bytes_read: offset } => {
                    bytes_read = offset as i64;
                }
            }
        }

        // Propagate a parse-thread failure (I/O error, malformed stream).
        parse_handle
            .await
            .map_err(|e| anyhow::anyhow!("parser task panicked: {e}"))??;

        if !pending.is_empty() {
            let batch = std::mem::take(&mut pending);
            let result = batch_writer::flush(&self.db, batch).await?;
            rows_inserted += result.affected as i64;
            if let Some(h) = result.last_hash {
                last_row_hash = Some(h);
            }
        }

        self.maybe_persist_progress(
            true,
            bytes_read,
            rows_processed,
            rows_inserted,
            last_row_hash,
            start_time,
            baseline_rows_processed,
            &mut last_progress_write,
        )
        .await?;

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn maybe_persist_progress(
        &self,
        force: bool,
        bytes_read: i64,
        rows_processed: i64,
        rows_inserted: i64,
        last_row_hash: Option<String>,
        start_time: Instant,
        baseline_rows_processed: i64,
        last_write: &mut Option<Instant>,
    ) -> anyhow::Result<()> {
        let now = Instant::now();
        let due = match last_write {
            Some(t) => now.duration_since(*t) >= Duration::from_millis(self.params.progress_every_ms),
            None => true,
        };
        if !force && !due {
            return Ok(());
        }
        *last_write = Some(now);

        job_store::update_progress(
            &self.db,
            &self.job_id,
            bytes_read,
            rows_processed,
            rows_inserted,
            last_row_hash.clone(),
        )
        .await?;

        let elapsed_sec = start_time.elapsed().as_secs_f64();
        let rate = (rows_processed - baseline_rows_processed) as f64 / elapsed_sec.max(1.0);

        self.broker.publish(ProgressEvent::Progress {
            job_id: self.job_id.clone(),
            rows_processed: rows_processed.to_string(),
            rows_inserted: rows_inserted.to_string(),
            bytes_read: bytes_read.to_string(),
            rate,
            elapsed_sec,
            last_row_hash,
        });
        Ok(())
    }
}

/// Opens the parser at the right starting point: always learns the
/// header from offset 0 first (column names are stable for a job, but
/// not persisted), then, when resuming, reopens at
/// `max(0, startBytes - overlapBytes)` using that header.
fn open_parser(
    path: &Path,
    resume: Option<&ResumeCheckpoint>,
    buffer_capacity: usize,
) -> Result<StreamingParser, ParseError> {
    let bootstrap = StreamingParser::open(path, 0, None, buffer_capacity)?;
    match resume {
        None => Ok(bootstrap),
        Some(r) => {
            let header = bootstrap.header().to_vec();
            drop(bootstrap);
            let stream_start = r.start_bytes.saturating_sub(r.overlap_bytes);
            StreamingParser::open(path, stream_start, Some(header), buffer_capacity)
        }
    }
}

/// Runs on a blocking thread (see `spawn_blocking` above). Implements the
/// marker-based resume skip: rows are not counted or sent downstream
/// until the row whose hash equals `lastRowHash` has been observed (that
/// row's effects are already committed, so it itself is skipped too).
fn run_parse_thread(
    path: &Path,
    resume: Option<ResumeCheckpoint>,
    buffer_capacity: usize,
    tx: tokio::sync::mpsc::Sender<ParserMsg>,
    cancel: CancellationToken,
) -> Result<(), ParseError> {
    let mut parser = open_parser(path, resume.as_ref(), buffer_capacity)?;
    let marker_hash = resume.as_ref().and_then(|r| r.last_row_hash.clone());
    let mut seen_marker = marker_hash.is_none();

    loop {
        if cancel.is_cancelled() {
            return Ok(());
        }
        let Some(raw) = parser.next_record()? else {
            let _ = tx.blocking_send(ParserMsg::Done {
                bytes_read: parser.current_offset(),
            });
            return Ok(());
        };
        let Some(customer) = mapper::map_record(&raw) else {
            continue;
        };
        let hash = mapper::hash_customer(&customer);
        if !seen_marker {
            if marker_hash.as_deref() == Some(hash.as_str()) {
                seen_marker = true;
            }
            continue;
        }
        let item = BatchItem {
            customer,
            source_hash: hash,
        };
        let bytes_read = parser.current_offset();
        if tx.blocking_send(ParserMsg::Row { item, bytes_read }).is_err() {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_params_clamp_into_bounds() {
        let p = WorkerParams::new(10, 50, 0, 4096);
        assert_eq!(p.batch_size, MIN_BATCH_SIZE);
        assert_eq!(p.progress_every_ms, MIN_PROGRESS_EVERY_MS);
        assert_eq!(p.total_rows, MIN_TOTAL_ROWS);

        let p = WorkerParams::new(1_000_000, 1_000_000, i64::MAX, 4096);
        assert_eq!(p.batch_size, MAX_BATCH_SIZE);
        assert_eq!(p.progress_every_ms, MAX_PROGRESS_EVERY_MS);
        assert_eq!(p.total_rows, MAX_TOTAL_ROWS);

        let p = WorkerParams::new(500, 2000, 100, 4096);
        assert_eq!(p.batch_size, 500);
        assert_eq!(p.progress_every_ms, 2000);
        assert_eq!(p.total_rows, 100);
    }
}
