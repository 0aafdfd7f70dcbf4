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

//! `POST /customers/sync` and the two progress-reading endpoints built on
//! top of the Worker Supervisor and the Progress Broker.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use futures::Stream;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::broker::{self, SnapshotParams};
use crate::error::AppResult;
use crate::model::entity::import_job::Model as ImportJobModel;
use crate::model::{ProgressEvent, SseFrame};
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub file_path: Option<String>,
    pub batch_size: Option<usize>,
    pub progress_update_every_ms: Option<u64>,
    pub total_rows: Option<i64>,
}

fn job_to_json(job: &ImportJobModel) -> Value {
    json!({
        "id": job.id,
        "filePath": job.file_path,
        "status": job.status,
        "bytesRead": job.bytes_read.to_string(),
        "rowsProcessed": job.rows_processed.to_string(),
        "rowsInserted": job.rows_inserted.to_string(),
        "lastRowHash": job.last_row_hash,
        "startedAt": job.started_at,
        "completedAt": job.completed_at,
        "updatedAt": job.updated_at,
        "error": job.error,
    })
}

/// `POST /customers/sync`. Starts a new job or resumes the existing
/// non-terminal one; rejects with 409 if one is already RUNNING.
pub async fn start_sync(
    State(state): State<Arc<AppState>>,
    body: Option<Json<SyncRequest>>,
) -> AppResult<impl IntoResponse> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let job = state
        .supervisor
        .start(
            req.file_path.as_deref(),
            req.batch_size,
            req.progress_update_every_ms,
            req.total_rows,
        )
        .await?;
    Ok(Json(job_to_json(&job)))
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProgressQuery {
    pub total_rows: Option<i64>,
    pub recent_limit: Option<u64>,
}

/// `GET /customers/progress`: a single point-in-time snapshot, useful for
/// clients that poll instead of subscribing to the stream.
pub async fn progress(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ProgressQuery>,
) -> AppResult<impl IntoResponse> {
    let params = SnapshotParams::new(
        q.total_rows.unwrap_or(state.config.import_total_rows),
        q.recent_limit.unwrap_or(state.config.import_recent_limit),
    );
    let snapshot = broker::snapshot(&state.db, &params).await?;
    Ok(Json(snapshot))
}

/// `GET /customers/progress/stream`: an SSE connection that opens with a
/// `snapshot` frame, then relays every subsequent worker event plus a
/// periodic `heartbeat` for the lifetime of the connection. Disconnection
/// is handled by axum/hyper dropping this stream; no explicit unsubscribe
/// bookkeeping is needed.
pub async fn progress_stream(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ProgressQuery>,
) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let params = SnapshotParams::new(
        q.total_rows.unwrap_or(state.config.import_total_rows),
        q.recent_limit.unwrap_or(state.config.import_recent_limit),
    );
    let initial = broker::snapshot(&state.db, &params).await?;
    let broker = state.broker.clone();
    let mut rx = broker.subscribe();
    let heartbeat_every = Duration::from_millis(state.config.sse_heartbeat_ms);

    let stream = async_stream::stream! {
        yield sse_event(&SseFrame::snapshot(initial));

        let mut ticker = tokio::time::interval(heartbeat_every);
        ticker.tick().await; // first tick fires immediately; the snapshot above already covers it

        loop {
            tokio::select! {
                event = rx.recv() => {
                    match event {
                        Ok(ev) => yield sse_event(&SseFrame::Event(ev)),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(lagged = n, "SSE subscriber lagged behind the progress broadcast");
                            // A lagged subscriber may have missed the
                            // done/error frame for good, since it will
                            // never be re-sent on the channel. The cached
                            // terminal event is the only way to still
                            // deliver it.
                            if let Some(terminal) = broker.last_terminal() {
                                yield sse_event(&SseFrame::Event(terminal));
                                break;
                            }
                            continue;
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = ticker.tick() => {
                    yield sse_event(&SseFrame::Event(ProgressEvent::Heartbeat { ts: Utc::now() }));
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn sse_event(frame: &SseFrame) -> Result<Event, Infallible> {
    Ok(Event::default().json_data(frame).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to serialize SSE frame");
        Event::default().data("{}")
    }))
}
