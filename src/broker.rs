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

//! Progress Broker. Computes snapshots and multiplexes live worker
//! events to N observers with heartbeats.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};
use tokio::sync::broadcast;

use crate::model::entity::customer::{self, Entity as CustomerEntity};
use crate::model::entity::import_job::Model as ImportJobModel;
use crate::model::{JobStatus, ProgressEvent, ProgressSnapshot};
use crate::job_store;

const DEFAULT_EVENT_BUFFER: usize = 256;

/// Multi-producer/multi-consumer publisher for worker events, plus a
/// sticky last-terminal frame so a subscriber that reconnects after a
/// `done`/`error` still learns about it.
pub struct ProgressBroker {
    sender: broadcast::Sender<ProgressEvent>,
    last_terminal: Mutex<Option<ProgressEvent>>,
}

impl ProgressBroker {
    pub fn new() -> Arc<Self> {
        let (sender, _rx) = broadcast::channel(DEFAULT_EVENT_BUFFER);
        Arc::new(Self {
            sender,
            last_terminal: Mutex::new(None),
        })
    }

    /// Publishes an event to every live subscriber. Slow subscribers may
    /// drop older `progress` frames (bounded channel, oldest-first
    /// eviction via `tokio::sync::broadcast`'s lag semantics) but never
    /// block the publisher. `done`/`error` are additionally cached so a
    /// subscriber connecting afterwards still sees the terminal state via
    /// `snapshot`.
    pub fn publish(&self, event: ProgressEvent) {
        if matches!(event, ProgressEvent::Done { .. } | ProgressEvent::Error { .. }) {
            *self.last_terminal.lock() = Some(event.clone());
        }
        // No live subscribers is not an error; the event is simply dropped.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    /// The last `done`/`error` event published, if the job has already
    /// reached a terminal state. Consulted when a subscriber lags past
    /// the broadcast buffer so it can still be told the job is over
    /// instead of waiting on heartbeats for an event that already fired.
    pub fn last_terminal(&self) -> Option<ProgressEvent> {
        self.last_terminal.lock().clone()
    }
}

pub struct SnapshotParams {
    pub total_rows: i64,
    pub recent_limit: u64,
}

impl SnapshotParams {
    pub fn new(total_rows: i64, recent_limit: u64) -> Self {
        Self {
            total_rows,
            recent_limit: recent_limit.clamp(1, 200),
        }
    }
}

/// Computes the derived progress view. A pure function of the latest
/// job row, `now`, and the Customer table.
pub async fn snapshot(
    db: &DatabaseConnection,
    params: &SnapshotParams,
) -> Result<ProgressSnapshot, DbErr> {
    let job = match job_store::find_latest_running(db).await? {
        Some(j) => Some(j),
        None => job_store::find_latest(db).await?,
    };

    let Some(job) = job else {
        return Ok(ProgressSnapshot {
            job_id: None,
            status: JobStatus::Idle,
            rows_processed: 0,
            rows_inserted: 0,
            bytes_read: 0,
            percent: 0.0,
            rate_rows_per_sec: 0.0,
            elapsed_sec: 0.0,
            eta_sec: None,
            started_at: None,
            updated_at: None,
            completed_at: None,
            error: None,
            disable_sync: false,
            recent_customers: Vec::new(),
        });
    };

    let status = job.job_status();
    let now = Utc::now();
    let elapsed_sec = (now - job.started_at).num_milliseconds().max(0) as f64 / 1000.0;
    let rate = if elapsed_sec > 0.0 {
        job.rows_processed as f64 / elapsed_sec
    } else {
        0.0
    };
    let percent = if params.total_rows > 0 {
        (job.rows_processed as f64 / params.total_rows as f64 * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };
    let eta_sec = if rate > 0.0 {
        let remaining = (params.total_rows - job.rows_processed).max(0) as f64;
        Some((remaining / rate).ceil() as i64)
    } else {
        None
    };

    let recent_customers = if matches!(status, JobStatus::Running | JobStatus::Completed) {
        fetch_recent_customers(db, &job, params.recent_limit).await?
    } else {
        Vec::new()
    };

    Ok(ProgressSnapshot {
        job_id: Some(job.id.clone()),
        status,
        rows_processed: job.rows_processed,
        rows_inserted: job.rows_inserted,
        bytes_read: job.bytes_read,
        percent,
        rate_rows_per_sec: rate,
        elapsed_sec,
        eta_sec,
        started_at: Some(job.started_at),
        updated_at: Some(job.updated_at),
        completed_at: job.completed_at,
        error: job.error.clone(),
        disable_sync: matches!(status, JobStatus::Running),
        recent_customers,
    })
}

async fn fetch_recent_customers(
    db: &DatabaseConnection,
    job: &ImportJobModel,
    recent_limit: u64,
) -> Result<Vec<crate::model::Customer>, DbErr> {
    let rows = CustomerEntity::find()
        .filter(customer::Column::UpdatedAt.gte(job.started_at))
        .order_by_desc(customer::Column::UpdatedAt)
        .limit(recent_limit)
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|m| m.into_tuple()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_limit_is_clamped_into_bounds() {
        assert_eq!(SnapshotParams::new(1000, 0).recent_limit, 1);
        assert_eq!(SnapshotParams::new(1000, 500).recent_limit, 200);
        assert_eq!(SnapshotParams::new(1000, 20).recent_limit, 20);
    }

    #[tokio::test]
    async fn publish_caches_terminal_events_for_late_subscribers() {
        let broker = ProgressBroker::new();
        broker.publish(ProgressEvent::Progress {
            job_id: "job-1".into(),
            rows_processed: "10".into(),
            rows_inserted: "10".into(),
            bytes_read: "100".into(),
            rate: 5.0,
            elapsed_sec: 2.0,
            last_row_hash: None,
        });
        assert!(broker.last_terminal.lock().is_none());

        broker.publish(ProgressEvent::Done {
            job_id: "job-1".into(),
        });
        assert!(matches!(
            *broker.last_terminal.lock(),
            Some(ProgressEvent::Done { .. })
        ));
    }

    #[tokio::test]
    async fn publish_never_blocks_with_no_subscribers() {
        let broker = ProgressBroker::new();
        broker.publish(ProgressEvent::Done {
            job_id: "job-1".into(),
        });
    }

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let broker = ProgressBroker::new();
        let mut rx = broker.subscribe();
        broker.publish(ProgressEvent::Done {
            job_id: "job-2".into(),
        });
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ProgressEvent::Done { job_id } if job_id == "job-2"));
    }
}
