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

pub mod entity;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Domain tuple produced by the Record Mapper and consumed by the Batch
/// Writer. Distinct from the sea-orm entity so the mapper has no
/// database dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub phone1: Option<String>,
    pub phone2: Option<String>,
    pub website: Option<String>,
    pub about_customer: Option<String>,
    pub subscription_date: Option<DateTime<Utc>>,
}

/// An in-memory unit of work between the Mapper and the Batch Writer.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub customer: Customer,
    pub source_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Idle => "IDLE",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IDLE" => Ok(JobStatus::Idle),
            "RUNNING" => Ok(JobStatus::Running),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(anyhow::anyhow!("unknown job status {other}")),
        }
    }
}

/// The durable resume checkpoint, passed from the Job Store to a resumed
/// Worker.
#[derive(Debug, Clone)]
pub struct ResumeCheckpoint {
    pub start_bytes: u64,
    pub overlap_bytes: u64,
    pub last_row_hash: Option<String>,
    pub rows_processed: i64,
    pub rows_inserted: i64,
}

/// A live event published by the Worker to the Progress Broker and
/// bridged verbatim by the Supervisor.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "camelCase")]
pub enum ProgressEvent {
    #[serde(rename = "progress")]
    Progress {
        job_id: String,
        rows_processed: String,
        rows_inserted: String,
        bytes_read: String,
        rate: f64,
        elapsed_sec: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        last_row_hash: Option<String>,
    },
    #[serde(rename = "done")]
    Done { job_id: String },
    #[serde(rename = "error")]
    Error { job_id: String, error: String },
    #[serde(rename = "heartbeat")]
    Heartbeat { ts: DateTime<Utc> },
}

/// One frame of the live SSE stream: either the initial snapshot, a
/// worker-published event, or a heartbeat.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SseFrame {
    Snapshot {
        #[serde(rename = "type")]
        kind: SnapshotTag,
        #[serde(flatten)]
        snapshot: ProgressSnapshot,
    },
    Event(ProgressEvent),
}

#[derive(Debug, Clone, Copy, Serialize)]
pub enum SnapshotTag {
    #[serde(rename = "snapshot")]
    Snapshot,
}

impl SseFrame {
    pub fn snapshot(snapshot: ProgressSnapshot) -> Self {
        SseFrame::Snapshot {
            kind: SnapshotTag::Snapshot,
            snapshot,
        }
    }
}

/// The derived, never-stored progress view returned by snapshot reads
/// and as the first frame of every live subscription.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub job_id: Option<String>,
    pub status: JobStatus,
    pub rows_processed: i64,
    pub rows_inserted: i64,
    pub bytes_read: i64,
    pub percent: f64,
    pub rate_rows_per_sec: f64,
    pub elapsed_sec: f64,
    pub eta_sec: Option<i64>,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub disable_sync: bool,
    pub recent_customers: Vec<Customer>,
}
