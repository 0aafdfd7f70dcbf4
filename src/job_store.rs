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

//! Job Store. Durable `ImportJob` rows. There is no schema-level
//! singleton constraint; the Worker Supervisor enforces "at most one
//! RUNNING job" above this layer.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder,
};

use crate::model::entity::import_job::{self, Entity as ImportJobEntity, Model};
use crate::model::JobStatus;
use crate::retry::with_retry;

pub async fn create(db: &DatabaseConnection, id: &str, file_path: &str) -> Result<Model, DbErr> {
    let now = Utc::now();
    let active = import_job::ActiveModel {
        id: ActiveValue::Set(id.to_string()),
        file_path: ActiveValue::Set(file_path.to_string()),
        status: ActiveValue::Set(JobStatus::Running.as_str().to_string()),
        bytes_read: ActiveValue::Set(0),
        rows_processed: ActiveValue::Set(0),
        rows_inserted: ActiveValue::Set(0),
        last_row_hash: ActiveValue::Set(None),
        started_at: ActiveValue::Set(now),
        completed_at: ActiveValue::Set(None),
        updated_at: ActiveValue::Set(now),
        error: ActiveValue::Set(None),
    };
    active.insert(db).await
}

pub async fn find_latest_running(db: &DatabaseConnection) -> Result<Option<Model>, DbErr> {
    ImportJobEntity::find()
        .filter(import_job::Column::Status.eq(JobStatus::Running.as_str()))
        .order_by_desc(import_job::Column::UpdatedAt)
        .one(db)
        .await
}

pub async fn find_latest(db: &DatabaseConnection) -> Result<Option<Model>, DbErr> {
    ImportJobEntity::find()
        .order_by_desc(import_job::Column::UpdatedAt)
        .one(db)
        .await
}

pub async fn find_by_id(db: &DatabaseConnection, id: &str) -> Result<Option<Model>, DbErr> {
    ImportJobEntity::find_by_id(id.to_string()).one(db).await
}

/// Writes `{bytesRead, rowsProcessed, rowsInserted, lastRowHash, updatedAt}`
/// in one statement, so a resume always observes a consistent checkpoint.
pub async fn update_progress(
    db: &DatabaseConnection,
    id: &str,
    bytes_read: i64,
    rows_processed: i64,
    rows_inserted: i64,
    last_row_hash: Option<String>,
) -> Result<(), DbErr> {
    with_retry("job_store::update_progress", || {
        let last_row_hash = last_row_hash.clone();
        async move {
            let mut active = import_job::ActiveModel {
                id: ActiveValue::Unchanged(id.to_string()),
                ..Default::default()
            };
            active.bytes_read = ActiveValue::Set(bytes_read);
            active.rows_processed = ActiveValue::Set(rows_processed);
            active.rows_inserted = ActiveValue::Set(rows_inserted);
            active.last_row_hash = ActiveValue::Set(last_row_hash);
            active.updated_at = ActiveValue::Set(Utc::now());
            active.update(db).await?;
            Ok(())
        }
    })
    .await
}

pub async fn mark_completed(db: &DatabaseConnection, id: &str) -> Result<(), DbErr> {
    with_retry("job_store::mark_completed", || async {
        let now = Utc::now();
        let mut active = import_job::ActiveModel {
            id: ActiveValue::Unchanged(id.to_string()),
            ..Default::default()
        };
        active.status = ActiveValue::Set(JobStatus::Completed.as_str().to_string());
        active.completed_at = ActiveValue::Set(Some(now));
        active.updated_at = ActiveValue::Set(now);
        active.update(db).await?;
        Ok(())
    })
    .await
}

pub async fn mark_failed(db: &DatabaseConnection, id: &str, error: &str) -> Result<(), DbErr> {
    with_retry("job_store::mark_failed", || async {
        let now = Utc::now();
        let mut active = import_job::ActiveModel {
            id: ActiveValue::Unchanged(id.to_string()),
            ..Default::default()
        };
        active.status = ActiveValue::Set(JobStatus::Failed.as_str().to_string());
        active.error = ActiveValue::Set(Some(error.to_string()));
        active.updated_at = ActiveValue::Set(now);
        active.update(db).await?;
        Ok(())
    })
    .await
}
