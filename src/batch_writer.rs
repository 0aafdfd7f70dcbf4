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

//! Batch Writer. Deduplicates, classifies insert-vs-update, and commits
//! one batch.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, TransactionTrait};

use crate::model::entity::customer::{self, Entity as CustomerEntity};
use crate::model::BatchItem;
use crate::retry::with_retry;

#[derive(Debug, Clone)]
pub struct FlushResult {
    pub affected: u64,
    /// `sourceHash` of the last item after in-batch deduplication; the
    /// new resume marker. `None` for an empty batch.
    pub last_hash: Option<String>,
}

/// Commits one batch. Empty batches are a no-op that does not touch the
/// database.
pub async fn flush(db: &DatabaseConnection, items: Vec<BatchItem>) -> Result<FlushResult, DbErr> {
    if items.is_empty() {
        return Ok(FlushResult {
            affected: 0,
            last_hash: None,
        });
    }

    // The last item in arrival order always survives dedup, because dedup
    // keeps the latest occurrence of each customerId and this is the last
    // occurrence of its own customerId.
    let last_hash = items.last().unwrap().source_hash.clone();

    let mut dedup: HashMap<String, BatchItem> = HashMap::with_capacity(items.len());
    for item in items {
        dedup.insert(item.customer.customer_id.clone(), item);
    }

    let ids: Vec<String> = dedup.keys().cloned().collect();
    let existing: HashSet<String> = with_retry("batch_writer::find_existing", || async {
        CustomerEntity::find()
            .filter(customer::Column::CustomerId.is_in(ids.clone()))
            .all(db)
            .await
    })
    .await?
    .into_iter()
    .map(|m| m.customer_id)
    .collect();

    let now = Utc::now();
    let mut to_insert = Vec::new();
    let mut to_update = Vec::new();
    for item in dedup.into_values() {
        if existing.contains(&item.customer.customer_id) {
            to_update.push(item);
        } else {
            to_insert.push(item);
        }
    }

    let mut affected = 0u64;

    if !to_insert.is_empty() {
        let active_models: Vec<customer::ActiveModel> = to_insert
            .iter()
            .map(|item| customer::ActiveModel::from_tuple(&item.customer, now))
            .collect();
        // `do_nothing` is the safety net for duplicate keys that arrive
        // through an overlapping resume window.
        let inserted = with_retry("batch_writer::insert_many", || {
            let active_models = active_models.clone();
            async move {
                CustomerEntity::insert_many(active_models)
                    .on_conflict(
                        OnConflict::column(customer::Column::CustomerId)
                            .do_nothing()
                            .to_owned(),
                    )
                    .exec_without_returning(db)
                    .await
            }
        })
        .await?;
        affected += inserted;
    }

    if !to_update.is_empty() {
        // The whole transaction is re-run from scratch on a retry; every
        // statement inside is idempotent (re-applying the same update
        // twice is harmless), so restarting after a deadlock is safe.
        let updated = with_retry("batch_writer::update_txn", || async {
            let txn = db.begin().await?;
            let mut count = 0u64;
            for item in &to_update {
                if let Some(model) = CustomerEntity::find()
                    .filter(customer::Column::CustomerId.eq(item.customer.customer_id.clone()))
                    .one(&txn)
                    .await?
                {
                    let mut active: customer::ActiveModel = model.into();
                    active.apply_update(&item.customer, now);
                    active.update(&txn).await?;
                    count += 1;
                }
            }
            txn.commit().await?;
            Ok(count)
        })
        .await?;
        affected += updated;
    }

    Ok(FlushResult {
        affected,
        last_hash: Some(last_hash),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Customer;

    fn item(customer_id: &str, first_name: &str, hash: &str) -> BatchItem {
        BatchItem {
            customer: Customer {
                customer_id: customer_id.to_string(),
                first_name: Some(first_name.to_string()),
                ..Default::default()
            },
            source_hash: hash.to_string(),
        }
    }

    #[test]
    fn dedup_keeps_last_occurrence_and_its_hash() {
        let items = vec![
            item("C001", "Alice", "h1"),
            item("C001", "Alicia", "h2"),
            item("C002", "Bob", "h3"),
        ];
        let last_hash = items.last().unwrap().source_hash.clone();
        let mut dedup: HashMap<String, BatchItem> = HashMap::new();
        for i in items {
            dedup.insert(i.customer.customer_id.clone(), i);
        }
        assert_eq!(dedup.len(), 2);
        assert_eq!(dedup["C001"].customer.first_name.as_deref(), Some("Alicia"));
        assert_eq!(last_hash, "h3");
    }
}
