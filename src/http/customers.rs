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

//! The Customer CRUD surface. Not exercised by the import pipeline
//! itself; kept so ingested rows are reachable through ordinary REST
//! calls rather than only through the progress snapshot's `recentCustomers`
//! slice.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::model::entity::customer::{self, Entity as CustomerEntity};
use crate::model::Customer;
use crate::state::AppState;

const DEFAULT_LIMIT: u64 = 50;
const MAX_LIMIT: u64 = 500;

#[derive(Debug, Deserialize, Default)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub data: Vec<Customer>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> AppResult<Json<ListResponse>> {
    let page = q.page.unwrap_or(1).max(1);
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let paginator = CustomerEntity::find()
        .order_by_asc(customer::Column::Id)
        .paginate(&state.db, limit);
    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(page - 1).await?;

    Ok(Json(ListResponse {
        data: rows.into_iter().map(|m| m.into_tuple()).collect(),
        page,
        limit,
        total,
    }))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Customer>,
) -> AppResult<(StatusCode, Json<Customer>)> {
    if body.customer_id.trim().is_empty() {
        return Err(AppError::Validation("customerId is required".into()));
    }
    let now = Utc::now();
    let active = customer::ActiveModel::from_tuple(&body, now);
    let inserted = active.insert(&state.db).await?;
    Ok((StatusCode::CREATED, Json(inserted.into_tuple())))
}

async fn find_or_404(state: &AppState, customer_id: &str) -> AppResult<customer::Model> {
    CustomerEntity::find()
        .filter(customer::Column::CustomerId.eq(customer_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("customer {customer_id}")))
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<String>,
) -> AppResult<Json<Customer>> {
    let model = find_or_404(&state, &customer_id).await?;
    Ok(Json(model.into_tuple()))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<String>,
    Json(mut body): Json<Customer>,
) -> AppResult<Json<Customer>> {
    let model = find_or_404(&state, &customer_id).await?;
    body.customer_id = customer_id;
    let mut active: customer::ActiveModel = model.into();
    active.apply_update(&body, Utc::now());
    let updated = active.update(&state.db).await?;
    Ok(Json(updated.into_tuple()))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(customer_id): Path<String>,
) -> AppResult<StatusCode> {
    let model = find_or_404(&state, &customer_id).await?;
    CustomerEntity::delete_by_id(model.id).exec(&state.db).await?;
    Ok(StatusCode::NO_CONTENT)
}
