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

//! HTTP surface. Routing mirrors `src/meta/src/dashboard/mod.rs`'s
//! `axum::Router` + extension-state style, trimmed of the dashboard's
//! UI-serving concerns this service doesn't have.

mod customers;
mod sync;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/customers/sync", post(sync::start_sync))
        .route("/api/v1/customers/progress", get(sync::progress))
        .route("/api/v1/customers/progress/stream", get(sync::progress_stream))
        .route(
            "/api/v1/customers",
            get(customers::list).post(customers::create),
        )
        .route(
            "/api/v1/customers/:id",
            get(customers::get_one)
                .patch(customers::update)
                .delete(customers::delete),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http().on_request(
            |request: &axum::http::Request<_>, _span: &tracing::Span| {
                tracing::debug!(method = %request.method(), path = %request.uri(), "request");
            },
        ))
        .with_state(state)
}
