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

//! Binary entrypoint: wires config, the database pool, the HTTP router
//! and the Worker Supervisor together, then serves until a shutdown
//! signal arrives.

mod batch_writer;
mod broker;
mod config;
mod error;
mod http;
mod mapper;
mod migration;
mod model;
mod job_store;
mod parser;
mod retry;
mod state;
mod supervisor;
mod worker;

use sea_orm_migration::MigratorTrait;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::migration::Migrator;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    tracing::info!(listen_addr = %config.listen_addr, csv_path = %config.csv_path, "starting customer-importer");

    let db = sea_orm::Database::connect(&config.database_url).await?;
    Migrator::up(&db, None).await?;

    let state = AppState::new(db, config.clone());
    state.supervisor.reconcile_on_boot().await?;

    let app = http::router(state.clone());
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    tracing::info!(addr = %config.listen_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

async fn shutdown_signal(state: std::sync::Arc<AppState>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining active import job");
    state.supervisor.shutdown().await;
}
