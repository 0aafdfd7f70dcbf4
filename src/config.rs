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

use std::net::SocketAddr;

use clap::Parser;

/// Process-wide configuration, sourced from environment variables (with
/// command-line overrides for local development).
#[derive(Parser, Debug, Clone)]
#[command(name = "customer-importer")]
pub struct Config {
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Default source file path used when a sync request omits `filePath`.
    #[arg(long, env = "CSV_PATH", default_value = "./data/customers.csv")]
    pub csv_path: String,

    /// Address the HTTP listener binds to.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: SocketAddr,

    /// Presentation-only row count used to compute percent/ETA when the
    /// caller does not supply one.
    #[arg(long, env = "IMPORT_TOTAL_ROWS", default_value_t = 2_000_000)]
    pub import_total_rows: i64,

    #[arg(long, env = "IMPORT_BATCH_SIZE", default_value_t = 1000)]
    pub import_batch_size: usize,

    #[arg(long, env = "IMPORT_PROGRESS_EVERY_MS", default_value_t = 1000)]
    pub import_progress_every_ms: u64,

    /// Internal parser read-ahead buffer, in bytes.
    #[arg(long, env = "IMPORT_HIGH_WATER_MARK", default_value_t = 1_048_576)]
    pub import_high_water_mark: usize,

    /// Bytes replayed before the last checkpoint on resume.
    #[arg(long, env = "IMPORT_RESUME_OVERLAP", default_value_t = 1_048_576)]
    pub import_resume_overlap: u64,

    #[arg(long, env = "IMPORT_RECENT_LIMIT", default_value_t = 20)]
    pub import_recent_limit: u64,

    #[arg(long, env = "SSE_HEARTBEAT_MS", default_value_t = 15_000)]
    pub sse_heartbeat_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Config::parse()
    }
}
