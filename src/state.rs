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

//! Composition root, analogous in spirit to `MetaSrvEnv` in
//! `src/meta/src/manager/env.rs`: one long-lived handle shared across
//! every request, holding only the DB pool, the broker, and the
//! supervisor singleton.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::broker::ProgressBroker;
use crate::config::Config;
use crate::supervisor::WorkerSupervisor;

pub struct AppState {
    pub db: DatabaseConnection,
    pub broker: Arc<ProgressBroker>,
    pub supervisor: Arc<WorkerSupervisor>,
    pub config: Config,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config) -> Arc<Self> {
        let broker = ProgressBroker::new();
        let supervisor = WorkerSupervisor::new(
            db.clone(),
            broker.clone(),
            config.csv_path.clone(),
            config.import_resume_overlap,
            config.import_high_water_mark,
        );
        Arc::new(Self {
            db,
            broker,
            supervisor,
            config,
        })
    }
}
