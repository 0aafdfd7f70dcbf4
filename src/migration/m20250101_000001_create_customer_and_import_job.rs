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

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Customer::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Customer::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Customer::CustomerId).string().not_null())
                    .col(ColumnDef::new(Customer::FirstName).string())
                    .col(ColumnDef::new(Customer::LastName).string())
                    .col(ColumnDef::new(Customer::Email).string())
                    .col(ColumnDef::new(Customer::Company).string())
                    .col(ColumnDef::new(Customer::City).string())
                    .col(ColumnDef::new(Customer::Country).string())
                    .col(ColumnDef::new(Customer::Phone1).string())
                    .col(ColumnDef::new(Customer::Phone2).string())
                    .col(ColumnDef::new(Customer::Website).string())
                    .col(ColumnDef::new(Customer::AboutCustomer).text())
                    .col(ColumnDef::new(Customer::SubscriptionDate).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Customer::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Customer::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_customer_customer_id")
                    .table(Customer::Table)
                    .col(Customer::CustomerId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_customer_updated_at")
                    .table(Customer::Table)
                    .col(Customer::UpdatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(ImportJob::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(ImportJob::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(ImportJob::FilePath).string().not_null())
                    .col(ColumnDef::new(ImportJob::Status).string().not_null())
                    .col(
                        ColumnDef::new(ImportJob::BytesRead)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ImportJob::RowsProcessed)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ImportJob::RowsInserted)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(ImportJob::LastRowHash).string())
                    .col(
                        ColumnDef::new(ImportJob::StartedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ImportJob::CompletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(ImportJob::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ImportJob::Error).text())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_import_job_status")
                    .table(ImportJob::Table)
                    .col(ImportJob::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_import_job_updated_at")
                    .table(ImportJob::Table)
                    .col(ImportJob::UpdatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ImportJob::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Customer::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Customer {
    Table,
    Id,
    CustomerId,
    FirstName,
    LastName,
    Email,
    Company,
    City,
    Country,
    Phone1,
    Phone2,
    Website,
    AboutCustomer,
    SubscriptionDate,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum ImportJob {
    Table,
    Id,
    FilePath,
    Status,
    BytesRead,
    RowsProcessed,
    RowsInserted,
    LastRowHash,
    StartedAt,
    CompletedAt,
    UpdatedAt,
    Error,
}
