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

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

use crate::model::Customer as CustomerTuple;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "customer")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
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
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn into_tuple(self) -> CustomerTuple {
        CustomerTuple {
            customer_id: self.customer_id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            company: self.company,
            city: self.city,
            country: self.country,
            phone1: self.phone1,
            phone2: self.phone2,
            website: self.website,
            about_customer: self.about_customer,
            subscription_date: self.subscription_date,
        }
    }
}

impl ActiveModel {
    /// Builds an `ActiveModel` ready for `insert_many`; `id` is left unset
    /// so the database assigns the surrogate key.
    pub fn from_tuple(tuple: &CustomerTuple, now: DateTime<Utc>) -> Self {
        ActiveModel {
            id: ActiveValue::NotSet,
            customer_id: ActiveValue::Set(tuple.customer_id.clone()),
            first_name: ActiveValue::Set(tuple.first_name.clone()),
            last_name: ActiveValue::Set(tuple.last_name.clone()),
            email: ActiveValue::Set(tuple.email.clone()),
            company: ActiveValue::Set(tuple.company.clone()),
            city: ActiveValue::Set(tuple.city.clone()),
            country: ActiveValue::Set(tuple.country.clone()),
            phone1: ActiveValue::Set(tuple.phone1.clone()),
            phone2: ActiveValue::Set(tuple.phone2.clone()),
            website: ActiveValue::Set(tuple.website.clone()),
            about_customer: ActiveValue::Set(tuple.about_customer.clone()),
            subscription_date: ActiveValue::Set(tuple.subscription_date),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        }
    }

    /// Applies `tuple`'s fields onto an existing row for the update path;
    /// `id` and `created_at` are left untouched.
    pub fn apply_update(&mut self, tuple: &CustomerTuple, now: DateTime<Utc>) {
        self.customer_id = ActiveValue::Set(tuple.customer_id.clone());
        self.first_name = ActiveValue::Set(tuple.first_name.clone());
        self.last_name = ActiveValue::Set(tuple.last_name.clone());
        self.email = ActiveValue::Set(tuple.email.clone());
        self.company = ActiveValue::Set(tuple.company.clone());
        self.city = ActiveValue::Set(tuple.city.clone());
        self.country = ActiveValue::Set(tuple.country.clone());
        self.phone1 = ActiveValue::Set(tuple.phone1.clone());
        self.phone2 = ActiveValue::Set(tuple.phone2.clone());
        self.website = ActiveValue::Set(tuple.website.clone());
        self.about_customer = ActiveValue::Set(tuple.about_customer.clone());
        self.subscription_date = ActiveValue::Set(tuple.subscription_date);
        self.updated_at = ActiveValue::Set(now);
    }
}
