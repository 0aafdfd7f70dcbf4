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

//! Record Mapper. Normalizes a parsed CSV row into a [`Customer`] tuple
//! and computes its stable fingerprint.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sha2::{Digest, Sha256};

use crate::model::Customer;

const ALIASES_CUSTOMER_ID: &[&str] = &["customerid", "customer_id", "customer id", "id"];
const ALIASES_FIRST_NAME: &[&str] = &["firstname", "first_name", "first name"];
const ALIASES_LAST_NAME: &[&str] = &["lastname", "last_name", "last name"];
const ALIASES_FULL_NAME: &[&str] = &["name", "fullname", "full_name", "full name"];
const ALIASES_COMPANY: &[&str] = &["company", "company name", "companyname"];
const ALIASES_CITY: &[&str] = &["city"];
const ALIASES_COUNTRY: &[&str] = &["country"];
const ALIASES_PHONE1: &[&str] = &["phone1", "phone_1", "phone 1", "phone"];
const ALIASES_PHONE2: &[&str] = &["phone2", "phone_2", "phone 2"];
const ALIASES_EMAIL: &[&str] = &["email", "e-mail", "email address"];
const ALIASES_SUBSCRIPTION_DATE: &[&str] =
    &["subscriptiondate", "subscription_date", "subscription date"];
const ALIASES_WEBSITE: &[&str] = &["website", "web site", "web_site"];
const ALIASES_ABOUT: &[&str] = &["aboutcustomer", "about_customer", "about customer", "about"];

/// Collapses case and separator variance so "Customer Id", "customer_id"
/// and "customerid" all resolve to the same key.
fn normalize_header(h: &str) -> String {
    h.trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, '_' | '-' | ' '))
        .collect()
}

fn lookup<'a>(index: &'a HashMap<String, &'a str>, aliases: &[&str]) -> Option<&'a str> {
    aliases.iter().find_map(|alias| {
        let key = normalize_header(alias);
        index.get(&key).copied()
    })
}

fn clean(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Permissive date parsing: tries a handful of common export formats before
/// giving up. Unparseable dates are omitted rather than failing the row.
fn parse_subscription_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(DateTime::from_naive_utc_and_offset(ndt, Utc));
    }
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d"];
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(
                d.and_hms_opt(0, 0, 0).unwrap(),
                Utc,
            ));
        }
    }
    None
}

/// Maps a raw `header -> value` row into a [`Customer`], or `None` when
/// the row has no usable identifier (neither `customerId` nor `email`
/// present). A `None` return means the row is skipped, not failed.
pub fn map_record(record: &HashMap<String, String>) -> Option<Customer> {
    let index: HashMap<String, &str> = record
        .iter()
        .map(|(k, v)| (normalize_header(k), v.as_str()))
        .collect();

    let customer_id = clean(lookup(&index, ALIASES_CUSTOMER_ID));
    let email = clean(lookup(&index, ALIASES_EMAIL)).map(|e| e.to_lowercase());

    let effective_id = customer_id.clone().or_else(|| email.clone())?;

    let mut first_name = clean(lookup(&index, ALIASES_FIRST_NAME));
    let mut last_name = clean(lookup(&index, ALIASES_LAST_NAME));
    if first_name.is_none() {
        if let Some(full) = clean(lookup(&index, ALIASES_FULL_NAME)) {
            let mut parts = full.split_whitespace();
            first_name = parts.next().map(str::to_string);
            let rest: Vec<&str> = parts.collect();
            if !rest.is_empty() {
                last_name = Some(rest.join(" "));
            }
        }
    }

    let subscription_date = lookup(&index, ALIASES_SUBSCRIPTION_DATE).and_then(parse_subscription_date);

    Some(Customer {
        customer_id: customer_id.unwrap_or(effective_id),
        first_name,
        last_name,
        email,
        company: clean(lookup(&index, ALIASES_COMPANY)),
        city: clean(lookup(&index, ALIASES_CITY)),
        country: clean(lookup(&index, ALIASES_COUNTRY)),
        phone1: clean(lookup(&index, ALIASES_PHONE1)),
        phone2: clean(lookup(&index, ALIASES_PHONE2)),
        website: clean(lookup(&index, ALIASES_WEBSITE)),
        about_customer: clean(lookup(&index, ALIASES_ABOUT)),
        subscription_date,
    })
}

/// SHA-256 over a fixed field order, pipe-joined. Deterministic
/// regardless of the source row's header case or order.
pub fn hash_customer(customer: &Customer) -> String {
    let parts = [
        customer.customer_id.as_str(),
        customer.first_name.as_deref().unwrap_or(""),
        customer.last_name.as_deref().unwrap_or(""),
        customer.company.as_deref().unwrap_or(""),
        customer.city.as_deref().unwrap_or(""),
        customer.country.as_deref().unwrap_or(""),
        customer.phone1.as_deref().unwrap_or(""),
        customer.phone2.as_deref().unwrap_or(""),
        customer.email.as_deref().unwrap_or(""),
        &customer
            .subscription_date
            .map(|d| d.to_rfc3339())
            .unwrap_or_default(),
        customer.website.as_deref().unwrap_or(""),
        customer.about_customer.as_deref().unwrap_or(""),
    ];
    let joined = parts.join("|");
    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn resolves_aliased_headers_case_insensitively() {
        let r = row(&[("Customer Id", "C001"), ("First Name", "Alice"), ("Email", "Alice@X.com")]);
        let c = map_record(&r).expect("mapped");
        assert_eq!(c.customer_id, "C001");
        assert_eq!(c.first_name.as_deref(), Some("Alice"));
        assert_eq!(c.email.as_deref(), Some("alice@x.com"));
    }

    #[test]
    fn splits_full_name_when_first_name_absent() {
        let r = row(&[("customer_id", "C002"), ("full_name", "Jane   Q. Public")]);
        let c = map_record(&r).unwrap();
        assert_eq!(c.first_name.as_deref(), Some("Jane"));
        assert_eq!(c.last_name.as_deref(), Some("Q. Public"));
    }

    #[test]
    fn missing_identifier_is_skipped() {
        let r = row(&[("first_name", "Nobody")]);
        assert!(map_record(&r).is_none());
    }

    #[test]
    fn email_fallback_identifier() {
        let r = row(&[("Email", "someone@example.com")]);
        let c = map_record(&r).unwrap();
        assert_eq!(c.customer_id, "someone@example.com");
    }

    #[test]
    fn hash_is_deterministic_and_order_independent() {
        let r1 = row(&[("Customer Id", "C001"), ("First Name", "Alice"), ("Email", "a@x.com")]);
        let r2 = row(&[("Email", "a@x.com"), ("First Name", "Alice"), ("Customer Id", "C001")]);
        let c1 = map_record(&r1).unwrap();
        let c2 = map_record(&r2).unwrap();
        assert_eq!(hash_customer(&c1), hash_customer(&c2));
    }

    #[test]
    fn unparseable_subscription_date_is_omitted() {
        let r = row(&[("customer_id", "C003"), ("subscription_date", "not-a-date")]);
        let c = map_record(&r).unwrap();
        assert!(c.subscription_date.is_none());
    }
}
