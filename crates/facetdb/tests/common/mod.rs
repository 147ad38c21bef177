//! Shared fixtures for the scenario tests.
#![allow(dead_code)] // not every test binary touches every helper

use chrono::{DateTime, Utc};
use facetdb::{
    db::Db,
    model::{self, Record},
    store::memory::MemoryStore,
    value::Value,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

///
/// MyModel
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MyModel {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub updated_hash: Option<String>,
    pub name: String,
    pub age: i64,
    pub money: Decimal,
}

impl MyModel {
    pub fn new(name: &str, age: i64, money: Decimal) -> Self {
        Self::with_id(&model::new_record_id(), name, age, money)
    }

    pub fn with_id(id: &str, name: &str, age: i64, money: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            created_at: now,
            updated_at: now,
            updated_hash: None,
            name: name.to_string(),
            age,
            money,
        }
    }
}

impl Record for MyModel {
    const ENTITY_NAME: &'static str = "MyModel";

    fn id(&self) -> &str {
        &self.id
    }

    fn updated_hash(&self) -> Option<&str> {
        self.updated_hash.as_deref()
    }

    fn refresh_updated(&mut self, hash: String, at: DateTime<Utc>) {
        self.updated_hash = Some(hash);
        self.updated_at = at;
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(self.id.as_str().into()),
            "name" => Some(self.name.as_str().into()),
            "age" => Some(self.age.into()),
            "money" => Some(self.money.into()),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> bool {
        match (name, value) {
            ("name", Value::String(s)) => {
                self.name = s;
                true
            }
            ("age", Value::Int(n)) => {
                self.age = n;
                true
            }
            ("money", Value::Decimal(d)) => {
                self.money = d;
                true
            }
            _ => false,
        }
    }
}

/// A fresh in-memory table and a database over it. The store handle stays
/// available for raw scan assertions.
pub fn empty_db() -> (Arc<MemoryStore>, Db) {
    let store = Arc::new(MemoryStore::new());
    let db = Db::new(store.clone());
    (store, db)
}

/// Every `(pk, sk)` pair currently persisted, in key order.
pub fn scan_keys(store: &MemoryStore) -> Vec<(String, String)> {
    store
        .scan()
        .iter()
        .map(|row| {
            (
                row["pk"].as_str().unwrap().to_string(),
                row["sk"].as_str().unwrap().to_string(),
            )
        })
        .collect()
}
