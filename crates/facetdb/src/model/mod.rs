pub mod registry;

use crate::{error::Error, value::{FieldValue, Value}};
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use ulid::Ulid;

///
/// Record
///
/// A registered entity type. Implementations supply the serde-backed
/// canonical form plus by-name field access — the registration-time
/// descriptor that replaces reflective lookup: a match table over the
/// type's own fields, written once per type.
///
/// Every record carries four common fields serialized alongside its domain
/// fields: `id`, `created_at`, `updated_at`, `updated_hash`.
///

pub trait Record: Serialize + DeserializeOwned {
    /// Stable external name used in keys, registration, and routing.
    const ENTITY_NAME: &'static str;

    fn id(&self) -> &str;

    fn updated_hash(&self) -> Option<&str>;

    /// Install a freshly computed content fingerprint and touch
    /// `updated_at`.
    fn refresh_updated(&mut self, hash: String, at: DateTime<Utc>);

    /// Read one field by its declared name. `None` means the name does not
    /// exist on this type and surfaces as `FieldMisconfiguration`.
    fn field(&self, name: &str) -> Option<Value>;

    /// Write one field by name. Returns false when the name is unknown or
    /// the value kind does not fit the field.
    fn set_field(&mut self, name: &str, value: Value) -> bool;
}

/// Fresh sortable record id.
#[must_use]
pub fn new_record_id() -> String {
    Ulid::new().to_string()
}

/// Canonical serialized form persisted as `raw_data`.
pub fn canonical_json<R: Record>(record: &R) -> Result<String, Error> {
    Ok(serde_json::to_string(record)?)
}

/// Content fingerprint over the canonical form minus the two bookkeeping
/// fields it feeds (`updated_hash`, `updated_at`).
pub fn content_hash<R: Record>(record: &R) -> Result<String, Error> {
    let mut doc = serde_json::to_value(record)?;
    if let Some(map) = doc.as_object_mut() {
        map.remove("updated_hash");
        map.remove("updated_at");
    }
    Ok(format!("{:x}", md5::compute(doc.to_string())))
}

/// Pluck `names` off `record` in order, failing on the first name the type
/// does not declare.
pub fn fetch_field_values<R: Record>(
    record: &R,
    names: &[String],
) -> Result<Vec<FieldValue>, Error> {
    names
        .iter()
        .map(|name| {
            record
                .field(name)
                .map(|value| FieldValue {
                    name: name.clone(),
                    value,
                })
                .ok_or_else(|| Error::field_misconfiguration(R::ENTITY_NAME, name))
        })
        .collect()
}

///
/// UniqueIndex
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UniqueIndex {
    pub unique_fields: Vec<String>,
}

impl UniqueIndex {
    pub fn new<S: Into<String>>(unique_fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            unique_fields: unique_fields.into_iter().map(Into::into).collect(),
        }
    }
}

///
/// QueryIndex
///
/// Ordered retrieval: equality over `partition_fields`, range over the
/// leading `sort_fields`. Field order is significant.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QueryIndex {
    pub partition_fields: Vec<String>,
    pub sort_fields: Vec<String>,
}

impl QueryIndex {
    pub fn new<P: Into<String>, S: Into<String>>(
        partition_fields: impl IntoIterator<Item = P>,
        sort_fields: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            partition_fields: partition_fields.into_iter().map(Into::into).collect(),
            sort_fields: sort_fields.into_iter().map(Into::into).collect(),
        }
    }

    /// Partition fields then sort fields, the only order statements may
    /// extend along.
    pub fn all_fields(&self) -> impl Iterator<Item = &str> {
        self.partition_fields
            .iter()
            .chain(&self.sort_fields)
            .map(String::as_str)
    }
}

///
/// Index
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Index {
    Unique(UniqueIndex),
    Query(QueryIndex),
}

impl From<UniqueIndex> for Index {
    fn from(index: UniqueIndex) -> Self {
        Self::Unique(index)
    }
}

impl From<QueryIndex> for Index {
    fn from(index: QueryIndex) -> Self {
        Self::Query(index)
    }
}

///
/// ModelSpec
///
/// Everything registration declares about a record type.
///

#[derive(Clone, Debug, Default)]
pub struct ModelSpec {
    pub indices: Vec<Index>,
    pub encrypted_fields: Vec<String>,
    pub counter_fields: Vec<String>,
    pub auto_decrypt: bool,
}

impl ModelSpec {
    pub fn new(indices: impl IntoIterator<Item = Index>) -> Self {
        Self {
            indices: indices.into_iter().collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_encrypted_fields<S: Into<String>>(
        mut self,
        fields: impl IntoIterator<Item = S>,
    ) -> Self {
        self.encrypted_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_counter_fields<S: Into<String>>(
        mut self,
        fields: impl IntoIterator<Item = S>,
    ) -> Self {
        self.counter_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn with_auto_decrypt(mut self, auto_decrypt: bool) -> Self {
        self.auto_decrypt = auto_decrypt;
        self
    }

    /// Query indices in declaration order, the order fit-selection scans.
    pub(crate) fn query_indices(&self) -> impl Iterator<Item = &QueryIndex> {
        self.indices.iter().filter_map(|index| match index {
            Index::Query(query) => Some(query),
            Index::Unique(_) => None,
        })
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct Probe {
        id: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        updated_hash: Option<String>,
        name: String,
        age: i64,
    }

    impl Record for Probe {
        const ENTITY_NAME: &'static str = "Probe";

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
                _ => false,
            }
        }
    }

    fn probe() -> Probe {
        Probe {
            id: new_record_id(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            updated_hash: None,
            name: "John".to_string(),
            age: 30,
        }
    }

    #[test]
    fn content_hash_ignores_bookkeeping_fields() {
        let mut record = probe();
        let before = content_hash(&record).unwrap();
        record.refresh_updated("whatever".to_string(), Utc::now());
        assert_eq!(content_hash(&record).unwrap(), before);
    }

    #[test]
    fn content_hash_tracks_domain_fields() {
        let mut record = probe();
        let before = content_hash(&record).unwrap();
        record.age = 31;
        assert_ne!(content_hash(&record).unwrap(), before);
    }

    #[test]
    fn fetch_field_values_flags_unknown_fields() {
        let record = probe();
        let err = fetch_field_values(&record, &["height".to_string()]).unwrap_err();
        assert!(matches!(err, Error::FieldMisconfiguration { .. }));
    }

    #[test]
    fn fetch_field_values_keeps_declaration_order() {
        let record = probe();
        let values =
            fetch_field_values(&record, &["age".to_string(), "name".to_string()]).unwrap();
        assert_eq!(values[0].name, "age");
        assert_eq!(values[1].name, "name");
    }
}
