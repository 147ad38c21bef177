//! In-memory conformant store.
//!
//! Backs the test suite and small tools. Linearizable by construction (one
//! mutex around the row map), so the `consistent` read flag is a no-op here;
//! conditions, per-item cancellation reasons, pagination, and both global
//! indexes behave as a real driver must.

use crate::{
    key::NodeKey,
    store::{
        CancellationReason, KeyCondition, QueryPage, QueryRequest, Row, Store, StoreError,
        StoreIndex, UpdateExpr, WriteCondition, WriteItem,
    },
};
use chrono::{DateTime, Utc};
use std::{collections::BTreeMap, sync::Mutex};

type RowMap = BTreeMap<(String, String), Row>;

///
/// MemoryStore
///

#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<RowMap>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every persisted row in key order. Test-assertion helper; not part of
    /// the store contract.
    #[must_use]
    pub fn scan(&self) -> Vec<Row> {
        self.rows.lock().unwrap().values().cloned().collect()
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

impl Store for MemoryStore {
    fn get(&self, pk: &str, sk: &str, _consistent: bool) -> Result<Option<Row>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.get(&(pk.to_string(), sk.to_string())).cloned())
    }

    fn query(&self, request: &QueryRequest) -> Result<QueryPage, StoreError> {
        let rows = self.rows.lock().unwrap();
        let mut matched = match request.index {
            StoreIndex::Primary => query_primary(&rows, &request.condition),
            StoreIndex::IdsOnly => query_ids_only(&rows, &request.condition)?,
            StoreIndex::ModelScan => query_model_scan(&rows, &request.condition),
        };

        if !request.scan_forward {
            matched.reverse();
        }

        let start = match &request.start_key {
            None => 0,
            Some(key) => matched
                .iter()
                .position(|(candidate, _)| candidate == key)
                .map_or(0, |at| at + 1),
        };

        let remaining = &matched[start.min(matched.len())..];
        let page: Vec<_> = remaining.iter().take(request.limit).cloned().collect();
        let last_evaluated_key = if remaining.len() > page.len() {
            page.last().map(|(key, _)| key.clone())
        } else {
            None
        };

        Ok(QueryPage {
            rows: page.into_iter().map(|(_, row)| row).collect(),
            last_evaluated_key,
        })
    }

    fn put(&self, row: Row, condition: Option<WriteCondition>) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        let key = primary_key_of(&row)?;
        if let Some(condition) = &condition {
            if !condition_holds(&rows, &key, condition) {
                return Err(StoreError::ConditionalCheckFailed {
                    pk: key.0,
                    sk: key.1,
                });
            }
        }
        rows.insert(key, row);
        Ok(())
    }

    fn delete(&self, pk: &str, sk: &str) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        rows.remove(&(pk.to_string(), sk.to_string()));
        Ok(())
    }

    fn atomic_write(&self, items: &[WriteItem]) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();

        let mut keys = Vec::with_capacity(items.len());
        for item in items {
            let key = item_key(item)?;
            if keys.contains(&key) {
                return Err(StoreError::InvalidTransaction {
                    message: format!("duplicate item key ({}, {})", key.0, key.1),
                });
            }
            keys.push(key);
        }

        // Phase 1: evaluate every condition against the untouched map.
        let mut failed = false;
        let reasons: Vec<CancellationReason> = items
            .iter()
            .zip(&keys)
            .map(|(item, key)| {
                let condition = match item {
                    WriteItem::Put { condition, .. } | WriteItem::Update { condition, .. } => {
                        condition.as_ref()
                    }
                    WriteItem::Delete { .. } => None,
                };
                match condition {
                    Some(condition) if !condition_holds(&rows, key, condition) => {
                        failed = true;
                        CancellationReason::ConditionalCheckFailed
                    }
                    _ => CancellationReason::None,
                }
            })
            .collect();

        if failed {
            return Err(StoreError::TransactionCanceled { reasons });
        }

        // Phase 2: apply all. Keys are distinct, so order is immaterial.
        for (item, key) in items.iter().zip(keys) {
            match item {
                WriteItem::Put { row, .. } => {
                    rows.insert(key, row.clone());
                }
                WriteItem::Delete { .. } => {
                    rows.remove(&key);
                }
                WriteItem::Update { expr, .. } => apply_update(&mut rows, key, expr),
            }
        }

        Ok(())
    }
}

fn query_primary(rows: &RowMap, condition: &KeyCondition) -> Vec<(NodeKey, Row)> {
    rows.range((condition.hash.clone(), String::new())..)
        .take_while(|((pk, _), _)| *pk == condition.hash)
        .filter(|((_, sk), _)| range_matches(condition, sk))
        .map(|((pk, sk), row)| (NodeKey::new(pk.clone(), sk.clone()), row.clone()))
        .collect()
}

fn query_ids_only(
    rows: &RowMap,
    condition: &KeyCondition,
) -> Result<Vec<(NodeKey, Row)>, StoreError> {
    if condition.range.is_some() {
        return Err(StoreError::Unavailable {
            message: "ids_only has no range key".to_string(),
        });
    }
    // No range key: order by primary key for determinism.
    Ok(rows
        .iter()
        .filter(|(_, row)| string_column(row, "entity_id") == Some(&condition.hash))
        .map(|((pk, sk), row)| (NodeKey::new(pk.clone(), sk.clone()), row.clone()))
        .collect())
}

fn query_model_scan(rows: &RowMap, condition: &KeyCondition) -> Vec<(NodeKey, Row)> {
    let mut matched: Vec<_> = rows
        .iter()
        .filter(|(_, row)| string_column(row, "entity_name") == Some(&condition.hash))
        .filter_map(|((pk, sk), row)| {
            let range_value = string_column(row, "base_node_id")?;
            range_matches_value(condition, range_value)
                .then(|| (range_value.to_string(), NodeKey::new(pk.clone(), sk.clone()), row.clone()))
        })
        .collect();
    matched.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
    matched.into_iter().map(|(_, key, row)| (key, row)).collect()
}

fn range_matches(condition: &KeyCondition, sort_value: &str) -> bool {
    range_matches_value(condition, sort_value)
}

fn range_matches_value(condition: &KeyCondition, value: &str) -> bool {
    condition
        .range
        .as_ref()
        .is_none_or(|range| range.matches(value))
}

fn condition_holds(rows: &RowMap, key: &(String, String), condition: &WriteCondition) -> bool {
    match condition {
        WriteCondition::RowNotExists => !rows.contains_key(key),
        WriteCondition::RowExists => rows.contains_key(key),
        WriteCondition::NotExistsOrOwnedBy { entity_id } => rows
            .get(key)
            .is_none_or(|row| string_column(row, "entity_id") == Some(entity_id)),
        WriteCondition::NotExistsOrExpired { now } => rows
            .range((key.0.clone(), String::new())..)
            .take_while(|((pk, _), _)| *pk == key.0)
            .all(|(_, row)| lease_expired(row, now)),
    }
}

// Lease timestamps are RFC-3339 with a fixed offset; string order is time
// order, which is exactly how a wide-column store compares them.
fn lease_expired(row: &Row, now: &DateTime<Utc>) -> bool {
    string_column(row, "expire_time").is_some_and(|expiry| expiry < now.to_rfc3339().as_str())
}

fn apply_update(rows: &mut RowMap, key: (String, String), expr: &UpdateExpr) {
    let UpdateExpr::Add { column, amount } = expr;
    let row = rows.entry(key.clone()).or_insert_with(|| {
        let mut fresh = Row::new();
        fresh.insert("pk".to_string(), key.0.clone().into());
        fresh.insert("sk".to_string(), key.1.clone().into());
        fresh
    });
    let current = row.get(column).and_then(serde_json::Value::as_i64).unwrap_or(0);
    row.insert(column.clone(), (current + amount).into());
}

fn string_column<'r>(row: &'r Row, column: &str) -> Option<&'r str> {
    row.get(column).and_then(serde_json::Value::as_str)
}

fn primary_key_of(row: &Row) -> Result<(String, String), StoreError> {
    let pk = string_column(row, "pk");
    let sk = string_column(row, "sk");
    match (pk, sk) {
        (Some(pk), Some(sk)) => Ok((pk.to_string(), sk.to_string())),
        _ => Err(StoreError::InvalidTransaction {
            message: "row is missing its pk/sk attributes".to_string(),
        }),
    }
}

fn item_key(item: &WriteItem) -> Result<(String, String), StoreError> {
    match item {
        WriteItem::Put { row, .. } => primary_key_of(row),
        WriteItem::Update { key, .. } | WriteItem::Delete { key } => {
            Ok((key.pk.clone(), key.sk.clone()))
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RangeCondition;
    use serde_json::json;

    fn row(pk: &str, sk: &str, extra: &[(&str, serde_json::Value)]) -> Row {
        let mut row = Row::new();
        row.insert("pk".to_string(), pk.into());
        row.insert("sk".to_string(), sk.into());
        for (column, value) in extra {
            row.insert((*column).to_string(), value.clone());
        }
        row
    }

    fn primary_request(pk: &str, range: Option<RangeCondition>) -> QueryRequest {
        QueryRequest {
            index: StoreIndex::Primary,
            condition: KeyCondition {
                hash: pk.to_string(),
                range,
            },
            scan_forward: true,
            limit: 50,
            consistent: true,
            start_key: None,
        }
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = MemoryStore::new();
        store.put(row("a", "b", &[]), None).unwrap();
        assert!(store.get("a", "b", true).unwrap().is_some());
        assert!(store.get("a", "c", true).unwrap().is_none());
    }

    #[test]
    fn conditional_put_rejects_existing_row() {
        let store = MemoryStore::new();
        store.put(row("a", "b", &[]), None).unwrap();
        let result = store.put(row("a", "b", &[]), Some(WriteCondition::RowNotExists));
        assert!(matches!(
            result,
            Err(StoreError::ConditionalCheckFailed { .. })
        ));
    }

    #[test]
    fn ownership_condition_admits_the_owner_only() {
        let store = MemoryStore::new();
        store
            .put(row("u", "unique", &[("entity_id", json!("me"))]), None)
            .unwrap();

        let mine = WriteCondition::NotExistsOrOwnedBy {
            entity_id: "me".to_string(),
        };
        let theirs = WriteCondition::NotExistsOrOwnedBy {
            entity_id: "other".to_string(),
        };
        assert!(store
            .put(row("u", "unique", &[("entity_id", json!("me"))]), Some(mine))
            .is_ok());
        assert!(store
            .put(
                row("u", "unique", &[("entity_id", json!("other"))]),
                Some(theirs)
            )
            .is_err());
    }

    #[test]
    fn rejected_transaction_changes_nothing_and_aligns_reasons() {
        let store = MemoryStore::new();
        store.put(row("taken", "unique", &[]), None).unwrap();

        let items = vec![
            WriteItem::Put {
                row: row("fresh", "fresh", &[]),
                condition: None,
            },
            WriteItem::Put {
                row: row("taken", "unique", &[]),
                condition: Some(WriteCondition::RowNotExists),
            },
        ];
        let Err(StoreError::TransactionCanceled { reasons }) = store.atomic_write(&items) else {
            panic!("expected cancellation");
        };
        assert_eq!(
            reasons,
            vec![
                CancellationReason::None,
                CancellationReason::ConditionalCheckFailed,
            ]
        );
        assert!(store.get("fresh", "fresh", true).unwrap().is_none());
    }

    #[test]
    fn duplicate_item_keys_are_rejected() {
        let store = MemoryStore::new();
        let items = vec![
            WriteItem::Put {
                row: row("a", "b", &[]),
                condition: None,
            },
            WriteItem::Delete {
                key: NodeKey::new("a", "b"),
            },
        ];
        assert!(matches!(
            store.atomic_write(&items),
            Err(StoreError::InvalidTransaction { .. })
        ));
    }

    #[test]
    fn update_adds_into_the_named_column() {
        let store = MemoryStore::new();
        store
            .put(row("c", "counter#n", &[("count", json!(100))]), None)
            .unwrap();
        store
            .atomic_write(&[WriteItem::Update {
                key: NodeKey::new("c", "counter#n"),
                expr: UpdateExpr::Add {
                    column: "count".to_string(),
                    amount: 1,
                },
                condition: Some(WriteCondition::RowExists),
            }])
            .unwrap();
        let updated = store.get("c", "counter#n", true).unwrap().unwrap();
        assert_eq!(updated["count"], json!(101));
    }

    #[test]
    fn primary_query_scans_one_partition_in_sort_order() {
        let store = MemoryStore::new();
        for sk in ["##b", "##a", "##c"] {
            store.put(row("p", sk, &[]), None).unwrap();
        }
        store.put(row("q", "##a", &[]), None).unwrap();

        let page = store.query(&primary_request("p", None)).unwrap();
        let sks: Vec<_> = page
            .rows
            .iter()
            .map(|r| r["sk"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(sks, vec!["##a", "##b", "##c"]);
        assert!(page.last_evaluated_key.is_none());
    }

    #[test]
    fn pagination_resumes_from_the_returned_key() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.put(row("p", &format!("##{i}"), &[]), None).unwrap();
        }

        let mut request = primary_request("p", None);
        request.limit = 2;
        let first = store.query(&request).unwrap();
        assert_eq!(first.rows.len(), 2);
        let resume = first.last_evaluated_key.expect("more rows remain");

        request.start_key = Some(resume);
        let second = store.query(&request).unwrap();
        assert_eq!(second.rows[0]["sk"], json!("##2"));
    }

    #[test]
    fn begins_with_filters_the_sort_key() {
        let store = MemoryStore::new();
        for sk in ["##John1##x", "##John10##y", "##Jane##z"] {
            store.put(row("p", sk, &[]), None).unwrap();
        }
        let page = store
            .query(&primary_request(
                "p",
                Some(RangeCondition::BeginsWith("##John1##".to_string())),
            ))
            .unwrap();
        assert_eq!(page.rows.len(), 1);
    }

    #[test]
    fn model_scan_orders_by_base_node_id() {
        let store = MemoryStore::new();
        for id in ["02", "01", "03"] {
            store
                .put(
                    row(
                        id,
                        id,
                        &[
                            ("entity_name", json!("MyModel")),
                            ("base_node_id", json!(id)),
                        ],
                    ),
                    None,
                )
                .unwrap();
        }
        // Non-base rows for the same entity never surface here.
        store
            .put(
                row("u", "unique", &[("entity_name", json!("MyModel"))]),
                None,
            )
            .unwrap();

        let request = QueryRequest {
            index: StoreIndex::ModelScan,
            condition: KeyCondition::hash_eq("MyModel"),
            scan_forward: false,
            limit: 50,
            consistent: false,
            start_key: None,
        };
        let page = store.query(&request).unwrap();
        let ids: Vec<_> = page
            .rows
            .iter()
            .map(|r| r["base_node_id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["03", "02", "01"]);
    }

    #[test]
    fn expired_lease_condition_is_partition_scoped() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let held = row(
            "immaterial_lock#id",
            "lease-1",
            &[(
                "expire_time",
                json!((now + chrono::Duration::seconds(15)).to_rfc3339()),
            )],
        );
        store.put(held, None).unwrap();

        // A second locker writes a different sk; the partition-scoped
        // condition must still see the live lease.
        let contender = row("immaterial_lock#id", "lease-2", &[]);
        let result = store.put(
            contender,
            Some(WriteCondition::NotExistsOrExpired { now }),
        );
        assert!(matches!(
            result,
            Err(StoreError::ConditionalCheckFailed { .. })
        ));
    }
}
