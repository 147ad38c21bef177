//! Composite key assembly for materialized nodes.
//!
//! Contract:
//! - A unique key is an equality-only shape: `E(n1=v1,n2=v2,…)` / `"unique"`.
//! - A query key carries the sort-field *names* inside the partition key, so
//!   two indices sharing partition fields but sorting differently land in
//!   disjoint partitions.
//! - A query sort key suffixes the record id, so sort-value collisions stay
//!   unique within a partition.

use crate::{SEPARATOR, value::FieldValue};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Sort key of every unique node.
pub const UNIQUE_SK: &str = "unique";

/// Bounds appended below/above a lex-encoded component when lowering range
/// operators. `SEPARATOR` starts with `'#'`, which sits strictly between
/// the two, so a bound with either sentinel brackets exactly the rows whose
/// next component is the compared value.
pub(crate) const RANGE_LOW: char = '\u{0}';
pub(crate) const RANGE_HIGH: char = '\u{ffff}';

///
/// NodeKey
///
/// Composite primary key of one materialized row. Node identity is key
/// identity; write-path diffs compare nothing else.
///

#[derive(
    Clone, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[display("({pk}, {sk})")]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct NodeKey {
    pub pk: String,
    pub sk: String,
}

impl NodeKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }
}

impl From<(String, String)> for NodeKey {
    fn from((pk, sk): (String, String)) -> Self {
        Self { pk, sk }
    }
}

impl From<NodeKey> for (String, String) {
    fn from(key: NodeKey) -> Self {
        (key.pk, key.sk)
    }
}

/// Key of the unique node enforcing `entity`'s constraint over `fields`.
#[must_use]
pub fn unique_key(entity: &str, fields: &[FieldValue]) -> NodeKey {
    let pairs = join_field_pairs(fields);
    NodeKey::new(format!("{entity}({pairs})"), UNIQUE_SK)
}

/// Key of the query node projecting `entity_id` into the index over
/// `partition_fields` ordered by `sort_fields`.
#[must_use]
pub fn query_key(
    entity: &str,
    entity_id: &str,
    partition_fields: &[FieldValue],
    sort_fields: &[FieldValue],
) -> NodeKey {
    let sort_names: Vec<&str> = sort_fields.iter().map(|f| f.name.as_str()).collect();
    let pk = query_partition_key(entity, partition_fields, &sort_names);
    let sk = format!(
        "{}{SEPARATOR}{entity_id}",
        partial_sort_key(sort_fields)
    );
    NodeKey::new(pk, sk)
}

/// Partition key of a query index: `E[p1=v1,…][s1,s2,…]`.
#[must_use]
pub fn query_partition_key(
    entity: &str,
    partition_fields: &[FieldValue],
    sort_field_names: &[&str],
) -> String {
    let pairs = join_field_pairs(partition_fields);
    format!("{entity}[{pairs}][{}]", sort_field_names.join(","))
}

/// Sort-key prefix covering the leading `sort_fields` values. Omitting
/// trailing components (and the id suffix) makes this a `begins_with`
/// prefix for range scans.
#[must_use]
pub fn partial_sort_key(sort_fields: &[FieldValue]) -> String {
    let values: Vec<String> = sort_fields.iter().map(|f| f.value.lex()).collect();
    format!("{SEPARATOR}{}", values.join(SEPARATOR))
}

fn join_field_pairs(fields: &[FieldValue]) -> String {
    fields
        .iter()
        .map(|f| format!("{}={}", f.name, f.value.plain()))
        .collect::<Vec<_>>()
        .join(",")
}

///
/// TESTS
///
