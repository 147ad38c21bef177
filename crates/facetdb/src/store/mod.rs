pub mod lock;
pub mod memory;

use crate::key::NodeKey;
use chrono::{DateTime, Utc};
use thiserror::Error as ThisError;

/// One persisted row, as the wire-level attribute map.
pub type Row = serde_json::Map<String, serde_json::Value>;

///
/// StoreError
///
/// Failures surfaced by a store driver. Everything except the two shapes
/// classified by the write boundary propagates to callers unchanged.
///

#[derive(Debug, ThisError)]
pub enum StoreError {
    /// A single-item conditional write was rejected.
    #[error("conditional check failed for ({pk}, {sk})")]
    ConditionalCheckFailed { pk: String, sk: String },

    /// A multi-item atomic write was rejected as a whole. `reasons` aligns
    /// with the submitted item list.
    #[error("transaction canceled")]
    TransactionCanceled { reasons: Vec<CancellationReason> },

    /// The submitted transaction is malformed (e.g. two items addressing
    /// the same key).
    #[error("invalid transaction: {message}")]
    InvalidTransaction { message: String },

    /// A row failed to decode into the expected node shape.
    #[error("corrupt row: {message}")]
    Corrupt { message: String },

    /// Driver-level failure (network, throttling, misconfiguration).
    #[error("store unavailable: {message}")]
    Unavailable { message: String },
}

///
/// CancellationReason
///
/// Per-item outcome reported when an atomic write is rejected.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum CancellationReason {
    /// The item was not the cause of the rejection.
    None,
    ConditionalCheckFailed,
    TransactionConflict,
    Other(String),
}

///
/// WriteCondition
///
/// Preconditions a driver must evaluate atomically with the write.
///

#[derive(Clone, Debug, PartialEq)]
pub enum WriteCondition {
    /// No row exists at the item's key.
    RowNotExists,

    /// A row exists at the item's key.
    RowExists,

    /// No row exists at the key, or the stored `entity_id` column equals
    /// this one. Lets a record re-save its own unique node while blocking
    /// every other record.
    NotExistsOrOwnedBy { entity_id: String },

    /// Partition-scoped: no row shares this item's `pk`, or every row that
    /// does carries an `expire_time` earlier than `now`. Backs the advisory
    /// lock's lease takeover.
    NotExistsOrExpired { now: DateTime<Utc> },
}

///
/// UpdateExpr
///

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateExpr {
    /// Numeric add into `column`, creating nothing: the condition gate is
    /// what distinguishes "row missing" from "row present".
    Add { column: String, amount: i64 },
}

///
/// WriteItem
///
/// One member of a multi-item atomic write.
///

#[derive(Clone, Debug, PartialEq)]
pub enum WriteItem {
    Put {
        row: Row,
        condition: Option<WriteCondition>,
    },
    Update {
        key: NodeKey,
        expr: UpdateExpr,
        condition: Option<WriteCondition>,
    },
    Delete {
        key: NodeKey,
    },
}

impl WriteItem {
    /// Partition key of the row this item addresses, if decodable.
    #[must_use]
    pub fn pk(&self) -> Option<&str> {
        match self {
            Self::Put { row, .. } => row.get("pk").and_then(serde_json::Value::as_str),
            Self::Update { key, .. } | Self::Delete { key } => Some(&key.pk),
        }
    }
}

///
/// StoreIndex
///
/// Which physical index a query runs against.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum StoreIndex {
    /// The table itself: hash `pk`, range `sk`.
    #[default]
    Primary,
    /// Global index keyed by `entity_id` alone, for id-based fan-out.
    IdsOnly,
    /// Global index keyed by `(entity_name, base_node_id)`, backing
    /// whole-type scans.
    ModelScan,
}

impl StoreIndex {
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        match self {
            Self::Primary => None,
            Self::IdsOnly => Some("ids_only"),
            Self::ModelScan => Some("model_scan"),
        }
    }
}

///
/// KeyCondition
///
/// A key predicate against whichever index the request names: equality on
/// the hash key, optionally narrowed by a range predicate on the sort key.
///

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyCondition {
    pub hash: String,
    pub range: Option<RangeCondition>,
}

impl KeyCondition {
    pub fn hash_eq(hash: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            range: None,
        }
    }

    #[must_use]
    pub fn with_range(mut self, range: RangeCondition) -> Self {
        self.range = Some(range);
        self
    }
}

///
/// RangeCondition
///

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RangeCondition {
    Eq(String),
    BeginsWith(String),
    Lt(String),
    Lte(String),
    Gt(String),
    Gte(String),
}

impl RangeCondition {
    pub(crate) fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Eq(v) => candidate == v,
            Self::BeginsWith(prefix) => candidate.starts_with(prefix.as_str()),
            Self::Lt(v) => candidate < v.as_str(),
            Self::Lte(v) => candidate <= v.as_str(),
            Self::Gt(v) => candidate > v.as_str(),
            Self::Gte(v) => candidate >= v.as_str(),
        }
    }
}

///
/// QueryRequest / QueryPage
///

#[derive(Clone, Debug)]
pub struct QueryRequest {
    pub index: StoreIndex,
    pub condition: KeyCondition,
    pub scan_forward: bool,
    pub limit: usize,
    pub consistent: bool,
    /// Resume point: the primary key of the last row of the previous page.
    pub start_key: Option<NodeKey>,
}

#[derive(Clone, Debug, Default)]
pub struct QueryPage {
    pub rows: Vec<Row>,
    /// Present when rows remain beyond this page.
    pub last_evaluated_key: Option<NodeKey>,
}

///
/// Store
///
/// Abstract wide-column store: composite `(pk, sk)` primary key, conditional
/// single-item writes, key-condition queries, and a bounded all-or-nothing
/// multi-item write. Single-item put/delete exist for the advisory lock;
/// every data mutation goes through `atomic_write`.
///

pub trait Store: Send + Sync {
    fn get(&self, pk: &str, sk: &str, consistent: bool) -> Result<Option<Row>, StoreError>;

    fn query(&self, request: &QueryRequest) -> Result<QueryPage, StoreError>;

    fn put(&self, row: Row, condition: Option<WriteCondition>) -> Result<(), StoreError>;

    fn delete(&self, pk: &str, sk: &str) -> Result<(), StoreError>;

    /// Apply every item or none. On rejection the error carries per-item
    /// reasons aligned with `items`.
    fn atomic_write(&self, items: &[WriteItem]) -> Result<(), StoreError>;
}

///
/// TableSchema
///
/// Declarative table layout a concrete driver provisions. The core never
/// interprets this; it exists so drivers and the in-memory store agree on
/// index names and key attributes.
///

pub struct GlobalIndexSchema {
    pub name: &'static str,
    pub hash_key: &'static str,
    pub range_key: Option<&'static str>,
}

pub struct TableSchema {
    pub hash_key: &'static str,
    pub range_key: &'static str,
    pub string_attributes: &'static [&'static str],
    pub global_indexes: &'static [GlobalIndexSchema],
}

pub const TABLE_SCHEMA: TableSchema = TableSchema {
    hash_key: "pk",
    range_key: "sk",
    string_attributes: &["pk", "sk", "entity_id", "entity_name", "base_node_id"],
    global_indexes: &[
        GlobalIndexSchema {
            name: "ids_only",
            hash_key: "entity_id",
            range_key: None,
        },
        GlobalIndexSchema {
            name: "model_scan",
            hash_key: "entity_name",
            range_key: Some("base_node_id"),
        },
    ],
};
