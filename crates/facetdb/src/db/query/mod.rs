//! Declarative queries and their lowering onto materialized indices.
//!
//! A standard query is a list of statements extending along one declared
//! index: equality across the leading statements, any supported operator on
//! the last. Index selection is first-fit over the type's query indices in
//! declaration order; lowering turns the statements into one key condition
//! against the index's partition.

mod iter;

pub use iter::{RecordBatches, Records};

use crate::{
    SEPARATOR,
    error::Error,
    key::{self, NodeKey, RANGE_HIGH, RANGE_LOW},
    model::{ModelSpec, QueryIndex},
    store::{KeyCondition, RangeCondition, StoreIndex},
    value::{FieldValue, Value},
};
use derive_more::Display;

///
/// QueryOp
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum QueryOp {
    #[display("eq")]
    Eq,
    #[display("lt")]
    Lt,
    #[display("lte")]
    Lte,
    #[display("gt")]
    Gt,
    #[display("gte")]
    Gte,
    #[display("begins_with")]
    BeginsWith,
}

///
/// StandardQueryStatement
///

#[derive(Clone, Debug, PartialEq)]
pub struct StandardQueryStatement {
    pub field: String,
    pub op: QueryOp,
    pub value: Value,
}

impl StandardQueryStatement {
    pub fn new(field: impl Into<String>, op: QueryOp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

///
/// StandardQuery
///

#[derive(Clone, Debug, PartialEq)]
pub struct StandardQuery {
    pub statements: Vec<StandardQueryStatement>,
    pub consistent_read: bool,
}

impl StandardQuery {
    #[must_use]
    pub fn new(statements: impl IntoIterator<Item = StandardQueryStatement>) -> Self {
        Self {
            statements: statements.into_iter().collect(),
            consistent_read: true,
        }
    }

    #[must_use]
    pub const fn with_consistent_read(mut self, consistent_read: bool) -> Self {
        self.consistent_read = consistent_read;
        self
    }
}

///
/// KeyConditionQuery
///
/// Pass-through for callers that already hold a store key condition,
/// optionally against a named global index.
///

#[derive(Clone, Debug, PartialEq)]
pub struct KeyConditionQuery {
    pub condition: KeyCondition,
    pub index: StoreIndex,
    pub consistent_read: bool,
}

impl KeyConditionQuery {
    #[must_use]
    pub const fn new(condition: KeyCondition) -> Self {
        Self {
            condition,
            index: StoreIndex::Primary,
            consistent_read: true,
        }
    }

    #[must_use]
    pub const fn on_index(mut self, index: StoreIndex) -> Self {
        self.index = index;
        self
    }

    #[must_use]
    pub const fn with_consistent_read(mut self, consistent_read: bool) -> Self {
        self.consistent_read = consistent_read;
        self
    }
}

///
/// AllQuery
///
/// Every base node of the type, in `base_node_id` order, eventually
/// consistent.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AllQuery;

///
/// Query
///

#[derive(Clone, Debug, PartialEq)]
pub enum Query {
    Standard(StandardQuery),
    KeyCondition(KeyConditionQuery),
    All(AllQuery),
}

impl From<StandardQuery> for Query {
    fn from(query: StandardQuery) -> Self {
        Self::Standard(query)
    }
}

impl From<KeyConditionQuery> for Query {
    fn from(query: KeyConditionQuery) -> Self {
        Self::KeyCondition(query)
    }
}

impl From<AllQuery> for Query {
    fn from(query: AllQuery) -> Self {
        Self::All(query)
    }
}

///
/// QueryOptions
///

#[derive(Clone, Debug, Default)]
pub struct QueryOptions {
    pub descending: bool,
    pub max_records: Option<usize>,
    /// Resume point from a previous iterator's `last_evaluated_key`.
    pub start_key: Option<NodeKey>,
}

impl QueryOptions {
    #[must_use]
    pub const fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    #[must_use]
    pub const fn max_records(mut self, max_records: usize) -> Self {
        self.max_records = Some(max_records);
        self
    }

    #[must_use]
    pub fn start_key(mut self, start_key: NodeKey) -> Self {
        self.start_key = Some(start_key);
        self
    }
}

///
/// QueryPlan
///

/// Which node variant the matched rows decode into.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum NodeShape {
    Query,
    Base,
}

#[derive(Clone, Debug)]
pub(crate) struct QueryPlan {
    pub index: StoreIndex,
    pub condition: KeyCondition,
    pub consistent: bool,
    pub scan_forward: bool,
    pub shape: NodeShape,
}

pub(crate) fn plan(
    entity_name: &'static str,
    spec: &ModelSpec,
    query: &Query,
    descending: bool,
) -> Result<QueryPlan, Error> {
    let scan_forward = !descending;
    Ok(match query {
        Query::Standard(standard) => {
            let index = select_index(spec, standard)?;
            let condition = lower(entity_name, index, standard)?;
            QueryPlan {
                index: StoreIndex::Primary,
                condition,
                consistent: standard.consistent_read,
                scan_forward,
                shape: NodeShape::Query,
            }
        }
        Query::KeyCondition(key_condition) => QueryPlan {
            index: key_condition.index,
            condition: key_condition.condition.clone(),
            consistent: key_condition.consistent_read,
            scan_forward,
            shape: NodeShape::Query,
        },
        Query::All(AllQuery) => QueryPlan {
            index: StoreIndex::ModelScan,
            condition: KeyCondition::hash_eq(entity_name),
            consistent: false,
            scan_forward,
            shape: NodeShape::Base,
        },
    })
}

/// First declared query index the statements fit: the statements must cover
/// every partition field exactly and extend only along the index's declared
/// field order.
fn select_index<'s>(
    spec: &'s ModelSpec,
    query: &StandardQuery,
) -> Result<&'s QueryIndex, Error> {
    let fields: Vec<&str> = query
        .statements
        .iter()
        .map(|statement| statement.field.as_str())
        .collect();

    for index in spec.query_indices() {
        let declared: Vec<&str> = index.all_fields().collect();
        if fields.len() > declared.len() || fields.len() < index.partition_fields.len() {
            continue;
        }
        if fields == declared[..fields.len()] {
            return Ok(index);
        }
    }

    Err(Error::query_not_supported(
        "no index found for the given query fields",
    ))
}

fn lower(
    entity_name: &str,
    index: &QueryIndex,
    query: &StandardQuery,
) -> Result<KeyCondition, Error> {
    let statements = &query.statements;
    let Some((last, leading)) = statements.split_last() else {
        return Err(Error::query_not_supported(
            "a standard query needs at least one statement",
        ));
    };

    for statement in leading {
        if statement.op != QueryOp::Eq {
            return Err(Error::query_not_supported(format!(
                "only the final statement may use '{}'; '{}' uses it earlier",
                statement.op, statement.field
            )));
        }
    }

    let partition_count = index.partition_fields.len();
    if statements.len() <= partition_count && last.op != QueryOp::Eq {
        return Err(Error::query_not_supported(format!(
            "'{}' is a partition field and only supports 'eq'",
            last.field
        )));
    }

    let partition_fields: Vec<FieldValue> = statements[..partition_count]
        .iter()
        .map(|statement| FieldValue::new(statement.field.clone(), statement.value.clone()))
        .collect();
    let sort_names: Vec<&str> = index.sort_fields.iter().map(String::as_str).collect();
    let hash = key::query_partition_key(entity_name, &partition_fields, &sort_names);

    // Equality-bound sort components, excluding the final statement when it
    // ranges. `prefix` always ends with exactly one separator.
    let sort_statements = &statements[partition_count..];
    let range = if sort_statements.is_empty() {
        RangeCondition::BeginsWith(SEPARATOR.to_string())
    } else {
        let (last, eq_sorts) = sort_statements.split_last().expect("non-empty");
        let eq_fields: Vec<FieldValue> = eq_sorts
            .iter()
            .map(|statement| FieldValue::new(statement.field.clone(), statement.value.clone()))
            .collect();
        let prefix = if eq_fields.is_empty() {
            SEPARATOR.to_string()
        } else {
            format!("{}{SEPARATOR}", key::partial_sort_key(&eq_fields))
        };

        let bound = last.value.lex();
        match last.op {
            QueryOp::Eq => RangeCondition::BeginsWith(format!("{prefix}{bound}{SEPARATOR}")),
            QueryOp::BeginsWith => RangeCondition::BeginsWith(format!("{prefix}{bound}")),
            QueryOp::Lt => RangeCondition::Lt(format!("{prefix}{bound}{RANGE_LOW}")),
            QueryOp::Lte => RangeCondition::Lte(format!("{prefix}{bound}{RANGE_HIGH}")),
            QueryOp::Gt => RangeCondition::Gt(format!("{prefix}{bound}{RANGE_HIGH}")),
            QueryOp::Gte => RangeCondition::Gte(format!("{prefix}{bound}{RANGE_LOW}")),
        }
    };

    Ok(KeyCondition {
        hash,
        range: Some(range),
    })
}

///
/// TESTS
///
