//! Materialized node variants.
//!
//! A record projects into one base node plus one node per declared access
//! pattern. Node identity is `(pk, sk)`; the write engine diffs node sets on
//! keys alone, so every variant derives its key deterministically from the
//! record at construction.

use crate::{
    error::Error,
    key::{self, NodeKey},
    store::{Row, WriteCondition, WriteItem},
    value::FieldValue,
};
use serde::{Deserialize, Serialize};

/// Sort-key prefix of counter rows within a record's own partition.
pub const COUNTER_SK_PREFIX: &str = "counter#";

///
/// NodeType
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    Base,
    Unique,
    Query,
    Counter,
}

///
/// BaseNode
///
/// The canonical row of a record: `pk == sk == entity_id`, the serialized
/// record, and back-pointers to every other node materialized for it.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BaseNode {
    pub node_type: NodeType,
    pub entity_name: String,
    pub entity_id: String,
    pub pk: String,
    pub sk: String,
    pub base_node_id: String,
    pub raw_data: String,
    pub other_nodes: Vec<NodeKey>,
}

impl BaseNode {
    #[must_use]
    pub fn new(
        entity_name: impl Into<String>,
        entity_id: impl Into<String>,
        raw_data: String,
        other_nodes: Vec<NodeKey>,
    ) -> Self {
        let entity_id = entity_id.into();
        Self {
            node_type: NodeType::Base,
            entity_name: entity_name.into(),
            pk: entity_id.clone(),
            sk: entity_id.clone(),
            base_node_id: entity_id.clone(),
            entity_id,
            raw_data,
            other_nodes,
        }
    }
}

///
/// UniqueNode
///
/// A uniqueness token: its key is a pure function of the constrained field
/// values, so two records sharing them collide on the same row.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UniqueNode {
    pub node_type: NodeType,
    pub entity_name: String,
    pub entity_id: String,
    pub pk: String,
    pub sk: String,
    pub unique_node_id: String,
    pub fields: Vec<FieldValue>,
}

impl UniqueNode {
    #[must_use]
    pub fn new(
        entity_name: impl Into<String>,
        entity_id: impl Into<String>,
        fields: Vec<FieldValue>,
    ) -> Self {
        let entity_name = entity_name.into();
        let entity_id = entity_id.into();
        let key = key::unique_key(&entity_name, &fields);
        Self {
            node_type: NodeType::Unique,
            entity_name,
            pk: key.pk,
            sk: key.sk,
            unique_node_id: entity_id.clone(),
            entity_id,
            fields,
        }
    }
}

///
/// QueryNode
///
/// An index projection. Carries the serialized record so queries rehydrate
/// without a second lookup.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryNode {
    pub node_type: NodeType,
    pub entity_name: String,
    pub entity_id: String,
    pub pk: String,
    pub sk: String,
    pub query_node_id: String,
    pub partition_fields: Vec<FieldValue>,
    pub sort_fields: Vec<FieldValue>,
    pub raw_data: String,
}

impl QueryNode {
    #[must_use]
    pub fn new(
        entity_name: impl Into<String>,
        entity_id: impl Into<String>,
        partition_fields: Vec<FieldValue>,
        sort_fields: Vec<FieldValue>,
        raw_data: String,
    ) -> Self {
        let entity_name = entity_name.into();
        let entity_id = entity_id.into();
        let key = key::query_key(&entity_name, &entity_id, &partition_fields, &sort_fields);
        Self {
            node_type: NodeType::Query,
            entity_name,
            pk: key.pk,
            sk: key.sk,
            query_node_id: entity_id.clone(),
            entity_id,
            partition_fields,
            sort_fields,
            raw_data,
        }
    }
}

///
/// CounterNode
///
/// Mutable tally row living in the record's own partition. The stored
/// `count` is authoritative once written; re-saves never overwrite it.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CounterNode {
    pub node_type: NodeType,
    pub entity_name: String,
    pub entity_id: String,
    pub pk: String,
    pub sk: String,
    pub counter_node_id: String,
    pub field_name: String,
    pub count: i64,
}

impl CounterNode {
    #[must_use]
    pub fn new(
        entity_name: impl Into<String>,
        entity_id: impl Into<String>,
        field_name: impl Into<String>,
        count: i64,
    ) -> Self {
        let entity_id = entity_id.into();
        let field_name = field_name.into();
        let key = Self::key_for(&entity_id, &field_name);
        Self {
            node_type: NodeType::Counter,
            entity_name: entity_name.into(),
            pk: key.pk,
            sk: key.sk,
            counter_node_id: entity_id.clone(),
            entity_id,
            field_name,
            count,
        }
    }

    #[must_use]
    pub fn key_for(entity_id: &str, field_name: &str) -> NodeKey {
        NodeKey::new(entity_id, format!("{COUNTER_SK_PREFIX}{field_name}"))
    }
}

///
/// Node
///

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Base(BaseNode),
    Unique(UniqueNode),
    Query(QueryNode),
    Counter(CounterNode),
}

impl Node {
    #[must_use]
    pub fn key(&self) -> NodeKey {
        match self {
            Self::Base(n) => NodeKey::new(n.pk.clone(), n.sk.clone()),
            Self::Unique(n) => NodeKey::new(n.pk.clone(), n.sk.clone()),
            Self::Query(n) => NodeKey::new(n.pk.clone(), n.sk.clone()),
            Self::Counter(n) => NodeKey::new(n.pk.clone(), n.sk.clone()),
        }
    }

    #[must_use]
    pub const fn node_type(&self) -> NodeType {
        match self {
            Self::Base(_) => NodeType::Base,
            Self::Unique(_) => NodeType::Unique,
            Self::Query(_) => NodeType::Query,
            Self::Counter(_) => NodeType::Counter,
        }
    }

    #[must_use]
    pub fn entity_id(&self) -> &str {
        match self {
            Self::Base(n) => &n.entity_id,
            Self::Unique(n) => &n.entity_id,
            Self::Query(n) => &n.entity_id,
            Self::Counter(n) => &n.entity_id,
        }
    }

    pub fn to_row(&self) -> Result<Row, Error> {
        let value = match self {
            Self::Base(n) => serde_json::to_value(n)?,
            Self::Unique(n) => serde_json::to_value(n)?,
            Self::Query(n) => serde_json::to_value(n)?,
            Self::Counter(n) => serde_json::to_value(n)?,
        };
        match value {
            serde_json::Value::Object(row) => Ok(row),
            // Struct serialization always yields an object.
            _ => unreachable!("node rows serialize as objects"),
        }
    }

    /// Build this node's member of an atomic write.
    ///
    /// Unique puts are conditional on "absent or already mine" so the same
    /// record re-saves cleanly while any other record is rejected. Counter
    /// puts are first-save only and conditional on absence.
    pub fn put_item(&self) -> Result<WriteItem, Error> {
        let condition = match self {
            Self::Base(_) | Self::Query(_) => None,
            Self::Unique(n) => Some(WriteCondition::NotExistsOrOwnedBy {
                entity_id: n.entity_id.clone(),
            }),
            Self::Counter(_) => Some(WriteCondition::RowNotExists),
        };
        Ok(WriteItem::Put {
            row: self.to_row()?,
            condition,
        })
    }

    #[must_use]
    pub fn delete_item(&self) -> WriteItem {
        WriteItem::Delete { key: self.key() }
    }

    /// Decode a persisted row back into its node variant.
    pub fn from_row(row: &Row) -> Result<Self, Error> {
        let value = serde_json::Value::Object(row.clone());
        let node_type: NodeType = row
            .get("node_type")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .ok_or_else(|| {
                Error::Store(crate::store::StoreError::Corrupt {
                    message: "row is missing node_type".to_string(),
                })
            })?;

        Ok(match node_type {
            NodeType::Base => Self::Base(serde_json::from_value(value)?),
            NodeType::Unique => Self::Unique(serde_json::from_value(value)?),
            NodeType::Query => Self::Query(serde_json::from_value(value)?),
            NodeType::Counter => Self::Counter(serde_json::from_value(value)?),
        })
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn unique_fixture() -> UniqueNode {
        UniqueNode::new(
            "MyModel",
            "01H",
            vec![FieldValue::new("name", "John")],
        )
    }

    #[test]
    fn base_node_key_is_the_entity_id() {
        let node = BaseNode::new("MyModel", "01H", "{}".to_string(), vec![]);
        assert_eq!(node.pk, "01H");
        assert_eq!(node.sk, "01H");
        assert_eq!(node.base_node_id, "01H");
    }

    #[test]
    fn unique_node_key_shape() {
        let node = unique_fixture();
        assert_eq!(node.pk, "MyModel(name=John)");
        assert_eq!(node.sk, "unique");
        assert_eq!(node.unique_node_id, "01H");
    }

    #[test]
    fn query_node_key_shape() {
        let node = QueryNode::new(
            "MyModel",
            "01H",
            vec![FieldValue::new("name", "John")],
            vec![FieldValue::new("age", 30)],
            "{}".to_string(),
        );
        assert_eq!(node.pk, "MyModel[name=John][age]");
        assert_eq!(node.sk, "##100000000000000000030##01H");
    }

    #[test]
    fn counter_node_lives_in_the_record_partition() {
        let node = CounterNode::new("MyModel", "01H", "my_count", 100);
        assert_eq!(node.pk, "01H");
        assert_eq!(node.sk, "counter#my_count");
    }

    #[test]
    fn unique_put_is_conditional_on_ownership() {
        let item = Node::Unique(unique_fixture()).put_item().unwrap();
        let WriteItem::Put { condition, .. } = item else {
            panic!("expected a put");
        };
        assert_eq!(
            condition,
            Some(WriteCondition::NotExistsOrOwnedBy {
                entity_id: "01H".to_string()
            })
        );
    }

    #[test]
    fn row_round_trip_preserves_variant() {
        let node = Node::Unique(unique_fixture());
        let row = node.to_row().unwrap();
        assert_eq!(row["node_type"], "unique");
        assert_eq!(Node::from_row(&row).unwrap(), node);
    }

    #[test]
    fn base_row_carries_back_pointers() {
        let node = BaseNode::new(
            "MyModel",
            "01H",
            "{}".to_string(),
            vec![NodeKey::new("MyModel(name=John)", "unique")],
        );
        let row = Node::Base(node).to_row().unwrap();
        assert_eq!(
            row["other_nodes"],
            serde_json::json!([["MyModel(name=John)", "unique"]])
        );
    }
}
