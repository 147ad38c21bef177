//! Save and delete: the materialize → diff → commit pipeline.
//!
//! Contract:
//! - The whole node set of a record changes in exactly one atomic write.
//! - Diffs compare node keys only; a node whose `(pk, sk)` is unchanged is
//!   re-put in place, every orphaned key from the previous version rides the
//!   same write as a delete.
//! - Counter rows are the one exception to re-put: their stored count is
//!   authoritative after first save.

use crate::{
    db::{Db, boundary, crypto},
    error::Error,
    key::NodeKey,
    model::{self, Index, ModelSpec, Record},
    node::{BaseNode, CounterNode, Node, QueryNode, UniqueNode},
    store::{Store, StoreError, WriteItem, lock::RecordLock},
};
use chrono::Utc;
use std::collections::BTreeSet;

/// Produce the full node set for `record`: one node per declared index, one
/// per counter field, and the base node carrying back-pointers to the rest.
pub(crate) fn materialize<R: Record>(record: &R, spec: &ModelSpec) -> Result<Vec<Node>, Error> {
    let raw_data = model::canonical_json(record)?;
    let mut nodes = Vec::with_capacity(spec.indices.len() + spec.counter_fields.len() + 1);

    for index in &spec.indices {
        match index {
            Index::Unique(unique) => {
                let fields = model::fetch_field_values(record, &unique.unique_fields)?;
                nodes.push(Node::Unique(UniqueNode::new(
                    R::ENTITY_NAME,
                    record.id(),
                    fields,
                )));
            }
            Index::Query(query) => {
                let partition_fields =
                    model::fetch_field_values(record, &query.partition_fields)?;
                let sort_fields = model::fetch_field_values(record, &query.sort_fields)?;
                nodes.push(Node::Query(QueryNode::new(
                    R::ENTITY_NAME,
                    record.id(),
                    partition_fields,
                    sort_fields,
                    raw_data.clone(),
                )));
            }
        }
    }

    for field in &spec.counter_fields {
        let count = record
            .field(field)
            .and_then(|value| value.as_int())
            .ok_or_else(|| Error::field_misconfiguration(R::ENTITY_NAME, field))?;
        nodes.push(Node::Counter(CounterNode::new(
            R::ENTITY_NAME,
            record.id(),
            field,
            count,
        )));
    }

    let other_nodes: Vec<NodeKey> = nodes.iter().map(Node::key).collect();
    nodes.push(Node::Base(BaseNode::new(
        R::ENTITY_NAME,
        record.id(),
        raw_data,
        other_nodes,
    )));

    Ok(nodes)
}

pub(crate) fn save<R: Record>(db: &Db, record: &mut R) -> Result<(), Error> {
    let spec = db.registry().spec(R::ENTITY_NAME)?;
    let _lock = RecordLock::acquire(db.store(), record.id(), db.lock_options())?;

    refresh_content_hash(record)?;
    crypto::encrypt_fields(db.registry(), record, spec)?;

    let current = materialize(record, spec)?;
    let existing = load_existing(db, record.id())?;

    let current_keys: BTreeSet<NodeKey> = current.iter().map(Node::key).collect();
    let existing_keys: BTreeSet<NodeKey> = existing.iter().map(Node::key).collect();

    let mut items: Vec<WriteItem> = Vec::with_capacity(current.len() + existing.len());
    for node in &current {
        if matches!(node, Node::Counter(_)) && existing_keys.contains(&node.key()) {
            continue;
        }
        items.push(node.put_item()?);
    }
    for node in &existing {
        if !current_keys.contains(&node.key()) {
            items.push(node.delete_item());
        }
    }

    boundary::write_atomically(db.store().as_ref(), &items)
}

pub(crate) fn delete_by_id<R: Record>(db: &Db, id: &str) -> Result<(), Error> {
    db.registry().spec(R::ENTITY_NAME)?;
    let _lock = RecordLock::acquire(db.store(), id, db.lock_options())?;

    let existing = load_existing(db, id)?;
    if existing.is_empty() {
        return Ok(());
    }

    let items: Vec<WriteItem> = existing.iter().map(Node::delete_item).collect();
    boundary::write_atomically(db.store().as_ref(), &items)
}

pub(crate) fn get_by_id<R: Record>(db: &Db, id: &str) -> Result<Option<R>, Error> {
    let spec = db.registry().spec(R::ENTITY_NAME)?;
    match load_base_node(db.store().as_ref(), id)? {
        None => Ok(None),
        Some(base) => rehydrate(db, spec, &base.raw_data).map(Some),
    }
}

/// Rehydrate a record from the serialized copy a node carries.
pub(crate) fn rehydrate<R: Record>(
    db: &Db,
    spec: &ModelSpec,
    raw_data: &str,
) -> Result<R, Error> {
    let mut record: R = serde_json::from_str(raw_data)?;
    if spec.auto_decrypt {
        crypto::decrypt_fields(db.registry(), &mut record, spec)?;
    }
    Ok(record)
}

fn refresh_content_hash<R: Record>(record: &mut R) -> Result<(), Error> {
    let hash = model::content_hash(record)?;
    if record.updated_hash() != Some(hash.as_str()) {
        record.refresh_updated(hash, Utc::now());
    }
    Ok(())
}

pub(crate) fn load_base_node(store: &dyn Store, id: &str) -> Result<Option<BaseNode>, Error> {
    match store.get(id, id, true)? {
        None => Ok(None),
        Some(row) => match Node::from_row(&row)? {
            Node::Base(base) => Ok(Some(base)),
            other => Err(Error::Store(StoreError::Corrupt {
                message: format!(
                    "expected a base node at ({id}, {id}), found {:?}",
                    other.node_type()
                ),
            })),
        },
    }
}

/// The persisted node set: the base node plus every row its back-pointers
/// still reach. Pointers whose target is already gone are skipped; there is
/// nothing left to garbage-collect behind them.
fn load_existing(db: &Db, id: &str) -> Result<Vec<Node>, Error> {
    let Some(base) = load_base_node(db.store().as_ref(), id)? else {
        return Ok(Vec::new());
    };

    let mut nodes = Vec::with_capacity(base.other_nodes.len() + 1);
    for key in &base.other_nodes {
        if let Some(row) = db.store().get(&key.pk, &key.sk, true)? {
            nodes.push(Node::from_row(&row)?);
        }
    }
    nodes.push(Node::Base(base));
    Ok(nodes)
}
