//! Counter extension.
//!
//! Counters mutate through single-item atomic updates against their own row,
//! never through save: the stored count is authoritative from first save on,
//! and a re-save must not clobber concurrent increments. The `RowExists`
//! gate is what turns "never saved" into `CounterNotSaved`.

use crate::{
    db::{Db, boundary},
    error::Error,
    model::Record,
    node::CounterNode,
    store::{StoreError, UpdateExpr, WriteCondition, WriteItem},
    value::Value,
};

pub(crate) fn increment<R: Record>(
    db: &Db,
    record: &mut R,
    field: &str,
    amount: i64,
) -> Result<i64, Error> {
    let spec = db.registry().spec(R::ENTITY_NAME)?;
    if !spec.counter_fields.iter().any(|f| f == field) {
        return Err(Error::field_misconfiguration(R::ENTITY_NAME, field));
    }

    let key = CounterNode::key_for(record.id(), field);
    let items = [WriteItem::Update {
        key: key.clone(),
        expr: UpdateExpr::Add {
            column: "count".to_string(),
            amount,
        },
        condition: Some(WriteCondition::RowExists),
    }];
    boundary::write_atomically(db.store().as_ref(), &items)?;

    let count = read_count(db, &key)?;
    record.set_field(field, Value::Int(count));
    Ok(count)
}

pub(crate) fn sync<R: Record>(db: &Db, record: &mut R) -> Result<(), Error> {
    let spec = db.registry().spec(R::ENTITY_NAME)?;

    for field in &spec.counter_fields {
        let key = CounterNode::key_for(record.id(), field);
        let Some(row) = db.store().get(&key.pk, &key.sk, true)? else {
            continue;
        };
        let count = row
            .get("count")
            .and_then(serde_json::Value::as_i64)
            .ok_or_else(|| corrupt_count(&key.pk, &key.sk))?;
        record.set_field(field, Value::Int(count));
    }

    Ok(())
}

fn read_count(db: &Db, key: &crate::key::NodeKey) -> Result<i64, Error> {
    let row = db
        .store()
        .get(&key.pk, &key.sk, true)?
        .ok_or_else(|| corrupt_count(&key.pk, &key.sk))?;
    row.get("count")
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| corrupt_count(&key.pk, &key.sk))
}

fn corrupt_count(pk: &str, sk: &str) -> Error {
    Error::Store(StoreError::Corrupt {
        message: format!("counter row ({pk}, {sk}) has no numeric count"),
    })
}
