//! Atomic-write rejection boundary.
//!
//! A rejected multi-item write surfaces as one store error carrying per-item
//! reasons. Exactly two shapes are domain errors: a conditional put losing a
//! uniqueness race, and a counter update whose owning row was never saved.
//! Everything else propagates unchanged.

use crate::{
    error::Error,
    store::{CancellationReason, Store, StoreError, UpdateExpr, WriteCondition, WriteItem},
};

pub(crate) fn write_atomically(store: &dyn Store, items: &[WriteItem]) -> Result<(), Error> {
    store
        .atomic_write(items)
        .map_err(|err| classify_rejection(items, err))
}

fn classify_rejection(items: &[WriteItem], err: StoreError) -> Error {
    let StoreError::TransactionCanceled { reasons } = &err else {
        return Error::Store(err);
    };

    for (item, reason) in items.iter().zip(reasons) {
        if *reason != CancellationReason::ConditionalCheckFailed {
            continue;
        }
        match item {
            WriteItem::Put { row, .. } if row.contains_key("unique_node_id") => {
                if let Some(pk) = item.pk() {
                    return Error::RecordNotUnique { pk: pk.to_string() };
                }
            }
            WriteItem::Update {
                key,
                expr: UpdateExpr::Add { column, .. },
                condition: Some(WriteCondition::RowExists),
            } if column == "count" => {
                return Error::CounterNotSaved {
                    pk: key.pk.clone(),
                };
            }
            _ => {}
        }
    }

    Error::Store(err)
}

///
/// TESTS
///
