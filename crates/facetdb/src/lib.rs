//! FacetDB core: a materialized-view object layer over a single wide-column
//! key-value table.
//!
//! Contract:
//! - Every declared access pattern (unique constraint or ordered query index)
//!   resolves to a single partition+range scan against the underlying table.
//! - A record and all of its derived rows change in one atomic write; the
//!   uniqueness invariant is enforced by conditional puts, never by reads.
//! - Key encodings are deterministic and lexicographically ordered so the
//!   store's native sort order is the query order.

pub mod db;
pub mod error;
pub mod key;
pub mod model;
pub mod node;
pub mod store;
pub mod value;

///
/// CONSTANTS
///

/// Component separator inside materialized sort keys.
pub const SEPARATOR: &str = "##";

/// Prefix marking a field value that has already been encrypted.
///
/// Stored strings carrying this prefix are never re-encrypted on save and are
/// the only values auto-decrypt will touch on read.
pub const ENCRYPTED_FIELD_PREFIX: &str = "##encrypted##";

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No stores, serializers, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        db::{
            Db,
            query::{
                AllQuery, KeyConditionQuery, Query, QueryOp, QueryOptions, StandardQuery,
                StandardQueryStatement,
            },
        },
        error::Error,
        model::{Index, ModelSpec, QueryIndex, Record, UniqueIndex},
        value::{FieldValue, Value},
    };
}
