use crate::store::StoreError;
use thiserror::Error as ThisError;

///
/// Error
///
/// Domain-level error taxonomy. Each variant is raised at its natural layer;
/// store errors other than the two classified by the write boundary propagate
/// unchanged.
///

#[derive(Debug, ThisError)]
pub enum Error {
    /// A declared index, encryption, or counter field does not exist on the
    /// record type.
    #[error("field {field} is not present in the model {entity}")]
    FieldMisconfiguration { entity: String, field: String },

    /// The query references an unknown operation or no registered index
    /// covers its fields.
    #[error("query not supported: {message}")]
    QueryNotSupported { message: String },

    /// An atomic write was rejected by a unique-node condition.
    #[error("Record already exists with unique key {pk}")]
    RecordNotUnique { pk: String },

    /// A counter increment was attempted before the owning record was saved.
    #[error("counter has not been saved yet for {pk}")]
    CounterNotSaved { pk: String },

    /// The advisory lock could not be obtained within `max_wait`.
    #[error("failed to acquire lock for key {key}")]
    LockAcquisitionFailed { key: String },

    /// An operation referenced a record type that was never registered.
    #[error("model {entity} is not registered")]
    ModelNotRegistered { entity: String },

    /// A type declares encrypted fields but no encryption functions were
    /// registered before use.
    #[error("encryption functions must be registered before an encrypted field is used")]
    EncryptionNotConfigured,

    /// Record or node (de)serialization failed.
    #[error("serialization failed: {0}")]
    Codec(#[from] serde_json::Error),

    /// Underlying store failure, propagated unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    pub(crate) fn field_misconfiguration(
        entity: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self::FieldMisconfiguration {
            entity: entity.into(),
            field: field.into(),
        }
    }

    pub(crate) fn query_not_supported(message: impl Into<String>) -> Self {
        Self::QueryNotSupported {
            message: message.into(),
        }
    }
}
