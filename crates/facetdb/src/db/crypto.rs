//! Field encryption walk.
//!
//! The sentinel prefix makes sealing idempotent: a value already carrying it
//! is never re-encrypted, so repeated saves and save-after-read cycles are
//! safe. Only string values participate; everything else is skipped.

use crate::{
    ENCRYPTED_FIELD_PREFIX,
    error::Error,
    model::{ModelSpec, Record, registry::Registry},
    value::Value,
};

pub(crate) fn encrypt_fields<R: Record>(
    registry: &Registry,
    record: &mut R,
    spec: &ModelSpec,
) -> Result<(), Error> {
    if spec.encrypted_fields.is_empty() {
        return Ok(());
    }
    let encrypt = registry.encrypt_fn()?;

    for name in &spec.encrypted_fields {
        let value = record
            .field(name)
            .ok_or_else(|| Error::field_misconfiguration(R::ENTITY_NAME, name))?;
        match value {
            Value::String(text) if text.starts_with(ENCRYPTED_FIELD_PREFIX) => {}
            Value::String(text) => {
                let sealed = format!("{ENCRYPTED_FIELD_PREFIX}{}", encrypt(&text));
                record.set_field(name, Value::String(sealed));
            }
            Value::Null => {
                tracing::debug!(field = %name, "skipping encryption of unset field");
            }
            _ => {
                tracing::warn!(field = %name, "skipping encryption of non-string field");
            }
        }
    }

    Ok(())
}

pub(crate) fn decrypt_fields<R: Record>(
    registry: &Registry,
    record: &mut R,
    spec: &ModelSpec,
) -> Result<(), Error> {
    if spec.encrypted_fields.is_empty() {
        return Ok(());
    }
    let decrypt = registry.decrypt_fn()?;

    for name in &spec.encrypted_fields {
        let Some(Value::String(text)) = record.field(name) else {
            continue;
        };
        if let Some(ciphertext) = text.strip_prefix(ENCRYPTED_FIELD_PREFIX) {
            record.set_field(name, Value::String(decrypt(ciphertext)));
        }
    }

    Ok(())
}
