use crate::{error::Error, model::ModelSpec};
use std::{collections::HashMap, sync::Arc};

/// Process-wide encryption primitive. Pure string-to-string; key handling
/// lives entirely on the caller's side.
pub type CryptoFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

///
/// Registry
///
/// Registered record types and the process-wide encryption functions.
/// Populated during startup registration and read-only afterwards; the rest
/// of the crate only ever borrows it.
///

#[derive(Default)]
pub struct Registry {
    models: HashMap<&'static str, ModelSpec>,
    encrypt: Option<CryptoFn>,
    decrypt: Option<CryptoFn>,
}

impl Registry {
    /// Register (or re-register) a record type under its entity name.
    pub fn register(&mut self, entity_name: &'static str, spec: ModelSpec) {
        self.models.insert(entity_name, spec);
    }

    pub fn spec(&self, entity_name: &str) -> Result<&ModelSpec, Error> {
        self.models
            .get(entity_name)
            .ok_or_else(|| Error::ModelNotRegistered {
                entity: entity_name.to_string(),
            })
    }

    #[must_use]
    pub fn is_registered(&self, entity_name: &str) -> bool {
        self.models.contains_key(entity_name)
    }

    pub fn register_encryption(&mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) {
        self.encrypt = Some(Arc::new(f));
    }

    pub fn register_decryption(&mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) {
        self.decrypt = Some(Arc::new(f));
    }

    /// Required before any encrypted field is written.
    pub fn encrypt_fn(&self) -> Result<&CryptoFn, Error> {
        self.encrypt.as_ref().ok_or(Error::EncryptionNotConfigured)
    }

    /// Required before any auto-decrypting read.
    pub fn decrypt_fn(&self) -> Result<&CryptoFn, Error> {
        self.decrypt.as_ref().ok_or(Error::EncryptionNotConfigured)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_models_are_an_eager_error() {
        let registry = Registry::default();
        assert!(matches!(
            registry.spec("Ghost"),
            Err(Error::ModelNotRegistered { .. })
        ));
    }

    #[test]
    fn missing_crypto_functions_are_a_configuration_error() {
        let registry = Registry::default();
        assert!(matches!(
            registry.encrypt_fn(),
            Err(Error::EncryptionNotConfigured)
        ));
    }

    #[test]
    fn registration_round_trips_the_spec() {
        let mut registry = Registry::default();
        registry.register("MyModel", ModelSpec::default());
        assert!(registry.is_registered("MyModel"));
        assert!(registry.spec("MyModel").is_ok());
    }
}
