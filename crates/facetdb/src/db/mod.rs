mod boundary;
mod counter;
mod crypto;
pub mod query;
mod write;

use crate::{
    error::Error,
    model::{ModelSpec, Record, registry::Registry},
    store::{Store, lock::LockOptions},
};
use query::{Query, QueryOptions, RecordBatches};
use std::sync::Arc;

///
/// Db
///
/// Application-owned root: the store handle, the registry of record types,
/// and the advisory-lock tuning. Registration happens while the owner still
/// holds `&mut Db`; afterwards every operation takes `&self` and the
/// registry is read-only, so a `Db` shares freely across threads.
///

pub struct Db {
    store: Arc<dyn Store>,
    registry: Registry,
    lock_options: LockOptions,
}

impl Db {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            registry: Registry::default(),
            lock_options: LockOptions::default(),
        }
    }

    #[must_use]
    pub const fn with_lock_options(mut self, lock_options: LockOptions) -> Self {
        self.lock_options = lock_options;
        self
    }

    /// Declare a record type's indices, encryption, and counters.
    pub fn register<R: Record>(&mut self, spec: ModelSpec) {
        self.registry.register(R::ENTITY_NAME, spec);
    }

    pub fn register_encryption(&mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) {
        self.registry.register_encryption(f);
    }

    pub fn register_decryption(&mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) {
        self.registry.register_decryption(f);
    }

    /// Persist `record` and every derived row in one atomic write,
    /// garbage-collecting rows the previous version materialized but this
    /// one no longer does.
    pub fn save<R: Record>(&self, record: &mut R) -> Result<(), Error> {
        write::save(self, record)
    }

    /// Consistent read of the canonical row, rehydrated (and auto-decrypted
    /// when the type opts in).
    pub fn get_by_id<R: Record>(&self, id: &str) -> Result<Option<R>, Error> {
        write::get_by_id(self, id)
    }

    pub fn delete<R: Record>(&self, record: &R) -> Result<(), Error> {
        write::delete_by_id::<R>(self, record.id())
    }

    /// Remove the record's whole node set. A no-op for unknown ids.
    pub fn delete_by_id<R: Record>(&self, id: &str) -> Result<(), Error> {
        write::delete_by_id::<R>(self, id)
    }

    /// Resolve `query` against the type's registered indices and return the
    /// paginated batch cursor. Configuration errors surface here, before
    /// any store round-trip.
    pub fn query<R: Record>(
        &self,
        query: impl Into<Query>,
        options: QueryOptions,
    ) -> Result<RecordBatches<'_, R>, Error> {
        let spec = self.registry.spec(R::ENTITY_NAME)?;
        let plan = query::plan(R::ENTITY_NAME, spec, &query.into(), options.descending)?;
        Ok(RecordBatches::new(self, spec, plan, options))
    }

    /// Atomically add `amount` to a declared counter field. Fails with
    /// `CounterNotSaved` until the owning record's first save has
    /// materialized the counter row.
    pub fn increment_counter<R: Record>(
        &self,
        record: &mut R,
        field: &str,
        amount: i64,
    ) -> Result<i64, Error> {
        counter::increment(self, record, field, amount)
    }

    /// Copy the stored counts onto the record's counter fields. A no-op for
    /// records that were never saved.
    pub fn sync_counters<R: Record>(&self, record: &mut R) -> Result<(), Error> {
        counter::sync(self, record)
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub(crate) const fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) const fn lock_options(&self) -> &LockOptions {
        &self.lock_options
    }
}
