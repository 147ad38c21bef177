//! Advisory per-record lease.
//!
//! Cooperating writers serialize on a record id by holding a lease row while
//! they run a save or delete. The lock is advisory: a writer that bypasses it
//! still gets atomic per-call effects from `atomic_write`, and the unique-node
//! condition protects cross-record invariants regardless.

use crate::{
    error::Error,
    store::{Row, Store, StoreError, WriteCondition},
};
use chrono::Utc;
use std::{sync::Arc, thread, time::Duration};
use ulid::Ulid;

/// Partition prefix of every lease row. Keeps the lock namespace disjoint
/// from record ids.
pub const LOCK_PK_PREFIX: &str = "immaterial_lock#";

const RETRY_INTERVAL: Duration = Duration::from_millis(500);

///
/// LockOptions
///

#[derive(Clone, Copy, Debug)]
pub struct LockOptions {
    /// Upper bound on how long a crashed holder can block others.
    pub ttl: Duration,
    /// How long an acquirer keeps retrying before failing.
    pub max_wait: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(15),
            max_wait: Duration::from_secs(5),
        }
    }
}

///
/// RecordLock
///
/// A held lease. Released on drop; a failed release is logged and tolerated
/// because the TTL bounds the damage.
///

pub struct RecordLock {
    store: Arc<dyn Store>,
    pk: String,
    lease: String,
    released: bool,
}

impl RecordLock {
    /// Insert a lease row conditionally, retrying every 500 ms while another
    /// lease is live, until `max_wait` elapses.
    pub fn acquire(
        store: &Arc<dyn Store>,
        key: &str,
        options: &LockOptions,
    ) -> Result<Self, Error> {
        let pk = format!("{LOCK_PK_PREFIX}{key}");
        let lease = Ulid::new().to_string();
        let deadline = Utc::now()
            + chrono::Duration::from_std(options.max_wait).unwrap_or(chrono::Duration::zero());

        loop {
            let now = Utc::now();
            let ttl = chrono::Duration::from_std(options.ttl).unwrap_or(chrono::Duration::zero());

            let mut row = Row::new();
            row.insert("pk".to_string(), pk.clone().into());
            row.insert("sk".to_string(), lease.clone().into());
            row.insert("expire_time".to_string(), (now + ttl).to_rfc3339().into());

            match store.put(row, Some(WriteCondition::NotExistsOrExpired { now })) {
                Ok(()) => {
                    tracing::debug!(key, lease = %lease, "record lock acquired");
                    return Ok(Self {
                        store: Arc::clone(store),
                        pk,
                        lease,
                        released: false,
                    });
                }
                Err(StoreError::ConditionalCheckFailed { .. }) => {
                    if Utc::now() >= deadline {
                        tracing::warn!(key, "record lock not acquired within max_wait");
                        return Err(Error::LockAcquisitionFailed {
                            key: key.to_string(),
                        });
                    }
                    tracing::debug!(key, "record lock held elsewhere, retrying");
                    thread::sleep(RETRY_INTERVAL);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(err) = self.store.delete(&self.pk, &self.lease) {
            tracing::warn!(pk = %self.pk, error = %err, "failed to release record lock");
        } else {
            tracing::debug!(pk = %self.pk, "record lock released");
        }
    }
}

impl Drop for RecordLock {
    fn drop(&mut self) {
        self.release();
    }
}

///
/// TESTS
///
