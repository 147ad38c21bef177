//! Paginated query iteration.
//!
//! `RecordBatches` is the cursor: each `next_batch` call is one store round
//! trip of at most 50 rows, parsed into the plan's node shape and rehydrated
//! into records. `Records` flattens batches into single records, pulling
//! further pages on demand. Neither is safe to share across callers; resume
//! a query elsewhere by handing `last_evaluated_key` to `QueryOptions`.

use crate::{
    db::{
        Db,
        query::{NodeShape, QueryOptions, QueryPlan},
        write,
    },
    error::Error,
    key::NodeKey,
    model::{ModelSpec, Record},
    node::Node,
    store::{QueryRequest, StoreError},
};
use std::marker::PhantomData;

/// Rows fetched per store round trip.
const BATCH_SIZE: usize = 50;

///
/// RecordBatches
///

pub struct RecordBatches<'d, R: Record> {
    db: &'d Db,
    spec: &'d ModelSpec,
    plan: QueryPlan,
    last_evaluated_key: Option<NodeKey>,
    more_to_query: bool,
    fetched: usize,
    max_records: Option<usize>,
    _marker: PhantomData<R>,
}

impl<R: Record> std::fmt::Debug for RecordBatches<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordBatches")
            .field("plan", &self.plan)
            .field("last_evaluated_key", &self.last_evaluated_key)
            .field("more_to_query", &self.more_to_query)
            .field("fetched", &self.fetched)
            .field("max_records", &self.max_records)
            .finish()
    }
}

impl<'d, R: Record> RecordBatches<'d, R> {
    pub(crate) fn new(
        db: &'d Db,
        spec: &'d ModelSpec,
        plan: QueryPlan,
        options: QueryOptions,
    ) -> Self {
        Self {
            db,
            spec,
            plan,
            last_evaluated_key: options.start_key,
            more_to_query: true,
            fetched: 0,
            max_records: options.max_records,
            _marker: PhantomData,
        }
    }

    /// Fetch the next page. `None` once the scan is exhausted or the
    /// `max_records` cap is reached.
    pub fn next_batch(&mut self) -> Result<Option<Vec<R>>, Error> {
        let limit = self.next_limit();
        if !self.more_to_query || limit == 0 {
            return Ok(None);
        }

        let request = QueryRequest {
            index: self.plan.index,
            condition: self.plan.condition.clone(),
            scan_forward: self.plan.scan_forward,
            limit,
            consistent: self.plan.consistent,
            start_key: self.last_evaluated_key.clone(),
        };
        let page = self.db.store().query(&request)?;

        self.more_to_query = page.last_evaluated_key.is_some();
        self.last_evaluated_key = page.last_evaluated_key;

        let mut records = Vec::with_capacity(page.rows.len());
        for row in &page.rows {
            let raw_data = match (self.plan.shape, Node::from_row(row)?) {
                (NodeShape::Query, Node::Query(node)) => node.raw_data,
                (NodeShape::Base, Node::Base(node)) => node.raw_data,
                (_, other) => {
                    return Err(Error::Store(StoreError::Corrupt {
                        message: format!(
                            "query matched a {:?} node where a {:?} row was expected",
                            other.node_type(),
                            self.plan.shape
                        ),
                    }));
                }
            };
            records.push(write::rehydrate::<R>(self.db, self.spec, &raw_data)?);
        }

        self.fetched += records.len();
        Ok(Some(records))
    }

    /// Drain the cursor eagerly.
    pub fn fetch_all(&mut self) -> Result<Vec<R>, Error> {
        let mut all = Vec::new();
        while let Some(batch) = self.next_batch()? {
            all.extend(batch);
        }
        Ok(all)
    }

    /// Flatten into single records, fetching lazily.
    #[must_use]
    pub fn records(self) -> Records<'d, R> {
        Records {
            batches: self,
            buffer: Vec::new().into_iter(),
        }
    }

    /// Resume point for a later query, opaque to callers.
    #[must_use]
    pub const fn last_evaluated_key(&self) -> Option<&NodeKey> {
        self.last_evaluated_key.as_ref()
    }

    #[must_use]
    pub const fn more_to_query(&self) -> bool {
        self.more_to_query
    }

    fn next_limit(&self) -> usize {
        self.max_records.map_or(BATCH_SIZE, |max| {
            BATCH_SIZE.min(max.saturating_sub(self.fetched))
        })
    }
}

///
/// Records
///

pub struct Records<'d, R: Record> {
    batches: RecordBatches<'d, R>,
    buffer: std::vec::IntoIter<R>,
}

impl<R: Record> Records<'_, R> {
    #[must_use]
    pub const fn last_evaluated_key(&self) -> Option<&NodeKey> {
        self.batches.last_evaluated_key()
    }

    #[must_use]
    pub const fn more_to_query(&self) -> bool {
        self.batches.more_to_query()
    }
}

impl<R: Record> Iterator for Records<'_, R> {
    type Item = Result<R, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.next() {
                return Some(Ok(record));
            }
            match self.batches.next_batch() {
                Ok(Some(batch)) => self.buffer = batch.into_iter(),
                Ok(None) => return None,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
