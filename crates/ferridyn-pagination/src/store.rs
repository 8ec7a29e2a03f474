//! The query contract the pagination engine consumes.

use std::sync::Arc;

use crate::error::StoreError;
use crate::types::Item;

/// One page request against a single partition of a secondary index.
#[derive(Debug, Clone, Copy)]
pub struct QueryRequest<'a> {
    pub partition: u32,
    pub index_name: &'a str,
    /// Resume strictly after this key. `None` starts at the natural beginning
    /// of the partition in the scan direction.
    pub exclusive_start_key: Option<&'a Item>,
    pub limit: usize,
    /// Ascending sort key order when `true`, descending otherwise.
    pub scan_forward: bool,
}

/// Result of a query.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub items: Vec<Item>,
    /// Present iff strictly more data exists beyond `items` in the scan
    /// direction. May be present with fewer than `limit` items.
    pub last_evaluated_key: Option<Item>,
}

/// A partitioned key-value index that can be paged one partition at a time.
///
/// Implementations return items in the index's native order for the requested
/// partition and direction. The engine issues reads only.
pub trait IndexStore: Send + Sync {
    fn query(&self, request: &QueryRequest<'_>) -> Result<QueryResult, StoreError>;
}

impl<T: IndexStore + ?Sized> IndexStore for Arc<T> {
    fn query(&self, request: &QueryRequest<'_>) -> Result<QueryResult, StoreError> {
        (**self).query(request)
    }
}
