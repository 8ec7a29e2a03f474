//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use ferridyn_pagination::{
    IndexStore, Item, MemoryIndexTable, PageToken, PaginatedSearch, PartitionedIndexConfig,
    PartitionedIndexConfigBuilder, QueryRequest, QueryResult, StoreError,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// One query as the store saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedQuery {
    pub partition: u32,
    pub start: Option<Value>,
    pub limit: usize,
    pub scan_forward: bool,
}

impl RecordedQuery {
    pub fn new(partition: u32, start: Option<Value>, limit: usize, scan_forward: bool) -> Self {
        Self {
            partition,
            start,
            limit,
            scan_forward,
        }
    }
}

/// Passes queries through to `inner` and records each one.
pub struct RecordingStore<S> {
    inner: S,
    calls: Mutex<Vec<RecordedQuery>>,
}

impl<S: IndexStore> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Drain the recorded queries.
    pub fn take_calls(&self) -> Vec<RecordedQuery> {
        std::mem::take(&mut *self.calls.lock())
    }
}

impl<S: IndexStore> IndexStore for RecordingStore<S> {
    fn query(&self, request: &QueryRequest<'_>) -> Result<QueryResult, StoreError> {
        self.calls.lock().push(RecordedQuery {
            partition: request.partition,
            start: request.exclusive_start_key.cloned(),
            limit: request.limit,
            scan_forward: request.scan_forward,
        });
        self.inner.query(request)
    }
}

/// Fails every query against one partition while armed.
pub struct FailingStore<S> {
    inner: S,
    partition: u32,
    armed: AtomicBool,
}

impl<S: IndexStore> FailingStore<S> {
    pub fn new(inner: S, partition: u32) -> Self {
        Self {
            inner,
            partition,
            armed: AtomicBool::new(false),
        }
    }

    pub fn arm(&self, armed: bool) {
        self.armed.store(armed, Ordering::SeqCst);
    }
}

impl<S: IndexStore> IndexStore for FailingStore<S> {
    fn query(&self, request: &QueryRequest<'_>) -> Result<QueryResult, StoreError> {
        if self.armed.load(Ordering::SeqCst) && request.partition == self.partition {
            return Err(StoreError::Throttled(format!(
                "partition {} over capacity",
                request.partition
            )));
        }
        self.inner.query(request)
    }
}

/// Reports more data on every query but never returns any items.
pub struct HollowStore;

impl IndexStore for HollowStore {
    fn query(&self, request: &QueryRequest<'_>) -> Result<QueryResult, StoreError> {
        Ok(QueryResult {
            items: Vec::new(),
            last_evaluated_key: Some(serde_json::json!({"part": request.partition})),
        })
    }
}

pub fn create_table() -> MemoryIndexTable {
    MemoryIndexTable::new("by-sort", "part", "sort", &["id"])
}

pub fn config_builder(
    store: Arc<dyn IndexStore>,
    partition_count: u32,
    id_placeholder: &str,
) -> PartitionedIndexConfigBuilder {
    PartitionedIndexConfig::builder(store)
        .index_name("by-sort")
        .partition_key("part")
        .sort_key("sort")
        .partition_count(partition_count)
        .required_field("id", id_placeholder)
}

pub fn create_config(
    store: Arc<dyn IndexStore>,
    partition_count: u32,
    id_placeholder: &str,
) -> PartitionedIndexConfig {
    config_builder(store, partition_count, id_placeholder)
        .build()
        .unwrap()
}

pub fn sorts(page: &[Item]) -> Vec<&str> {
    page.iter().map(|i| i["sort"].as_str().unwrap()).collect()
}

pub fn ids(page: &[Item]) -> Vec<&str> {
    page.iter().map(|i| i["id"].as_str().unwrap()).collect()
}

/// Open a search from a serialized token.
pub fn resume(config: &PartitionedIndexConfig, encoded: &str) -> PaginatedSearch {
    let token = PageToken::deserialize(encoded, config).unwrap();
    PaginatedSearch::new(config, token).unwrap()
}

/// Decode a serialized token to its JSON document.
pub fn token_json(encoded: &str) -> Value {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
