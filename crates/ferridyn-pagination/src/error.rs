//! Error types for partitioned pagination.

use thiserror::Error;

/// Top-level error type for pagination operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    TokenDecoding(#[from] TokenDecodingError),

    #[error(transparent)]
    TokenValidation(#[from] TokenValidationError),

    #[error("query on partition {partition} failed: {source}")]
    Store {
        partition: u32,
        #[source]
        source: StoreError,
    },

    #[error("inconsistent state on partition {partition}: {reason}")]
    InconsistentState { partition: u32, reason: String },

    #[error("page size must be at least 1")]
    InvalidPageSize,
}

/// Invalid index configuration. Raised at construction, never while paging.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("partition count must be positive (got {0})")]
    InvalidPartitionCount(u32),

    #[error("missing field name: {0}")]
    MissingFieldName(&'static str),

    #[error("partition key and sort key must differ (both are '{0}')")]
    DuplicateKeyField(String),

    #[error("required field '{0}' collides with a key field")]
    RequiredFieldIsKey(String),

    #[error("match scan batch size must be at least 1")]
    InvalidBatchSize,

    #[error("failed to build fetch thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("invalid index settings: {0}")]
    Settings(#[from] serde_json::Error),
}

/// A page token could not be decoded into a JSON document.
#[derive(Debug, Error)]
pub enum TokenDecodingError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("token is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("malformed token document: {0}")]
    Json(#[from] serde_json::Error),
}

/// A page token decoded cleanly but describes an impossible position.
#[derive(Debug, Error)]
pub enum TokenValidationError {
    #[error("unknown direction: '{0}'")]
    UnknownDirection(String),

    #[error("invalid partition index: '{0}'")]
    InvalidPartitionIndex(String),

    #[error("partition {partition} is outside 1..={partition_count}")]
    PartitionOutOfRange { partition: u32, partition_count: u32 },

    #[error("unknown inclusive mode on partition {partition}: {value}")]
    UnknownInclusive { partition: u32, value: String },

    #[error("cursor key on partition {0} must be an object")]
    KeyNotObject(u32),

    #[error("partition {0} sets 'inclusive' without a key")]
    InclusiveWithoutKey(u32),
}

/// Failure reported by an [`IndexStore`](crate::store::IndexStore) adapter.
///
/// The engine never retries; adapters own any retry policy.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("index not found: {0}")]
    IndexNotFound(String),

    #[error("invalid item: {0}")]
    InvalidItem(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request throttled: {0}")]
    Throttled(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, Error>;
