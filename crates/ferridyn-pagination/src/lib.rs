//! # ferridyn-pagination
//!
//! Stable, bidirectional, cursor-based pages over a DynamoDB-style secondary
//! index whose data is sharded across partitions numbered `1..=N`.
//!
//! Every partition is queried and paged on its own; [`PaginatedSearch`] merges
//! the partition streams into one page ordered by sort key and emits a
//! [`PageToken`] for the next page and another for the previous one. Tokens
//! serialize to compact base64 strings suitable for "next"/"previous" links.
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//!
//! use ferridyn_pagination::{MemoryIndexTable, PageToken, PaginatedSearch, PartitionedIndexConfig};
//! use serde_json::json;
//!
//! let table = Arc::new(MemoryIndexTable::new("by-name", "shard", "name", &["id"]));
//! for (id, name) in ["ann", "bob", "cat", "dan", "eve"].iter().enumerate() {
//!     let shard = id % 2 + 1;
//!     table.put_item(json!({"shard": shard, "name": name, "id": id})).unwrap();
//! }
//!
//! let config = PartitionedIndexConfig::builder(table)
//!     .index_name("by-name")
//!     .partition_key("shard")
//!     .sort_key("name")
//!     .partition_count(2)
//!     .required_field("id", 0)
//!     .build()
//!     .unwrap();
//!
//! // First page.
//! let mut search = PaginatedSearch::new(&config, PageToken::new(&config)).unwrap();
//! let page = search.get_next_page(3).unwrap();
//! let names: Vec<_> = page.iter().map(|item| item["name"].as_str().unwrap()).collect();
//! assert_eq!(names, ["ann", "bob", "cat"]);
//!
//! // Follow the "next" link.
//! let next = search.get_page_token(true).unwrap();
//! let token = PageToken::deserialize(&next, &config).unwrap();
//! let mut search = PaginatedSearch::new(&config, token).unwrap();
//! let page = search.get_next_page(3).unwrap();
//! let names: Vec<_> = page.iter().map(|item| item["name"].as_str().unwrap()).collect();
//! assert_eq!(names, ["dan", "eve"]);
//! assert!(search.get_page_token(true).is_none());
//! ```

pub mod config;
pub mod error;
pub mod key_utils;
pub mod memory;
pub mod search;
pub mod store;
pub mod token;
pub mod types;

pub use config::{IndexSettings, PartitionedIndexConfig, PartitionedIndexConfigBuilder};
pub use error::{
    ConfigError, Error, Result, StoreError, TokenDecodingError, TokenValidationError,
};
pub use memory::MemoryIndexTable;
pub use search::PaginatedSearch;
pub use store::{IndexStore, QueryRequest, QueryResult};
pub use token::{PageToken, PartitionCursor, get_page_token_for_inclusive_start};
pub use types::{Direction, Item, StartMode};
