//! Configuration of one partitioned index: the store handle, key attribute
//! names, partition numbering, and engine tuning.

use std::ops::RangeInclusive;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::key_utils;
use crate::store::IndexStore;
use crate::types::{DEFAULT_MATCH_SCAN_BATCH_SIZE, Item};

fn default_match_scan_batch_size() -> usize {
    DEFAULT_MATCH_SCAN_BATCH_SIZE
}

/// Serializable index settings, e.g. loaded from a deployment's JSON config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSettings {
    pub index_name: String,
    pub partition_key_name: String,
    pub sort_key_name: String,
    pub partition_count: u32,
    /// Attributes every synthetic start key must carry, with the placeholder
    /// values to use when the real value is unknown.
    #[serde(default)]
    pub required_fields: Map<String, Value>,
    #[serde(default = "default_match_scan_batch_size")]
    pub match_scan_batch_size: usize,
    /// Issue each page's opening partition queries concurrently.
    #[serde(default)]
    pub parallel_fetch: bool,
}

impl IndexSettings {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Immutable description of a partitioned index. Cheap to clone and safe to
/// share across concurrent searches.
#[derive(Clone)]
pub struct PartitionedIndexConfig {
    table: Arc<dyn IndexStore>,
    index_name: String,
    partition_key_name: String,
    sort_key_name: String,
    partition_count: u32,
    required_fields: Map<String, Value>,
    match_scan_batch_size: usize,
    fetch_pool: Option<Arc<rayon::ThreadPool>>,
}

impl PartitionedIndexConfig {
    pub fn new(
        table: Arc<dyn IndexStore>,
        index_name: &str,
        partition_key_name: &str,
        sort_key_name: &str,
        partition_count: u32,
        required_fields: Map<String, Value>,
    ) -> Result<Self, ConfigError> {
        Self::from_settings(
            table,
            IndexSettings {
                index_name: index_name.to_string(),
                partition_key_name: partition_key_name.to_string(),
                sort_key_name: sort_key_name.to_string(),
                partition_count,
                required_fields,
                match_scan_batch_size: DEFAULT_MATCH_SCAN_BATCH_SIZE,
                parallel_fetch: false,
            },
        )
    }

    pub fn builder(table: Arc<dyn IndexStore>) -> PartitionedIndexConfigBuilder {
        PartitionedIndexConfigBuilder::new(table)
    }

    pub fn from_settings(
        table: Arc<dyn IndexStore>,
        settings: IndexSettings,
    ) -> Result<Self, ConfigError> {
        if settings.partition_count == 0 {
            return Err(ConfigError::InvalidPartitionCount(settings.partition_count));
        }
        if settings.index_name.is_empty() {
            return Err(ConfigError::MissingFieldName("index_name"));
        }
        if settings.partition_key_name.is_empty() {
            return Err(ConfigError::MissingFieldName("partition_key_name"));
        }
        if settings.sort_key_name.is_empty() {
            return Err(ConfigError::MissingFieldName("sort_key_name"));
        }
        if settings.partition_key_name == settings.sort_key_name {
            return Err(ConfigError::DuplicateKeyField(settings.sort_key_name));
        }
        if let Some(name) = settings
            .required_fields
            .keys()
            .find(|name| **name == settings.partition_key_name || **name == settings.sort_key_name)
        {
            return Err(ConfigError::RequiredFieldIsKey(name.clone()));
        }
        if settings.match_scan_batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }

        let fetch_pool = if settings.parallel_fetch {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(settings.partition_count as usize)
                .thread_name(|i| format!("partition-fetch-{i}"))
                .build()?;
            Some(Arc::new(pool))
        } else {
            None
        };

        Ok(Self {
            table,
            index_name: settings.index_name,
            partition_key_name: settings.partition_key_name,
            sort_key_name: settings.sort_key_name,
            partition_count: settings.partition_count,
            required_fields: settings.required_fields,
            match_scan_batch_size: settings.match_scan_batch_size,
            fetch_pool,
        })
    }

    pub fn table(&self) -> &dyn IndexStore {
        self.table.as_ref()
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn partition_key_name(&self) -> &str {
        &self.partition_key_name
    }

    pub fn sort_key_name(&self) -> &str {
        &self.sort_key_name
    }

    pub fn partition_count(&self) -> u32 {
        self.partition_count
    }

    /// Partition numbers, `1..=partition_count`.
    pub fn partitions(&self) -> RangeInclusive<u32> {
        1..=self.partition_count
    }

    pub fn contains_partition(&self, partition: u32) -> bool {
        self.partitions().contains(&partition)
    }

    pub fn required_fields(&self) -> &Map<String, Value> {
        &self.required_fields
    }

    pub fn match_scan_batch_size(&self) -> usize {
        self.match_scan_batch_size
    }

    pub fn parallel_fetch(&self) -> bool {
        self.fetch_pool.is_some()
    }

    pub(crate) fn fetch_pool(&self) -> Option<&rayon::ThreadPool> {
        self.fetch_pool.as_deref()
    }

    /// Reduce an item to the attributes a cursor needs: partition key, sort
    /// key, and every required field.
    pub fn key_of(&self, item: &Item) -> Item {
        let names = [self.partition_key_name.as_str(), self.sort_key_name.as_str()]
            .into_iter()
            .chain(self.required_fields.keys().map(String::as_str));
        key_utils::project_key(item, names, &self.required_fields)
    }
}

impl std::fmt::Debug for PartitionedIndexConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionedIndexConfig")
            .field("index_name", &self.index_name)
            .field("partition_key_name", &self.partition_key_name)
            .field("sort_key_name", &self.sort_key_name)
            .field("partition_count", &self.partition_count)
            .field("required_fields", &self.required_fields)
            .field("match_scan_batch_size", &self.match_scan_batch_size)
            .field("parallel_fetch", &self.parallel_fetch())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// PartitionedIndexConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for [`PartitionedIndexConfig`].
pub struct PartitionedIndexConfigBuilder {
    table: Arc<dyn IndexStore>,
    index_name: Option<String>,
    partition_key_name: Option<String>,
    sort_key_name: Option<String>,
    partition_count: u32,
    required_fields: Map<String, Value>,
    match_scan_batch_size: usize,
    parallel_fetch: bool,
}

impl PartitionedIndexConfigBuilder {
    fn new(table: Arc<dyn IndexStore>) -> Self {
        Self {
            table,
            index_name: None,
            partition_key_name: None,
            sort_key_name: None,
            partition_count: 0,
            required_fields: Map::new(),
            match_scan_batch_size: DEFAULT_MATCH_SCAN_BATCH_SIZE,
            parallel_fetch: false,
        }
    }

    pub fn index_name(mut self, name: &str) -> Self {
        self.index_name = Some(name.to_string());
        self
    }

    pub fn partition_key(mut self, name: &str) -> Self {
        self.partition_key_name = Some(name.to_string());
        self
    }

    pub fn sort_key(mut self, name: &str) -> Self {
        self.sort_key_name = Some(name.to_string());
        self
    }

    pub fn partition_count(mut self, count: u32) -> Self {
        self.partition_count = count;
        self
    }

    /// Add a field every synthetic start key carries.
    pub fn required_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.required_fields.insert(name.to_string(), value.into());
        self
    }

    pub fn match_scan_batch_size(mut self, size: usize) -> Self {
        self.match_scan_batch_size = size;
        self
    }

    pub fn parallel_fetch(mut self, enabled: bool) -> Self {
        self.parallel_fetch = enabled;
        self
    }

    pub fn build(self) -> Result<PartitionedIndexConfig, ConfigError> {
        let settings = IndexSettings {
            index_name: self
                .index_name
                .ok_or(ConfigError::MissingFieldName("index_name"))?,
            partition_key_name: self
                .partition_key_name
                .ok_or(ConfigError::MissingFieldName("partition_key_name"))?,
            sort_key_name: self
                .sort_key_name
                .ok_or(ConfigError::MissingFieldName("sort_key_name"))?,
            partition_count: self.partition_count,
            required_fields: self.required_fields,
            match_scan_batch_size: self.match_scan_batch_size,
            parallel_fetch: self.parallel_fetch,
        };
        PartitionedIndexConfig::from_settings(self.table, settings)
    }
}
