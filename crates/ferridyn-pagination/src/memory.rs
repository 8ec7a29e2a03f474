//! In-memory partitioned secondary index.
//!
//! Holds every partition as a vector kept sorted by
//! `(sort key, primary key attributes...)`, which is the order DynamoDB uses
//! for a secondary index with duplicate sort values. Queries follow the same
//! paging contract as a remote table: exclusive start keys that need not exist,
//! a `last_evaluated_key` only when more data remains, and an optional cap on
//! items per response.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde_json::Map;

use crate::error::StoreError;
use crate::key_utils::{self, compare_key_values};
use crate::store::{IndexStore, QueryRequest, QueryResult};
use crate::types::Item;

pub struct MemoryIndexTable {
    index_name: String,
    partition_key_name: String,
    sort_key_name: String,
    primary_key_names: Vec<String>,
    max_page_items: Option<usize>,
    partitions: RwLock<BTreeMap<u32, Vec<Item>>>,
}

impl MemoryIndexTable {
    /// Create an empty index. `primary_key_names` are the table key attributes
    /// that disambiguate items sharing a sort key value.
    pub fn new(
        index_name: &str,
        partition_key_name: &str,
        sort_key_name: &str,
        primary_key_names: &[&str],
    ) -> Self {
        Self {
            index_name: index_name.to_string(),
            partition_key_name: partition_key_name.to_string(),
            sort_key_name: sort_key_name.to_string(),
            primary_key_names: primary_key_names.iter().map(|s| s.to_string()).collect(),
            max_page_items: None,
            partitions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Cap the number of items any single response carries, whatever the
    /// requested limit. Responses cut short by the cap report a
    /// `last_evaluated_key`.
    pub fn with_max_page_items(mut self, max: usize) -> Self {
        self.max_page_items = Some(max.max(1));
        self
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Insert an item, replacing any item with the same index key.
    pub fn put_item(&self, item: Item) -> Result<(), StoreError> {
        if !item.is_object() {
            return Err(StoreError::InvalidItem("item must be a JSON object".to_string()));
        }
        let partition = key_utils::partition_of(&item, &self.partition_key_name)
            .filter(|p| *p > 0)
            .ok_or_else(|| {
                StoreError::InvalidItem(format!(
                    "partition key '{}' must be a positive integer",
                    self.partition_key_name
                ))
            })?;
        for name in std::iter::once(&self.sort_key_name).chain(&self.primary_key_names) {
            if item.get(name).is_none() {
                return Err(StoreError::InvalidItem(format!(
                    "missing key attribute: {name}"
                )));
            }
        }

        let mut partitions = self.partitions.write();
        let items = partitions.entry(partition).or_default();
        match items.binary_search_by(|probe| self.compare_index_keys(probe, &item)) {
            Ok(pos) => items[pos] = item,
            Err(pos) => items.insert(pos, item),
        }
        Ok(())
    }

    pub fn put_items(&self, items: impl IntoIterator<Item = Item>) -> Result<(), StoreError> {
        items.into_iter().try_for_each(|item| self.put_item(item))
    }

    /// Remove the item matching `key`. Returns whether an item was removed.
    pub fn delete_item(&self, key: &Item) -> bool {
        let Some(partition) = key_utils::partition_of(key, &self.partition_key_name) else {
            return false;
        };
        let mut partitions = self.partitions.write();
        let Some(items) = partitions.get_mut(&partition) else {
            return false;
        };
        match items.binary_search_by(|probe| self.compare_index_keys(probe, key)) {
            Ok(pos) => {
                items.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.partitions.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Order two items (or keys) by sort key, then by primary key attributes.
    fn compare_index_keys(&self, a: &Item, b: &Item) -> Ordering {
        key_utils::compare_sort_keys(a, b, &self.sort_key_name).then_with(|| {
            self.primary_key_names
                .iter()
                .map(|name| {
                    compare_key_values(
                        key_utils::attribute(a, name),
                        key_utils::attribute(b, name),
                    )
                })
                .find(|ord| ord.is_ne())
                .unwrap_or(Ordering::Equal)
        })
    }

    fn key_of(&self, item: &Item) -> Item {
        let names = [self.partition_key_name.as_str(), self.sort_key_name.as_str()]
            .into_iter()
            .chain(self.primary_key_names.iter().map(String::as_str));
        key_utils::project_key(item, names, &Map::new())
    }
}

impl IndexStore for MemoryIndexTable {
    fn query(&self, request: &QueryRequest<'_>) -> Result<QueryResult, StoreError> {
        if request.index_name != self.index_name {
            return Err(StoreError::IndexNotFound(request.index_name.to_string()));
        }
        if request.limit == 0 {
            return Err(StoreError::InvalidRequest(
                "limit must be at least 1".to_string(),
            ));
        }

        let partitions = self.partitions.read();
        let Some(items) = partitions.get(&request.partition) else {
            return Ok(QueryResult::default());
        };

        let limit = match self.max_page_items {
            Some(cap) => cap.min(request.limit),
            None => request.limit,
        };

        // Skip items already seen (forward: key <= cursor, reverse: key >= cursor).
        let (page, remaining): (Vec<Item>, usize) = if request.scan_forward {
            let start = request.exclusive_start_key.map_or(0, |esk| {
                items.partition_point(|i| self.compare_index_keys(i, esk) != Ordering::Greater)
            });
            let candidates = &items[start..];
            (
                candidates.iter().take(limit).cloned().collect(),
                candidates.len(),
            )
        } else {
            let end = request.exclusive_start_key.map_or(items.len(), |esk| {
                items.partition_point(|i| self.compare_index_keys(i, esk) == Ordering::Less)
            });
            let candidates = &items[..end];
            (
                candidates.iter().rev().take(limit).cloned().collect(),
                candidates.len(),
            )
        };

        let last_evaluated_key = if remaining > page.len() {
            page.last().map(|item| self.key_of(item))
        } else {
            None
        };

        Ok(QueryResult {
            items: page,
            last_evaluated_key,
        })
    }
}

impl std::fmt::Debug for MemoryIndexTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryIndexTable")
            .field("index_name", &self.index_name)
            .field("partition_key_name", &self.partition_key_name)
            .field("sort_key_name", &self.sort_key_name)
            .field("primary_key_names", &self.primary_key_names)
            .field("max_page_items", &self.max_page_items)
            .field("items", &self.len())
            .finish()
    }
}
