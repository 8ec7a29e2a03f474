//! Per-partition page stream.
//!
//! A stream resolves where its partition resumes (probing for an anchor when
//! the cursor is inclusive), then feeds the merge one item at a time and
//! refills from the store whenever it drains while the store still reports
//! more data.

use std::cmp::Ordering;
use std::collections::VecDeque;

use tracing::{debug, trace, warn};

use crate::config::PartitionedIndexConfig;
use crate::error::{Error, Result};
use crate::key_utils::{self, compare_key_values};
use crate::store::{QueryRequest, QueryResult};
use crate::token::PartitionCursor;
use crate::types::{Direction, Item};

/// Successor cursors of one partition after a page.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PartitionOutcome {
    /// Continue in the page's direction.
    pub(crate) ahead: PartitionCursor,
    /// Continue in the opposite direction, i.e. toward the previous page.
    pub(crate) behind: PartitionCursor,
}

#[derive(Debug)]
pub(crate) struct PartitionStream {
    partition: u32,
    direction: Direction,
    /// The partition was already exhausted and was not queried.
    skipped: bool,
    /// Exclusive start of the page's first main query. `None` is the natural
    /// beginning of the partition.
    resume_from: Option<Item>,
    buffer: VecDeque<Item>,
    next_start: Option<Item>,
    more: bool,
    /// First item the stream produced this page.
    head: Option<Item>,
    last_taken: Option<Item>,
}

impl PartitionStream {
    fn new(partition: u32, direction: Direction, resume_from: Option<Item>) -> Self {
        Self {
            partition,
            direction,
            skipped: false,
            next_start: resume_from.clone(),
            resume_from,
            buffer: VecDeque::new(),
            more: true,
            head: None,
            last_taken: None,
        }
    }

    /// Resolve `cursor` and run the partition's first main query.
    pub(crate) fn open(
        config: &PartitionedIndexConfig,
        partition: u32,
        cursor: &PartitionCursor,
        direction: Direction,
        page_size: usize,
    ) -> Result<Self> {
        let resume_from = match cursor {
            PartitionCursor::Exhausted => {
                let mut stream = Self::new(partition, direction, None);
                stream.skipped = true;
                stream.more = false;
                return Ok(stream);
            }
            PartitionCursor::Unvisited | PartitionCursor::Start => None,
            PartitionCursor::Exclusive(key) => Some(key.clone()),
            PartitionCursor::Inclusive(key) => probe_anchor(config, partition, key, direction)?,
            PartitionCursor::MatchSortKey(key) => {
                scan_for_boundary(config, partition, key, direction)?
            }
        };

        let mut stream = Self::new(partition, direction, resume_from);
        stream.fetch(config, page_size)?;
        Ok(stream)
    }

    fn fetch(&mut self, config: &PartitionedIndexConfig, limit: usize) -> Result<()> {
        let result = run_query(
            config,
            self.partition,
            self.next_start.as_ref(),
            limit,
            self.direction,
        )?;
        if result.items.is_empty() && result.last_evaluated_key.is_some() {
            return Err(inconsistent(
                self.partition,
                "store reported more data but returned no items",
            ));
        }

        if self.head.is_none() {
            self.head = result.items.first().cloned();
        }
        self.more = result.last_evaluated_key.is_some();
        self.next_start = result.last_evaluated_key;
        self.buffer.extend(result.items);
        Ok(())
    }

    /// Query again if every buffered item has been taken and more data exists.
    pub(crate) fn refill(&mut self, config: &PartitionedIndexConfig, limit: usize) -> Result<()> {
        if self.buffer.is_empty() && self.more {
            trace!(partition = self.partition, "refilling drained partition");
            self.fetch(config, limit)?;
        }
        Ok(())
    }

    pub(crate) fn peek(&self) -> Option<&Item> {
        self.buffer.front()
    }

    pub(crate) fn take(&mut self) -> Option<Item> {
        let item = self.buffer.pop_front()?;
        self.last_taken = Some(item.clone());
        Some(item)
    }

    pub(crate) fn is_exhausted(&self) -> bool {
        self.buffer.is_empty() && !self.more
    }

    pub(crate) fn outcome(&self, config: &PartitionedIndexConfig) -> PartitionOutcome {
        let ahead = if self.is_exhausted() {
            PartitionCursor::Exhausted
        } else if let Some(item) = &self.last_taken {
            PartitionCursor::Exclusive(config.key_of(item))
        } else {
            match &self.resume_from {
                Some(key) => PartitionCursor::Exclusive(key.clone()),
                None => PartitionCursor::Start,
            }
        };

        // A skipped partition has nothing ahead, so all of it lies behind.
        let behind = if self.skipped {
            PartitionCursor::Start
        } else if self.resume_from.is_none() {
            PartitionCursor::Exhausted
        } else if let Some(item) = &self.head {
            PartitionCursor::Exclusive(config.key_of(item))
        } else {
            PartitionCursor::Start
        };

        PartitionOutcome { ahead, behind }
    }
}

fn run_query(
    config: &PartitionedIndexConfig,
    partition: u32,
    exclusive_start_key: Option<&Item>,
    limit: usize,
    direction: Direction,
) -> Result<QueryResult> {
    debug!(
        partition,
        limit,
        direction = direction.as_str(),
        has_start = exclusive_start_key.is_some(),
        "querying partition"
    );
    let request = QueryRequest {
        partition,
        index_name: config.index_name(),
        exclusive_start_key,
        limit,
        scan_forward: direction.is_forward(),
    };
    config
        .table()
        .query(&request)
        .map_err(|source| Error::Store { partition, source })
}

fn inconsistent(partition: u32, reason: &str) -> Error {
    warn!(partition, reason, "inconsistent partition state");
    Error::InconsistentState {
        partition,
        reason: reason.to_string(),
    }
}

/// Find the item just before `key` in `direction`, so that an exclusive start
/// at it returns `key` first. `None` when nothing precedes `key`.
fn probe_anchor(
    config: &PartitionedIndexConfig,
    partition: u32,
    key: &Item,
    direction: Direction,
) -> Result<Option<Item>> {
    let result = run_query(config, partition, Some(key), 1, direction.reverse())?;
    match result.items.first() {
        Some(item) => {
            trace!(partition, "resolved inclusive anchor");
            Ok(Some(config.key_of(item)))
        }
        None if result.last_evaluated_key.is_some() => Err(inconsistent(
            partition,
            "anchor probe reported more data but returned no items",
        )),
        None => Ok(None),
    }
}

/// Walk away from `key` in the opposite direction until the sort key value
/// changes, so that an exclusive start at the returned item yields every
/// record sharing `key`'s sort value first.
fn scan_for_boundary(
    config: &PartitionedIndexConfig,
    partition: u32,
    key: &Item,
    direction: Direction,
) -> Result<Option<Item>> {
    let sort_key_name = config.sort_key_name();
    let target = key_utils::attribute(key, sort_key_name);
    let batch = config.match_scan_batch_size();
    let mut start = key.clone();
    let mut rounds = 0usize;

    loop {
        rounds += 1;
        let result = run_query(config, partition, Some(&start), batch, direction.reverse())?;
        let boundary = result.items.iter().find(|item| {
            compare_key_values(key_utils::attribute(item, sort_key_name), target)
                != Ordering::Equal
        });
        if let Some(item) = boundary {
            trace!(partition, rounds, "resolved sort key boundary");
            return Ok(Some(config.key_of(item)));
        }
        match result.last_evaluated_key {
            Some(_) if result.items.is_empty() => {
                return Err(inconsistent(
                    partition,
                    "boundary scan reported more data but returned no items",
                ));
            }
            Some(next) => start = next,
            None => {
                trace!(partition, rounds, "sort key boundary is the partition edge");
                return Ok(None);
            }
        }
    }
}
