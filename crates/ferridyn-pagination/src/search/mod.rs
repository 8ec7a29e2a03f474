//! Paginated search over every partition of an index.
//!
//! Each call to [`PaginatedSearch::get_next_page`] opens one stream per
//! partition, merges them into a globally ordered page, and records each
//! partition's end state. Successor tokens for both directions are derived
//! from that record without touching it, so the next and previous links of a
//! page can be produced in any order, any number of times.

mod merge;
mod stream;

use rayon::prelude::*;
use tracing::debug;

use crate::config::PartitionedIndexConfig;
use crate::error::{Error, Result};
use crate::token::{PageToken, PartitionCursor};
use crate::types::{Direction, Item};

use self::stream::{PartitionOutcome, PartitionStream};

/// End state of every partition after one page.
#[derive(Debug, Clone)]
struct PageState {
    direction: Direction,
    /// Indexed by partition number minus one.
    outcomes: Vec<PartitionOutcome>,
}

/// A cursor-driven walk over every partition, one merged page at a time.
#[derive(Debug)]
pub struct PaginatedSearch {
    config: PartitionedIndexConfig,
    direction: Direction,
    /// Where each partition resumes on the next call, indexed by partition
    /// number minus one.
    cursors: Vec<PartitionCursor>,
    last_page: Option<PageState>,
}

impl PaginatedSearch {
    /// Start a search at `token`. Fails if the token names a partition the
    /// config does not have.
    pub fn new(config: &PartitionedIndexConfig, token: PageToken) -> Result<Self> {
        token.validate_for(config)?;
        let cursors = config
            .partitions()
            .map(|p| token.cursor(p).clone())
            .collect();
        Ok(Self {
            config: config.clone(),
            direction: token.direction(),
            cursors,
            last_page: None,
        })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Fetch the next page in the search's direction.
    ///
    /// Returns at most `page_size` items, ordered by sort key ascending when
    /// moving forward and descending when moving backward. A short page means
    /// every partition is exhausted. On error the search is left as it was.
    pub fn get_next_page(&mut self, page_size: usize) -> Result<Vec<Item>> {
        if page_size == 0 {
            return Err(Error::InvalidPageSize);
        }

        let mut streams = self.open_streams(page_size)?;
        let page = merge::merge_streams(&mut streams, &self.config, self.direction, page_size)?;

        let outcomes: Vec<PartitionOutcome> = streams
            .iter()
            .map(|stream| stream.outcome(&self.config))
            .collect();
        debug!(
            direction = self.direction.as_str(),
            page_size,
            items = page.len(),
            exhausted = streams.iter().filter(|s| s.is_exhausted()).count(),
            "merged page"
        );

        self.cursors = outcomes.iter().map(|o| o.ahead.clone()).collect();
        self.last_page = Some(PageState {
            direction: self.direction,
            outcomes,
        });
        Ok(page)
    }

    fn open_streams(&self, page_size: usize) -> Result<Vec<PartitionStream>> {
        match self.config.fetch_pool() {
            Some(pool) => pool.install(|| {
                self.cursors
                    .par_iter()
                    .enumerate()
                    .map(|(index, cursor)| self.open_stream(index, cursor, page_size))
                    .collect()
            }),
            None => self
                .cursors
                .iter()
                .enumerate()
                .map(|(index, cursor)| self.open_stream(index, cursor, page_size))
                .collect(),
        }
    }

    fn open_stream(
        &self,
        index: usize,
        cursor: &PartitionCursor,
        page_size: usize,
    ) -> Result<PartitionStream> {
        let partition = index as u32 + 1;
        PartitionStream::open(&self.config, partition, cursor, self.direction, page_size)
    }

    /// Token that continues from the last page in the requested direction.
    ///
    /// `None` when every partition is exhausted that way. Before the first
    /// page, the starting token for the search's own direction.
    pub fn page_token(&self, forward: bool) -> Option<PageToken> {
        let requested = Direction::from_forward(forward);
        let cursors: Vec<PartitionCursor> = match &self.last_page {
            Some(state) if state.direction == requested => {
                state.outcomes.iter().map(|o| o.ahead.clone()).collect()
            }
            Some(state) => state.outcomes.iter().map(|o| o.behind.clone()).collect(),
            None if requested == self.direction => self.cursors.clone(),
            None => return None,
        };

        let token = PageToken::from_cursors(
            requested,
            self.config.partition_count(),
            self.config.partitions().zip(cursors),
        );
        (!token.is_exhausted()).then_some(token)
    }

    /// Serialized form of [`page_token`](Self::page_token).
    pub fn get_page_token(&self, forward: bool) -> Option<String> {
        self.page_token(forward).map(|token| token.serialize())
    }
}
