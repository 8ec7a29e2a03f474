//! K-way merge of partition streams into one globally ordered page.

use std::cmp::Ordering;

use crate::config::PartitionedIndexConfig;
use crate::error::Result;
use crate::key_utils::compare_sort_keys;
use crate::types::{Direction, Item};

use super::stream::PartitionStream;

/// Take items from `streams` in global sort key order until the page holds
/// `page_size` items or every stream is exhausted.
///
/// `streams` must be in ascending partition order. Equal sort keys go to the
/// lower partition first when moving forward and to the higher partition first
/// when moving backward, so a backward walk mirrors a forward one exactly.
pub(crate) fn merge_streams(
    streams: &mut [PartitionStream],
    config: &PartitionedIndexConfig,
    direction: Direction,
    page_size: usize,
) -> Result<Vec<Item>> {
    let mut page = Vec::with_capacity(page_size);
    while page.len() < page_size {
        // A drained stream may still hold the next item; refill before choosing.
        for stream in streams.iter_mut() {
            stream.refill(config, page_size)?;
        }
        let Some(next) = select_head(streams, config.sort_key_name(), direction) else {
            break;
        };
        if let Some(item) = streams[next].take() {
            page.push(item);
        }
    }
    Ok(page)
}

fn select_head(
    streams: &[PartitionStream],
    sort_key_name: &str,
    direction: Direction,
) -> Option<usize> {
    let mut best: Option<(usize, &Item)> = None;
    for (index, stream) in streams.iter().enumerate() {
        let Some(head) = stream.peek() else {
            continue;
        };
        let wins = match best {
            None => true,
            Some((_, current)) => {
                let ord = compare_sort_keys(head, current, sort_key_name);
                match direction {
                    Direction::Forward => ord == Ordering::Less,
                    Direction::Backward => ord != Ordering::Less,
                }
            }
        };
        if wins {
            best = Some((index, head));
        }
    }
    best.map(|(index, _)| index)
}
