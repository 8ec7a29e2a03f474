//! Core types: items, scan direction, cursor start modes.

/// A record returned by the index. Always a JSON object carrying at least the
/// partition key, the sort key, and every required field.
pub type Item = serde_json::Value;

/// Items fetched per query while resolving a `match_sort_key` cursor.
pub const DEFAULT_MATCH_SCAN_BATCH_SIZE: usize = 20;

/// Direction of iteration over the merged result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub fn from_forward(forward: bool) -> Self {
        if forward {
            Direction::Forward
        } else {
            Direction::Backward
        }
    }

    pub fn is_forward(self) -> bool {
        self == Direction::Forward
    }

    pub fn reverse(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }

    /// Wire literal used in serialized page tokens.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "forward" => Some(Direction::Forward),
            "backward" => Some(Direction::Backward),
            _ => None,
        }
    }
}

/// How a cursor's key is treated when a partition is resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StartMode {
    /// Resume strictly after the key.
    #[default]
    Exclusive,
    /// Resume at the key itself.
    Inclusive,
    /// Resume at the first record whose sort key equals the key's sort key,
    /// wherever duplicates of that value sit in the partition.
    MatchSortKey,
}
