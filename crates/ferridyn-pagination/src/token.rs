//! Page tokens: per-partition resume positions for one direction, and their
//! compact base64 wire form.
//!
//! Wire document (base64 of UTF-8 JSON):
//!
//! ```text
//! {"direction": "forward" | "backward",
//!  "partitions": {"<index>": {} | {"key": null | {...}, "inclusive"?: true | "match_sort_key"}}}
//! ```
//!
//! A partition missing from `partitions` has never been visited. `{}` marks a
//! partition with nothing left in the token's direction. `"key": null` is an
//! explicit position at the partition's natural beginning.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::PartitionedIndexConfig;
use crate::error::{Result, TokenDecodingError, TokenValidationError};
use crate::key_utils;
use crate::types::{Direction, Item, StartMode};

const MATCH_SORT_KEY: &str = "match_sort_key";

/// Resume state of a single partition.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PartitionCursor {
    /// No recorded state: start from the natural beginning.
    #[default]
    Unvisited,
    /// Explicitly positioned at the natural beginning.
    Start,
    Exclusive(Item),
    Inclusive(Item),
    MatchSortKey(Item),
    /// Nothing remains in the token's direction; the partition is not queried.
    Exhausted,
}

impl PartitionCursor {
    pub fn from_start(key: Option<Item>, mode: StartMode) -> Self {
        match (key, mode) {
            (None, _) => PartitionCursor::Start,
            (Some(key), StartMode::Exclusive) => PartitionCursor::Exclusive(key),
            (Some(key), StartMode::Inclusive) => PartitionCursor::Inclusive(key),
            (Some(key), StartMode::MatchSortKey) => PartitionCursor::MatchSortKey(key),
        }
    }

    pub fn key(&self) -> Option<&Item> {
        match self {
            PartitionCursor::Exclusive(key)
            | PartitionCursor::Inclusive(key)
            | PartitionCursor::MatchSortKey(key) => Some(key),
            _ => None,
        }
    }

    pub fn start_mode(&self) -> StartMode {
        match self {
            PartitionCursor::Inclusive(_) => StartMode::Inclusive,
            PartitionCursor::MatchSortKey(_) => StartMode::MatchSortKey,
            _ => StartMode::Exclusive,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, PartitionCursor::Exhausted)
    }
}

/// Resume state across every partition for one direction.
///
/// Partitions without an entry are [`PartitionCursor::Unvisited`].
#[derive(Debug, Clone, PartialEq)]
pub struct PageToken {
    direction: Direction,
    partition_count: u32,
    cursors: BTreeMap<u32, PartitionCursor>,
}

impl PageToken {
    /// A forward token with no recorded state: the first page.
    pub fn new(config: &PartitionedIndexConfig) -> Self {
        Self {
            direction: Direction::Forward,
            partition_count: config.partition_count(),
            cursors: BTreeMap::new(),
        }
    }

    pub(crate) fn from_cursors(
        direction: Direction,
        partition_count: u32,
        cursors: impl IntoIterator<Item = (u32, PartitionCursor)>,
    ) -> Self {
        Self {
            direction,
            partition_count,
            cursors: cursors
                .into_iter()
                .filter(|(_, cursor)| *cursor != PartitionCursor::Unvisited)
                .collect(),
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn forward(&self) -> bool {
        self.direction.is_forward()
    }

    pub fn set_forward(&mut self, forward: bool) {
        self.direction = Direction::from_forward(forward);
    }

    pub fn partition_count(&self) -> u32 {
        self.partition_count
    }

    /// Position `partition` at `key`. `None` positions it at the natural
    /// beginning of the partition for the token's direction.
    pub fn set_start(&mut self, partition: u32, key: Option<Item>, mode: StartMode) -> Result<()> {
        self.check_partition(partition)?;
        if let Some(key) = &key
            && !key.is_object()
        {
            return Err(TokenValidationError::KeyNotObject(partition).into());
        }
        self.cursors
            .insert(partition, PartitionCursor::from_start(key, mode));
        Ok(())
    }

    pub fn cursor(&self, partition: u32) -> &PartitionCursor {
        static UNVISITED: PartitionCursor = PartitionCursor::Unvisited;
        self.cursors.get(&partition).unwrap_or(&UNVISITED)
    }

    /// Whether every partition is exhausted in the token's direction.
    pub fn is_exhausted(&self) -> bool {
        (1..=self.partition_count).all(|p| self.cursor(p).is_exhausted())
    }

    fn check_partition(&self, partition: u32) -> Result<()> {
        if partition == 0 || partition > self.partition_count {
            return Err(TokenValidationError::PartitionOutOfRange {
                partition,
                partition_count: self.partition_count,
            }
            .into());
        }
        Ok(())
    }

    /// Check every recorded partition against `config`'s numbering.
    pub(crate) fn validate_for(&self, config: &PartitionedIndexConfig) -> Result<()> {
        match self
            .cursors
            .keys()
            .find(|p| !config.contains_partition(**p))
        {
            Some(&partition) => Err(TokenValidationError::PartitionOutOfRange {
                partition,
                partition_count: config.partition_count(),
            }
            .into()),
            None => Ok(()),
        }
    }

    pub fn serialize(&self) -> String {
        let wire = WireToken {
            direction: self.direction.as_str().to_string(),
            partitions: self
                .cursors
                .iter()
                .map(|(p, cursor)| (*p, WireCursor::from(cursor)))
                .collect(),
        };
        let json = serde_json::to_string(&wire)
            .expect("token document holds only JSON values under integer map keys");
        BASE64.encode(json)
    }

    pub fn deserialize(encoded: &str, config: &PartitionedIndexConfig) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(TokenDecodingError::from)?;
        let json = String::from_utf8(bytes).map_err(TokenDecodingError::from)?;
        let wire: WireToken<String> =
            serde_json::from_str(&json).map_err(TokenDecodingError::from)?;

        let direction = Direction::parse(&wire.direction)
            .ok_or_else(|| TokenValidationError::UnknownDirection(wire.direction.clone()))?;

        let mut token = PageToken {
            direction,
            partition_count: config.partition_count(),
            cursors: BTreeMap::new(),
        };
        for (index, wire_cursor) in wire.partitions {
            let partition: u32 = index
                .parse()
                .map_err(|_| TokenValidationError::InvalidPartitionIndex(index.clone()))?;
            token.check_partition(partition)?;
            let cursor = wire_cursor.into_cursor(partition)?;
            token.cursors.insert(partition, cursor);
        }
        Ok(token)
    }
}

/// Build a forward token that starts every partition at `sort_value`,
/// inclusive.
///
/// With `match_all_partitions` the cursors resolve by sort key value alone,
/// landing before every duplicate of `sort_value`. Without it each cursor is
/// an exact inclusive start at the synthetic key built from `sort_value` and
/// the configured required fields.
pub fn get_page_token_for_inclusive_start(
    config: &PartitionedIndexConfig,
    sort_value: impl Into<Value>,
    match_all_partitions: bool,
) -> PageToken {
    let sort_value = sort_value.into();
    let mode = if match_all_partitions {
        StartMode::MatchSortKey
    } else {
        StartMode::Inclusive
    };
    let cursors = config.partitions().map(|p| {
        let key = key_utils::exact_key(config, p, sort_value.clone());
        (p, PartitionCursor::from_start(Some(key), mode))
    });
    PageToken::from_cursors(Direction::Forward, config.partition_count(), cursors)
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct WireToken<K: Ord> {
    direction: String,
    partitions: BTreeMap<K, WireCursor>,
}

#[derive(Serialize, Deserialize, Default)]
struct WireCursor {
    /// `None` when the field is absent; `Some(Value::Null)` for `"key": null`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present"
    )]
    key: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inclusive: Option<Value>,
}

fn present<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl From<&PartitionCursor> for WireCursor {
    fn from(cursor: &PartitionCursor) -> Self {
        let inclusive = match cursor.start_mode() {
            StartMode::Exclusive => None,
            StartMode::Inclusive => Some(Value::Bool(true)),
            StartMode::MatchSortKey => Some(Value::String(MATCH_SORT_KEY.to_string())),
        };
        let key = match cursor {
            PartitionCursor::Unvisited | PartitionCursor::Exhausted => None,
            PartitionCursor::Start => Some(Value::Null),
            other => other.key().cloned(),
        };
        WireCursor { key, inclusive }
    }
}

impl WireCursor {
    fn into_cursor(self, partition: u32) -> std::result::Result<PartitionCursor, TokenValidationError> {
        let mode = match &self.inclusive {
            None | Some(Value::Bool(false)) => StartMode::Exclusive,
            Some(Value::Bool(true)) => StartMode::Inclusive,
            Some(Value::String(s)) if s == MATCH_SORT_KEY => StartMode::MatchSortKey,
            Some(other) => {
                return Err(TokenValidationError::UnknownInclusive {
                    partition,
                    value: other.to_string(),
                });
            }
        };
        match self.key {
            None if mode != StartMode::Exclusive => {
                Err(TokenValidationError::InclusiveWithoutKey(partition))
            }
            None => Ok(PartitionCursor::Exhausted),
            Some(Value::Null) => Ok(PartitionCursor::Start),
            Some(key @ Value::Object(_)) => Ok(PartitionCursor::from_start(Some(key), mode)),
            Some(_) => Err(TokenValidationError::KeyNotObject(partition)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::error::Error;
    use crate::memory::MemoryIndexTable;
    use serde_json::json;

    fn test_config(partition_count: u32) -> PartitionedIndexConfig {
        let table = Arc::new(MemoryIndexTable::new("idx", "part", "sort", &["id"]));
        PartitionedIndexConfig::builder(table)
            .index_name("idx")
            .partition_key("part")
            .sort_key("sort")
            .partition_count(partition_count)
            .required_field("id", "")
            .build()
            .unwrap()
    }

    fn wire_json(token: &PageToken) -> String {
        String::from_utf8(BASE64.decode(token.serialize()).unwrap()).unwrap()
    }

    fn encode(json: &str) -> String {
        BASE64.encode(json)
    }

    #[test]
    fn test_new_token_is_forward_and_empty() {
        let config = test_config(3);
        let token = PageToken::new(&config);
        assert!(token.forward());
        assert_eq!(token.cursor(2), &PartitionCursor::Unvisited);
        assert_eq!(wire_json(&token), r#"{"direction":"forward","partitions":{}}"#);
    }

    #[test]
    fn test_wire_format_is_exact() {
        let config = test_config(12);
        let mut token = PageToken::new(&config);
        token.set_forward(false);
        token
            .set_start(10, Some(json!({"part": 10, "sort": "B", "id": "b"})), StartMode::Exclusive)
            .unwrap();
        token
            .set_start(2, Some(json!({"part": 2, "sort": "C", "id": "c"})), StartMode::Inclusive)
            .unwrap();
        token
            .set_start(3, Some(json!({"part": 3, "sort": "D", "id": ""})), StartMode::MatchSortKey)
            .unwrap();
        token.set_start(4, None, StartMode::Exclusive).unwrap();

        assert_eq!(
            wire_json(&token),
            concat!(
                r#"{"direction":"backward","partitions":{"#,
                r#""2":{"key":{"id":"c","part":2,"sort":"C"},"inclusive":true},"#,
                r#""3":{"key":{"id":"","part":3,"sort":"D"},"inclusive":"match_sort_key"},"#,
                r#""4":{"key":null},"#,
                r#""10":{"key":{"id":"b","part":10,"sort":"B"}}}}"#
            )
        );
    }

    #[test]
    fn test_round_trip_preserves_every_state() {
        let config = test_config(6);
        let mut token = PageToken::new(&config);
        token
            .set_start(1, Some(json!({"part": 1, "sort": "A", "id": "a"})), StartMode::Exclusive)
            .unwrap();
        token
            .set_start(2, Some(json!({"part": 2, "sort": "B", "id": "b"})), StartMode::Inclusive)
            .unwrap();
        token
            .set_start(3, Some(json!({"part": 3, "sort": "C", "id": ""})), StartMode::MatchSortKey)
            .unwrap();
        token.set_start(4, None, StartMode::Exclusive).unwrap();
        token.cursors.insert(5, PartitionCursor::Exhausted);

        let decoded = PageToken::deserialize(&token.serialize(), &config).unwrap();
        assert_eq!(decoded, token);
        assert_eq!(decoded.cursor(6), &PartitionCursor::Unvisited);
        assert_eq!(decoded.cursor(4), &PartitionCursor::Start);
        assert_eq!(decoded.cursor(5), &PartitionCursor::Exhausted);
        assert_eq!(decoded.serialize(), token.serialize());
    }

    #[test]
    fn test_serialize_keeps_unusual_key_values() {
        let config = test_config(2);
        let key = json!({
            "part": 2,
            "sort": [0, 255, 16],
            "id": "ünïcode \"quoted\"",
            "meta": {"score": -1.5e-3, "tags": [null, true]}
        });
        let mut token = PageToken::new(&config);
        token.set_forward(false);
        token.set_start(2, Some(key.clone()), StartMode::Inclusive).unwrap();

        let encoded = token.serialize();
        let bytes = BASE64.decode(&encoded).unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["direction"], "backward");
        assert_eq!(doc["partitions"]["2"]["key"], key);

        let decoded = PageToken::deserialize(&encoded, &config).unwrap();
        assert_eq!(decoded.cursor(2), &PartitionCursor::Inclusive(key));
    }

    #[test]
    fn test_explicit_false_inclusive_is_omitted_on_reserialize() {
        let config = test_config(2);
        let encoded = encode(
            r#"{"direction":"forward","partitions":{"1":{"key":{"part":1,"sort":"A"},"inclusive":false}}}"#,
        );
        let token = PageToken::deserialize(&encoded, &config).unwrap();
        assert_eq!(
            token.cursor(1),
            &PartitionCursor::Exclusive(json!({"part": 1, "sort": "A"}))
        );
        assert_eq!(
            wire_json(&token),
            r#"{"direction":"forward","partitions":{"1":{"key":{"part":1,"sort":"A"}}}}"#
        );
    }

    #[test]
    fn test_set_start_none_differs_from_unset() {
        let config = test_config(2);
        let unset = PageToken::new(&config);
        let mut set_none = PageToken::new(&config);
        set_none.set_start(1, None, StartMode::Inclusive).unwrap();
        assert_ne!(unset.serialize(), set_none.serialize());
        assert_eq!(set_none.cursor(1), &PartitionCursor::Start);
    }

    #[test]
    fn test_set_start_rejects_out_of_range() {
        let config = test_config(3);
        let mut token = PageToken::new(&config);
        for partition in [0, 4] {
            let err = token.set_start(partition, None, StartMode::Exclusive).unwrap_err();
            assert!(matches!(
                err,
                Error::TokenValidation(TokenValidationError::PartitionOutOfRange { partition_count: 3, .. })
            ));
        }
        let err = token
            .set_start(1, Some(json!("A")), StartMode::Exclusive)
            .unwrap_err();
        assert!(matches!(err, Error::TokenValidation(TokenValidationError::KeyNotObject(1))));
    }

    #[test]
    fn test_deserialize_decoding_errors() {
        let config = test_config(2);
        assert!(matches!(
            PageToken::deserialize("not base64!!", &config),
            Err(Error::TokenDecoding(TokenDecodingError::Base64(_)))
        ));
        assert!(matches!(
            PageToken::deserialize(&BASE64.encode([0xff, 0xfe]), &config),
            Err(Error::TokenDecoding(TokenDecodingError::Utf8(_)))
        ));
        assert!(matches!(
            PageToken::deserialize(&encode("{\"direction\":"), &config),
            Err(Error::TokenDecoding(TokenDecodingError::Json(_)))
        ));
        assert!(matches!(
            PageToken::deserialize(&encode(r#"{"partitions":{}}"#), &config),
            Err(Error::TokenDecoding(TokenDecodingError::Json(_)))
        ));
    }

    #[test]
    fn test_deserialize_validation_errors() {
        let config = test_config(2);
        let cases = [
            r#"{"direction":"sideways","partitions":{}}"#,
            r#"{"direction":"forward","partitions":{"3":{}}}"#,
            r#"{"direction":"forward","partitions":{"0":{}}}"#,
            r#"{"direction":"forward","partitions":{"one":{}}}"#,
            r#"{"direction":"forward","partitions":{"1":{"key":{"part":1},"inclusive":"yes"}}}"#,
            r#"{"direction":"forward","partitions":{"1":{"key":"A"}}}"#,
            r#"{"direction":"forward","partitions":{"1":{"inclusive":true}}}"#,
        ];
        for case in cases {
            let result = PageToken::deserialize(&encode(case), &config);
            assert!(
                matches!(result, Err(Error::TokenValidation(_))),
                "expected validation error for {case}, got {result:?}"
            );
        }
    }

    #[test]
    fn test_validate_for_smaller_config() {
        let mut token = PageToken::new(&test_config(4));
        token.set_start(4, None, StartMode::Exclusive).unwrap();
        assert!(token.validate_for(&test_config(4)).is_ok());
        assert!(token.validate_for(&test_config(3)).is_err());
    }

    #[test]
    fn test_inclusive_start_token_match_sort_key() {
        let config = test_config(3);
        let token = get_page_token_for_inclusive_start(&config, "M", true);
        assert!(token.forward());
        for p in 1..=3 {
            assert_eq!(
                token.cursor(p),
                &PartitionCursor::MatchSortKey(json!({"part": p, "sort": "M", "id": ""}))
            );
        }
        assert_eq!(
            wire_json(&token),
            concat!(
                r#"{"direction":"forward","partitions":{"#,
                r#""1":{"key":{"id":"","part":1,"sort":"M"},"inclusive":"match_sort_key"},"#,
                r#""2":{"key":{"id":"","part":2,"sort":"M"},"inclusive":"match_sort_key"},"#,
                r#""3":{"key":{"id":"","part":3,"sort":"M"},"inclusive":"match_sort_key"}}}"#
            )
        );
    }

    #[test]
    fn test_inclusive_start_token_exact() {
        let config = test_config(2);
        let token = get_page_token_for_inclusive_start(&config, 42, false);
        assert_eq!(
            token.cursor(2),
            &PartitionCursor::Inclusive(json!({"part": 2, "sort": 42, "id": ""}))
        );
    }

    #[test]
    fn test_token_is_exhausted() {
        let config = test_config(2);
        let token = PageToken::from_cursors(
            Direction::Forward,
            2,
            [(1, PartitionCursor::Exhausted), (2, PartitionCursor::Exhausted)],
        );
        assert!(token.is_exhausted());
        assert!(!PageToken::new(&config).is_exhausted());
    }
}
