use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::config::PartitionedIndexConfig;
use crate::types::Item;

static NULL: Value = Value::Null;

/// Type ranks mirror the composite key tags: String, Number, Binary.
const RANK_STRING: u8 = 0x01;
const RANK_NUMBER: u8 = 0x02;
const RANK_BINARY: u8 = 0x03;
const RANK_OTHER: u8 = 0x04;

/// Interpret a JSON array as binary key bytes.
fn as_binary(val: &Value) -> Option<Vec<u8>> {
    val.as_array()?
        .iter()
        .map(|v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect()
}

fn type_rank(val: &Value) -> u8 {
    match val {
        Value::String(_) => RANK_STRING,
        Value::Number(_) => RANK_NUMBER,
        Value::Array(_) if as_binary(val).is_some() => RANK_BINARY,
        _ => RANK_OTHER,
    }
}

/// Total order over key attribute values.
///
/// Values of different types order by type (String < Number < Binary < other).
/// Within a type: strings by UTF-8 bytes, numbers numerically, binary
/// lexicographically. Anything else falls back to its JSON text.
pub fn compare_key_values(a: &Value, b: &Value) -> Ordering {
    let (ra, rb) = (type_rank(a), type_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.as_bytes().cmp(y.as_bytes()),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        _ if ra == RANK_BINARY => as_binary(a).cmp(&as_binary(b)),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// The value of `name` on `item`, or `null` when absent.
pub fn attribute<'a>(item: &'a Item, name: &str) -> &'a Value {
    item.get(name).unwrap_or(&NULL)
}

/// Compare two items by their sort key attribute.
pub fn compare_sort_keys(a: &Item, b: &Item, sort_key_name: &str) -> Ordering {
    compare_key_values(attribute(a, sort_key_name), attribute(b, sort_key_name))
}

/// Read the partition number stored on an item.
pub fn partition_of(item: &Item, partition_key_name: &str) -> Option<u32> {
    item.get(partition_key_name)?
        .as_u64()
        .and_then(|n| u32::try_from(n).ok())
}

/// Reduce an item to the named key attributes.
///
/// Attributes missing from the item take their value from `defaults`, and are
/// omitted when no default exists either.
pub fn project_key<'a>(
    item: &Item,
    names: impl IntoIterator<Item = &'a str>,
    defaults: &Map<String, Value>,
) -> Item {
    let mut key = Map::new();
    for name in names {
        if let Some(val) = item.get(name).or_else(|| defaults.get(name)) {
            key.insert(name.to_string(), val.clone());
        }
    }
    Value::Object(key)
}

/// Build the synthetic key that positions `partition` at `sort_value`.
///
/// Carries every required field so the store accepts it as a start key.
pub fn exact_key(config: &PartitionedIndexConfig, partition: u32, sort_value: Value) -> Item {
    let mut key = config.required_fields().clone();
    key.insert(config.partition_key_name().to_string(), Value::from(partition));
    key.insert(config.sort_key_name().to_string(), sort_value);
    Value::Object(key)
}
