//! Utility helpers for the loosely-typed JSON returned by steemd: block number
//! extraction and minimal shape checks.

use anyhow::{bail, Context, Result};
use serde_json::Value;

/// Hex characters covering the block number prefix of a block id.
const BLOCK_NUM_HEX_CHARS: usize = 8;

/// Decodes the block number embedded in a block id.
///
/// Steem block ids start with the block number: the first 4 bytes (8 hex
/// characters) are the number as a big-endian integer. Only that prefix is
/// inspected; the rest of the id is ignored. Upper- and lowercase hex are both
/// accepted. Fails when the id is shorter than 8 characters or the prefix is
/// not hex.
pub fn block_num_from_id(block_id: &str) -> Result<u64> {
    let prefix = block_id
        .get(..BLOCK_NUM_HEX_CHARS)
        .with_context(|| format!("block id {block_id:?} is shorter than 4 bytes"))?;

    let mut bytes = [0u8; 4];
    hex::decode_to_slice(prefix, &mut bytes)
        .with_context(|| format!("block id {block_id:?} does not start with hex"))?;

    Ok(u64::from(u32::from_be_bytes(bytes)))
}

/// Extracts the block number from a raw `get_block` result.
///
/// Returns an error when the value is not an object carrying a string
/// `block_id` with a decodable prefix.
pub fn block_num(block: &Value) -> Result<u64> {
    match block.get("block_id") {
        Some(Value::String(id)) => block_num_from_id(id),
        Some(other) => bail!("block_id is not a string: {other}"),
        None => bail!("block has no block_id"),
    }
}

/// Null, `{}`, `[]`, `""` and `false` all count as "nothing came back".
pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Number(_) => false,
    }
}
