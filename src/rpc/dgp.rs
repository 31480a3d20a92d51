//! Dynamic global properties snapshot returned by
//! `get_dynamic_global_properties`.

use crate::rpc::error::RpcError;
use crate::rpc::helpers::is_blank;
use anyhow::Result;
use serde_json::{Map, Value};

const METHOD: &str = "get_dynamic_global_properties";

/// A validated DGP response: a non-empty object that at least carries `time`.
/// Other fields are kept as returned and read on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicGlobalProperties(Map<String, Value>);

impl DynamicGlobalProperties {
    pub fn from_value(value: Value) -> Result<Self> {
        if is_blank(&value) {
            return Err(RpcError::bad_response(METHOD, format!("empty response: {value}")).into());
        }
        match value {
            Value::Object(fields) if fields.contains_key("time") => Ok(Self(fields)),
            other => Err(RpcError::bad_response(METHOD, format!("invalid response: {other}")).into()),
        }
    }

    /// Head block timestamp, e.g. `2016-03-24T16:05:00`.
    pub fn time(&self) -> Result<&str> {
        self.0
            .get("time")
            .and_then(Value::as_str)
            .ok_or_else(|| RpcError::bad_response(METHOD, "time is not a string").into())
    }

    pub fn head_block_number(&self) -> Result<u64> {
        self.number("head_block_number")
    }

    pub fn last_irreversible_block_num(&self) -> Result<u64> {
        self.number("last_irreversible_block_num")
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    fn number(&self, field: &str) -> Result<u64> {
        self.0
            .get(field)
            .and_then(Value::as_u64)
            .ok_or_else(|| RpcError::bad_response(METHOD, format!("{field} missing or not a number")).into())
    }
}
