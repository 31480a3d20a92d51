//! Scripted in-memory transport for unit tests. Every call is recorded and
//! answered by a responder closure that sees the call kind, method, params,
//! and the 0-based index of the call. Fan-out calls can additionally fail one
//! entry at a time through [`ScriptedTransport::failing_entries`].

use crate::rpc::error::{rpc_error, RpcError};
use crate::rpc::transport::RpcTransport;
use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallKind {
    Single,
    Batch { chunk_size: usize },
    Concurrent { max_workers: usize },
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub(crate) kind: CallKind,
    pub(crate) method: String,
    pub(crate) params: Vec<Vec<Value>>,
}

type Responder = dyn Fn(CallKind, &str, &[Vec<Value>], usize) -> Result<Vec<Value>> + Send + Sync;
type EntryFailure = dyn Fn(&[Value], usize) -> Option<RpcError> + Send + Sync;

pub(crate) struct ScriptedTransport {
    responder: Box<Responder>,
    entry_failure: Option<Box<EntryFailure>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub(crate) fn new<F>(responder: F) -> Self
    where
        F: Fn(CallKind, &str, &[Vec<Value>], usize) -> Result<Vec<Value>> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            entry_failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fails single fan-out entries: `fail` sees the entry's params and the
    /// recorded call index, and returns the error that entry should yield.
    pub(crate) fn failing_entries<F>(mut self, fail: F) -> Self
    where
        F: Fn(&[Value], usize) -> Option<RpcError> + Send + Sync + 'static,
    {
        self.entry_failure = Some(Box::new(fail));
        self
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("mock calls poisoned").clone()
    }

    fn respond(&self, kind: CallKind, method: &str, params: &[Vec<Value>]) -> Result<Vec<Value>> {
        let index = {
            let mut calls = self.calls.lock().expect("mock calls poisoned");
            calls.push(RecordedCall {
                kind,
                method: method.to_owned(),
                params: params.to_vec(),
            });
            calls.len() - 1
        };
        (self.responder)(kind, method, params, index)
    }
}

impl RpcTransport for ScriptedTransport {
    fn execute<'a>(&'a self, method: &'a str, params: Vec<Value>) -> BoxFuture<'a, Result<Value>> {
        Box::pin(async move {
            let mut values = self.respond(CallKind::Single, method, &[params])?;
            Ok(values.pop().unwrap_or(Value::Null))
        })
    }

    fn execute_batch<'a>(
        &'a self,
        method: &'a str,
        params: &'a [Vec<Value>],
        chunk_size: usize,
    ) -> BoxFuture<'a, Result<Vec<Value>>> {
        Box::pin(async move { self.respond(CallKind::Batch { chunk_size }, method, params) })
    }

    fn execute_concurrent<'a>(
        &'a self,
        method: &'a str,
        params: &'a [Vec<Value>],
        max_workers: usize,
    ) -> BoxFuture<'a, Vec<Result<Value>>> {
        Box::pin(async move {
            let index = self.calls.lock().expect("mock calls poisoned").len();
            let mut results: Vec<Result<Value>> =
                match self.respond(CallKind::Concurrent { max_workers }, method, params) {
                    Ok(values) => values.into_iter().map(Ok).collect(),
                    Err(err) => params.iter().map(|_| Err(replicate(&err))).collect(),
                };
            if let Some(fail) = &self.entry_failure {
                for (entry, result) in params.iter().zip(results.iter_mut()) {
                    if let Some(err) = fail(entry, index) {
                        *result = Err(err.into());
                    }
                }
            }
            results
        })
    }
}

fn replicate(err: &anyhow::Error) -> anyhow::Error {
    match rpc_error(err) {
        Some(rpc) => rpc.clone().into(),
        None => anyhow!("{err}"),
    }
}

/// A `get_block` result whose id encodes `number`.
pub(crate) fn block(number: u64) -> Value {
    serde_json::json!({
        "block_id": format!("{number:08x}{:032x}", number.wrapping_mul(0x9e37_79b9)),
        "previous": format!("{:08x}{:032x}", number.saturating_sub(1), 0),
        "timestamp": "2016-03-24T16:05:00",
        "transactions": [],
    })
}

/// Block numbers requested by a recorded `get_block` call, in request order.
pub(crate) fn requested_numbers(call: &RecordedCall) -> Vec<u64> {
    call.params
        .iter()
        .filter_map(|params| params.first().and_then(Value::as_u64))
        .collect()
}
