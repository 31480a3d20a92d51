//! JSON-RPC transport used by the client: the `RpcTransport` trait consumed by
//! the batch strategies plus the `jsonrpsee` HTTP implementation talking to a
//! steemd node or a jussi gateway.

use crate::rpc::error::RpcError;
use crate::rpc::metrics::ClientMetrics;
use crate::rpc::options::RpcClientOptions;
use crate::rpc::retry::{retry_transient, RetryContext, SINGLE_CALL_RETRY};
use anyhow::{anyhow, Context, Result};
use futures::future::BoxFuture;
use futures::{stream, StreamExt};
use jsonrpsee::core::client::{ClientT, Error as JsonRpcError};
use jsonrpsee::core::params::{ArrayParams, BatchRequestBuilder};
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::types::ErrorObject;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::{timeout, Instant};

/// Executes JSON-RPC calls against the upstream.
///
/// Every operation returns results in the order the calls were given and
/// fails with an [`RpcError`] (wrapped in `anyhow::Error`) when the upstream
/// cannot be reached or rejects a call.
pub trait RpcTransport: Send + Sync {
    /// One call, one response.
    fn execute<'a>(&'a self, method: &'a str, params: Vec<Value>) -> BoxFuture<'a, Result<Value>>;

    /// Server-side batching: `params` is split into chunks of at most
    /// `chunk_size` calls and every chunk travels as a single batch request.
    fn execute_batch<'a>(
        &'a self,
        method: &'a str,
        params: &'a [Vec<Value>],
        chunk_size: usize,
    ) -> BoxFuture<'a, Result<Vec<Value>>>;

    /// Client-side fan-out: one request per call, at most `max_workers` in
    /// flight. Yields one result per call so a failed call does not discard
    /// its siblings.
    fn execute_concurrent<'a>(
        &'a self,
        method: &'a str,
        params: &'a [Vec<Value>],
        max_workers: usize,
    ) -> BoxFuture<'a, Vec<Result<Value>>>;
}

#[derive(Debug, Clone)]
pub struct JsonRpcTransport {
    url: Arc<String>,
    client: HttpClient,
    options: RpcClientOptions,
    metrics: Arc<ClientMetrics>,
}

impl RpcTransport for JsonRpcTransport {
    fn execute<'a>(&'a self, method: &'a str, params: Vec<Value>) -> BoxFuture<'a, Result<Value>> {
        Box::pin(self.call(method, params))
    }

    fn execute_batch<'a>(
        &'a self,
        method: &'a str,
        params: &'a [Vec<Value>],
        chunk_size: usize,
    ) -> BoxFuture<'a, Result<Vec<Value>>> {
        Box::pin(self.batch(method, params, chunk_size))
    }

    fn execute_concurrent<'a>(
        &'a self,
        method: &'a str,
        params: &'a [Vec<Value>],
        max_workers: usize,
    ) -> BoxFuture<'a, Vec<Result<Value>>> {
        Box::pin(self.fan_out(method, params, max_workers))
    }
}

impl JsonRpcTransport {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_options(url, RpcClientOptions::default())
    }

    pub fn with_options(url: impl Into<String>, options: RpcClientOptions) -> Result<Self> {
        Self::with_options_and_metrics(url, options, Arc::new(ClientMetrics::default()))
    }

    pub fn with_options_and_metrics(
        url: impl Into<String>,
        options: RpcClientOptions,
        metrics: Arc<ClientMetrics>,
    ) -> Result<Self> {
        options.validate()?;
        let url = url.into();

        let client = HttpClientBuilder::default()
            .request_timeout(options.request_timeout)
            .max_concurrent_requests(options.max_concurrent_requests)
            .build(&url)
            .map_err(|err| anyhow!("failed to build RPC client for {url}: {err}"))?;

        Ok(Self {
            url: Arc::new(url),
            client,
            options,
            metrics,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.url
    }

    /// Single call with bounded exponential retry on transient failures.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        retry_transient(
            self.options.call_retry(),
            RetryContext::with_params(&SINGLE_CALL_RETRY, method, std::slice::from_ref(&params)),
            &self.metrics,
            || self.call_once(method, &params),
        )
        .await
    }

    async fn call_once(&self, method: &str, params: &[Value]) -> Result<Value> {
        let rpc_params = array_params(method, params)?;
        let start = Instant::now();
        let response = timeout(
            self.options.request_timeout,
            self.client.request::<Value, _>(method, rpc_params),
        )
        .await;
        self.metrics.record_request(start.elapsed());

        let value = response
            .map_err(|_| RpcError::Timeout {
                method: method.to_owned(),
            })?
            .map_err(|err| map_rpc_error(method, err))?;

        tracing::trace!(method, "rpc call completed");
        Ok(value)
    }

    /// Sends `params` as consecutive batches of at most `chunk_size` calls.
    /// A failure in any chunk fails the whole operation.
    pub async fn batch(
        &self,
        method: &str,
        params: &[Vec<Value>],
        chunk_size: usize,
    ) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(params.len());
        for chunk in params.chunks(chunk_size.max(1)) {
            values.extend(self.batch_chunk(method, chunk).await?);
        }
        Ok(values)
    }

    async fn batch_chunk(&self, method: &str, chunk: &[Vec<Value>]) -> Result<Vec<Value>> {
        let mut batch = BatchRequestBuilder::new();
        for call in chunk {
            batch
                .insert(method, array_params(method, call)?)
                .with_context(|| format!("failed to serialize {method} batch entry"))?;
        }

        let start = Instant::now();
        let response = timeout(
            self.options.request_timeout,
            self.client.batch_request::<Value>(batch),
        )
        .await;
        self.metrics.record_request(start.elapsed());

        let response = response
            .map_err(|_| RpcError::Timeout {
                method: method.to_owned(),
            })?
            .map_err(|err| map_rpc_error(method, err))?;

        if response.len() != chunk.len() {
            return Err(RpcError::bad_response(
                method,
                format!(
                    "batch returned {} entries for {} calls",
                    response.len(),
                    chunk.len()
                ),
            )
            .into());
        }

        let mut values = Vec::with_capacity(chunk.len());
        for entry in response.into_iter() {
            match entry {
                Ok(value) => values.push(value),
                Err(err) => return Err(map_rpc_batch_error(method, &err)),
            }
        }

        tracing::debug!(method, count = values.len(), "batch RPC call completed");
        Ok(values)
    }

    /// Issues one request per call, keeping at most `max_workers` in flight.
    /// Results come back in input order, each call succeeding or failing on
    /// its own.
    pub async fn fan_out(
        &self,
        method: &str,
        params: &[Vec<Value>],
        max_workers: usize,
    ) -> Vec<Result<Value>> {
        let results: Vec<Result<Value>> = stream::iter(params.iter().cloned())
            .map(|call| self.call(method, call))
            .buffered(max_workers.max(1))
            .collect()
            .await;

        let failed = results.iter().filter(|result| result.is_err()).count();
        tracing::debug!(method, count = results.len(), failed, "concurrent RPC calls completed");
        results
    }
}

fn array_params(method: &str, params: &[Value]) -> Result<ArrayParams> {
    let mut rpc_params = ArrayParams::new();
    for param in params {
        rpc_params
            .insert(param)
            .with_context(|| format!("failed to serialize {method} params"))?;
    }
    Ok(rpc_params)
}

fn map_rpc_error(method: &str, err: JsonRpcError) -> anyhow::Error {
    match err {
        JsonRpcError::RequestTimeout => RpcError::Timeout {
            method: method.to_owned(),
        }
        .into(),
        other => RpcError::transport(method, other.to_string()).into(),
    }
}

fn map_rpc_batch_error(method: &str, err: &ErrorObject<'_>) -> anyhow::Error {
    let message = match err.data() {
        Some(data) => format!(
            "code={}, message={}, data={}",
            err.code(),
            err.message(),
            data.get()
        ),
        None => format!("code={}, message={}", err.code(), err.message()),
    };
    RpcError::transport(method, message).into()
}
