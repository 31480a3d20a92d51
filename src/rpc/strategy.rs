//! How a list of calls to one method reaches the upstream. Chosen once from
//! the endpoint: a jussi gateway understands server-side batches, a bare
//! steemd node gets a bounded client-side fan-out instead.

use crate::processor::backoff::RetryBackoff;
use crate::rpc::metrics::ClientMetrics;
use crate::rpc::retry::{retry_transient, RetryContext, GATEWAY_BATCH_RETRY};
use crate::rpc::transport::RpcTransport;
use crate::runtime::config::{ClientConfig, Endpoint};
use anyhow::Result;
use serde_json::Value;

pub const DEFAULT_BATCH_CHUNK_SIZE: usize = 500;
pub const DEFAULT_MAX_CONCURRENT_CALLS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStrategy {
    /// Gateway mode: chunked server-side batches, the whole operation wrapped
    /// in the unbounded retry policy.
    ServerBatch { chunk_size: usize },
    /// Direct-node mode: one request per call with a worker cap. Not retried
    /// as a whole; callers re-request whatever is still missing.
    ConcurrentFanOut { max_workers: usize },
}

impl BatchStrategy {
    pub fn for_config(config: &ClientConfig) -> Self {
        match config.endpoint() {
            Endpoint::Gateway(_) => BatchStrategy::ServerBatch {
                chunk_size: config.batch_chunk_size(),
            },
            Endpoint::Node(_) => BatchStrategy::ConcurrentFanOut {
                max_workers: config.max_concurrent_calls(),
            },
        }
    }

    pub fn is_server_batch(&self) -> bool {
        matches!(self, BatchStrategy::ServerBatch { .. })
    }

    /// Runs one call per entry of `params` and returns the results in input
    /// order. The first failed call fails the whole operation.
    pub(crate) async fn execute<T>(
        &self,
        transport: &T,
        method: &str,
        params: &[Vec<Value>],
        retry: RetryBackoff,
        metrics: &ClientMetrics,
    ) -> Result<Vec<Value>>
    where
        T: RpcTransport + ?Sized,
    {
        self.execute_each(transport, method, params, retry, metrics)
            .await?
            .into_iter()
            .collect()
    }

    /// Like [`execute`](Self::execute) but keeps one result per call. A
    /// gateway batch succeeds or fails as a unit and reports failure through
    /// the outer error; fan-out calls fail individually.
    pub(crate) async fn execute_each<T>(
        &self,
        transport: &T,
        method: &str,
        params: &[Vec<Value>],
        retry: RetryBackoff,
        metrics: &ClientMetrics,
    ) -> Result<Vec<Result<Value>>>
    where
        T: RpcTransport + ?Sized,
    {
        if params.is_empty() {
            return Ok(Vec::new());
        }

        match *self {
            BatchStrategy::ServerBatch { chunk_size } => {
                let values = retry_transient(
                    retry,
                    RetryContext::with_params(&GATEWAY_BATCH_RETRY, method, params),
                    metrics,
                    || transport.execute_batch(method, params, chunk_size),
                )
                .await?;
                Ok(values.into_iter().map(Ok).collect())
            }
            BatchStrategy::ConcurrentFanOut { max_workers } => Ok(transport
                .execute_concurrent(method, params, max_workers)
                .await),
        }
    }
}
