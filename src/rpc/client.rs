//! `SteemClient`: the consumer-facing facade over a steemd node or jussi
//! gateway. Construct one explicitly and share it; there is no process-wide
//! instance.

use crate::processor::backoff::RetryBackoff;
use crate::processor::reconciler::RangeReconciler;
use crate::rpc::dgp::DynamicGlobalProperties;
use crate::rpc::error::RpcError;
use crate::rpc::helpers::is_blank;
use crate::rpc::metrics::{ClientMetrics, ClientMetricsSnapshot};
use crate::rpc::options::RpcClientOptions;
use crate::rpc::retry::{linear_policy, retry_transient, RetryContext, DGP_RETRY};
use crate::rpc::strategy::BatchStrategy;
use crate::rpc::transport::{JsonRpcTransport, RpcTransport};
use crate::runtime::config::ClientConfig;
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::sync::Arc;

const GET_ACCOUNTS: &str = "get_accounts";
const GET_CONTENT: &str = "get_content";
const GET_BLOCK: &str = "get_block";
const GET_DGP: &str = "get_dynamic_global_properties";

pub struct SteemClient<T: ?Sized = JsonRpcTransport> {
    config: ClientConfig,
    transport: Arc<T>,
    strategy: BatchStrategy,
    retry: RetryBackoff,
    metrics: Arc<ClientMetrics>,
}

impl<T: ?Sized> Clone for SteemClient<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            transport: Arc::clone(&self.transport),
            strategy: self.strategy,
            retry: self.retry,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl SteemClient<JsonRpcTransport> {
    /// Builds a client talking JSON-RPC over HTTP to the configured endpoint.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let metrics = Arc::new(ClientMetrics::default());
        let options = RpcClientOptions {
            request_timeout: config.rpc_timeout(),
            max_concurrent_requests: config
                .max_concurrent_calls()
                .max(RpcClientOptions::default().max_concurrent_requests),
            ..RpcClientOptions::default()
        };
        let transport = JsonRpcTransport::with_options_and_metrics(
            config.endpoint().url(),
            options,
            metrics.clone(),
        )
        .context("failed to build steem RPC transport")?;

        tracing::info!(
            endpoint = config.endpoint().url(),
            gateway = config.endpoint().is_gateway(),
            "steem client ready"
        );

        Ok(Self::with_transport_and_metrics(
            config,
            Arc::new(transport),
            metrics,
        ))
    }

    /// Builds a client from `STEEMD_URL` / `JUSSI_URL`.
    pub fn from_env() -> Result<Self> {
        Self::from_config(ClientConfig::from_env()?)
    }
}

impl<T> SteemClient<T>
where
    T: RpcTransport + ?Sized,
{
    pub fn with_transport(config: ClientConfig, transport: Arc<T>) -> Self {
        Self::with_transport_and_metrics(config, transport, Arc::new(ClientMetrics::default()))
    }

    fn with_transport_and_metrics(
        config: ClientConfig,
        transport: Arc<T>,
        metrics: Arc<ClientMetrics>,
    ) -> Self {
        let strategy = BatchStrategy::for_config(&config);
        let retry = linear_policy(config.retry_unit());
        Self {
            config,
            transport,
            strategy,
            retry,
            metrics,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn strategy(&self) -> BatchStrategy {
        self.strategy
    }

    pub fn metrics(&self) -> ClientMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Fetches account objects, one per requested name and in the same order.
    pub async fn get_accounts<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Value>> {
        if names.is_empty() {
            return Err(RpcError::invalid_input("no accounts passed to get_accounts").into());
        }

        let names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
        let response = self.transport.execute(GET_ACCOUNTS, vec![json!(names)]).await?;

        if is_blank(&response) {
            return Err(RpcError::bad_response(GET_ACCOUNTS, "get_accounts response was blank").into());
        }
        let accounts = match response {
            Value::Array(accounts) => accounts,
            other => {
                return Err(RpcError::bad_response(
                    GET_ACCOUNTS,
                    format!("expected an array, got {other}"),
                )
                .into())
            }
        };
        if accounts.len() != names.len() {
            return Err(RpcError::bad_response(
                GET_ACCOUNTS,
                format!("requested {} accounts got {}", names.len(), accounts.len()),
            )
            .into());
        }

        Ok(accounts)
    }

    /// Fetches posts by `(author, permlink)`. Every result must be a post
    /// object carrying an `author`.
    pub async fn get_content_batch<A, P>(&self, posts: &[(A, P)]) -> Result<Vec<Value>>
    where
        A: AsRef<str>,
        P: AsRef<str>,
    {
        let params: Vec<Vec<Value>> = posts
            .iter()
            .map(|(author, permlink)| {
                let (author, permlink): (&str, &str) = (author.as_ref(), permlink.as_ref());
                vec![json!(author), json!(permlink)]
            })
            .collect();

        let contents = self
            .strategy
            .execute(
                self.transport.as_ref(),
                GET_CONTENT,
                &params,
                self.retry,
                &self.metrics,
            )
            .await?;

        if contents.len() != params.len() {
            return Err(RpcError::bad_response(
                GET_CONTENT,
                format!("requested {} posts got {}", params.len(), contents.len()),
            )
            .into());
        }

        for post in &contents {
            if is_blank(post) {
                return Err(
                    RpcError::bad_response(GET_CONTENT, format!("unexpected empty response: {post}"))
                        .into(),
                );
            }
            if post.get("author").is_none() {
                return Err(RpcError::bad_response(GET_CONTENT, format!("invalid post: {post}")).into());
            }
        }

        Ok(contents)
    }

    /// A single block, or `None` when the node does not have it (yet).
    pub async fn get_block(&self, num: u64) -> Result<Option<Value>> {
        let block = self.transport.execute(GET_BLOCK, vec![json!(num)]).await?;
        Ok(if is_blank(&block) { None } else { Some(block) })
    }

    /// Fresh DGP snapshot. Retries with linear backoff until the upstream
    /// returns a non-empty object carrying `time`.
    pub async fn dynamic_global_properties(&self) -> Result<DynamicGlobalProperties> {
        retry_transient(
            self.retry,
            RetryContext::new(&DGP_RETRY, GET_DGP),
            &self.metrics,
            || async {
                let value = self.transport.execute(GET_DGP, Vec::new()).await?;
                DynamicGlobalProperties::from_value(value)
            },
        )
        .await
    }

    pub async fn head_time(&self) -> Result<String> {
        let dgp = self.dynamic_global_properties().await?;
        Ok(dgp.time()?.to_owned())
    }

    pub async fn head_block(&self) -> Result<u64> {
        self.dynamic_global_properties().await?.head_block_number()
    }

    pub async fn last_irreversible_block_num(&self) -> Result<u64> {
        self.dynamic_global_properties()
            .await?
            .last_irreversible_block_num()
    }

    /// Blocks `lower..upper` (upper exclusive), in order, each exactly once.
    ///
    /// Keeps re-requesting missing blocks until the upstream delivers all of
    /// them, pausing between passes. Unless `max_reconcile_passes` is
    /// configured this only returns once the range is complete.
    pub async fn get_blocks_range(&self, lower: u64, upper: u64) -> Result<Vec<Value>> {
        RangeReconciler {
            transport: self.transport.as_ref(),
            strategy: self.strategy,
            retry: self.retry,
            missing_delay: self.config.missing_blocks_delay(),
            max_passes: self.config.max_reconcile_passes(),
            metrics: &self.metrics,
        }
        .fetch_range(lower, upper)
        .await
    }
}
