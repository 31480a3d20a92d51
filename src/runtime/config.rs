use crate::rpc::strategy::{DEFAULT_BATCH_CHUNK_SIZE, DEFAULT_MAX_CONCURRENT_CALLS};
use anyhow::{bail, Result};
use std::env;
use std::time::Duration;

pub const STEEMD_URL_ENV: &str = "STEEMD_URL";
pub const JUSSI_URL_ENV: &str = "JUSSI_URL";

const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRY_UNIT_SECS: u64 = 1;
const DEFAULT_MISSING_BLOCKS_DELAY_SECS: u64 = 3;

/// The upstream the client talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A steemd node reached directly.
    Node(String),
    /// A jussi gateway in front of one or more nodes; supports real batches.
    Gateway(String),
}

impl Endpoint {
    pub fn url(&self) -> &str {
        match self {
            Endpoint::Node(url) | Endpoint::Gateway(url) => url,
        }
    }

    pub fn is_gateway(&self) -> bool {
        matches!(self, Endpoint::Gateway(_))
    }
}

/// Runtime configuration for [`SteemClient`](crate::SteemClient).
///
/// All instances must be constructed via [`ClientConfig::builder`],
/// [`ClientConfig::new`] or [`ClientConfig::from_env`] so invariants are
/// validated before any consumer observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    endpoint: Endpoint,
    steemd_url: Option<String>,
    jussi_url: Option<String>,
    rpc_timeout: Duration,
    retry_unit: Duration,
    missing_blocks_delay: Duration,
    batch_chunk_size: usize,
    max_concurrent_calls: usize,
    max_reconcile_passes: Option<usize>,
}

pub struct ClientConfigParams {
    pub steemd_url: Option<String>,
    pub jussi_url: Option<String>,
    pub rpc_timeout: Duration,
    pub retry_unit: Duration,
    pub missing_blocks_delay: Duration,
    pub batch_chunk_size: usize,
    pub max_concurrent_calls: usize,
    pub max_reconcile_passes: Option<usize>,
}

impl ClientConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    pub fn new(params: ClientConfigParams) -> Result<Self> {
        let ClientConfigParams {
            steemd_url,
            jussi_url,
            rpc_timeout,
            retry_unit,
            missing_blocks_delay,
            batch_chunk_size,
            max_concurrent_calls,
            max_reconcile_passes,
        } = params;

        let steemd_url = non_empty(steemd_url);
        let jussi_url = non_empty(jussi_url);
        let endpoint = resolve_endpoint(steemd_url.as_deref(), jussi_url.as_deref())?;

        let config = Self {
            endpoint,
            steemd_url,
            jussi_url,
            rpc_timeout,
            retry_unit,
            missing_blocks_delay,
            batch_chunk_size,
            max_concurrent_calls,
            max_reconcile_passes,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reads `STEEMD_URL` and `JUSSI_URL`; everything else uses defaults.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();
        if let Ok(url) = env::var(STEEMD_URL_ENV) {
            builder = builder.steemd_url(url);
        }
        if let Ok(url) = env::var(JUSSI_URL_ENV) {
            builder = builder.jussi_url(url);
        }
        builder.build()
    }

    /// The authoritative upstream. The gateway wins when both URLs are set.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn steemd_url(&self) -> Option<&str> {
        self.steemd_url.as_deref()
    }

    pub fn jussi_url(&self) -> Option<&str> {
        self.jussi_url.as_deref()
    }

    /// Per-request timeout applied by the HTTP transport.
    pub fn rpc_timeout(&self) -> Duration {
        self.rpc_timeout
    }

    /// Backoff unit of the linear retry policy: attempt `n` sleeps `n` units.
    pub fn retry_unit(&self) -> Duration {
        self.retry_unit
    }

    /// Pause between reconciliation passes while blocks are still missing.
    pub fn missing_blocks_delay(&self) -> Duration {
        self.missing_blocks_delay
    }

    /// Maximum calls per server-side batch in gateway mode.
    pub fn batch_chunk_size(&self) -> usize {
        self.batch_chunk_size
    }

    /// Maximum in-flight calls for the direct-node fan-out.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_concurrent_calls
    }

    /// `None` keeps reconciling until every block arrives.
    pub fn max_reconcile_passes(&self) -> Option<usize> {
        self.max_reconcile_passes
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        match resolve_endpoint(self.steemd_url.as_deref(), self.jussi_url.as_deref())? {
            Endpoint::Gateway(url) => validate_url(&url, "jussi_url")?,
            Endpoint::Node(url) => validate_url(&url, "steemd_url")?,
        }

        if self.rpc_timeout.is_zero() {
            bail!("rpc_timeout must be greater than 0");
        }

        if self.retry_unit.is_zero() {
            bail!("retry_unit must be greater than 0");
        }

        if self.batch_chunk_size == 0 {
            bail!("batch_chunk_size must be greater than 0");
        }

        if self.max_concurrent_calls == 0 {
            bail!("max_concurrent_calls must be greater than 0");
        }

        if self.max_reconcile_passes == Some(0) {
            bail!("max_reconcile_passes must be greater than 0 when set");
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct ClientConfigBuilder {
    steemd_url: Option<String>,
    jussi_url: Option<String>,
    rpc_timeout: Option<Duration>,
    retry_unit: Option<Duration>,
    missing_blocks_delay: Option<Duration>,
    batch_chunk_size: Option<usize>,
    max_concurrent_calls: Option<usize>,
    max_reconcile_passes: Option<usize>,
}

impl ClientConfigBuilder {
    pub fn steemd_url(mut self, url: impl Into<String>) -> Self {
        self.steemd_url = Some(url.into());
        self
    }

    pub fn jussi_url(mut self, url: impl Into<String>) -> Self {
        self.jussi_url = Some(url.into());
        self
    }

    pub fn rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = Some(timeout);
        self
    }

    pub fn retry_unit(mut self, unit: Duration) -> Self {
        self.retry_unit = Some(unit);
        self
    }

    pub fn missing_blocks_delay(mut self, delay: Duration) -> Self {
        self.missing_blocks_delay = Some(delay);
        self
    }

    pub fn batch_chunk_size(mut self, size: usize) -> Self {
        self.batch_chunk_size = Some(size);
        self
    }

    pub fn max_concurrent_calls(mut self, count: usize) -> Self {
        self.max_concurrent_calls = Some(count);
        self
    }

    pub fn max_reconcile_passes(mut self, passes: usize) -> Self {
        self.max_reconcile_passes = Some(passes);
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        let params = ClientConfigParams {
            steemd_url: self.steemd_url,
            jussi_url: self.jussi_url,
            rpc_timeout: self
                .rpc_timeout
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_RPC_TIMEOUT_SECS)),
            retry_unit: self
                .retry_unit
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_RETRY_UNIT_SECS)),
            missing_blocks_delay: self
                .missing_blocks_delay
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_MISSING_BLOCKS_DELAY_SECS)),
            batch_chunk_size: self.batch_chunk_size.unwrap_or(DEFAULT_BATCH_CHUNK_SIZE),
            max_concurrent_calls: self
                .max_concurrent_calls
                .unwrap_or(DEFAULT_MAX_CONCURRENT_CALLS),
            max_reconcile_passes: self.max_reconcile_passes,
        };

        ClientConfig::new(params)
    }
}

fn resolve_endpoint(steemd_url: Option<&str>, jussi_url: Option<&str>) -> Result<Endpoint> {
    match (jussi_url, steemd_url) {
        (Some(jussi), _) => Ok(Endpoint::Gateway(jussi.to_owned())),
        (None, Some(steemd)) => Ok(Endpoint::Node(steemd.to_owned())),
        (None, None) => bail!("steem API endpoint undefined: set steemd_url or jussi_url"),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn validate_url(url: &str, field: &str) -> Result<()> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("{field} must start with http:// or https://");
    }
    Ok(())
}
