use std::time::Duration;

use anyhow::Result;
use once_cell::sync::Lazy;
use steemblock::{ClientConfig, SteemClient};
use tracing_subscriber::EnvFilter;

static TRACING_SUBSCRIBER: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING_SUBSCRIBER);
}

/// Direct-node client with delays short enough for loopback tests.
pub fn node_client(url: &str) -> Result<SteemClient> {
    let config = ClientConfig::builder()
        .steemd_url(url)
        .rpc_timeout(Duration::from_secs(5))
        .retry_unit(Duration::from_millis(10))
        .missing_blocks_delay(Duration::from_millis(10))
        .max_concurrent_calls(4)
        .build()?;
    SteemClient::from_config(config)
}

/// Gateway client that splits batches into chunks of `chunk_size`.
pub fn gateway_client(url: &str, chunk_size: usize) -> Result<SteemClient> {
    let config = ClientConfig::builder()
        .jussi_url(url)
        .rpc_timeout(Duration::from_secs(5))
        .retry_unit(Duration::from_millis(10))
        .missing_blocks_delay(Duration::from_millis(10))
        .batch_chunk_size(chunk_size)
        .build()?;
    SteemClient::from_config(config)
}
