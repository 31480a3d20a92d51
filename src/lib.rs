pub mod processor;
pub mod rpc;
pub mod runtime;

pub use processor::backoff::{Backoff, RetryBackoff};
pub use rpc::{
    block_num, block_num_from_id, BatchStrategy, ClientMetricsSnapshot, DynamicGlobalProperties,
    JsonRpcTransport, RpcClientOptions, RpcError, RpcTransport, SteemClient,
};
pub use runtime::config::{ClientConfig, ClientConfigBuilder, ClientConfigParams, Endpoint};
pub use runtime::telemetry::{init_tracing, init_tracing_with};
