//! JSON-RPC client plumbing: transport, batch strategies, retry policy,
//! metrics, and helpers for steemd responses.

pub mod client;
pub mod dgp;
pub mod error;
pub mod helpers;
pub mod metrics;
#[cfg(test)]
pub(crate) mod mock;
pub mod options;
pub mod retry;
pub mod strategy;
pub mod transport;

pub use client::SteemClient;
pub use dgp::DynamicGlobalProperties;
pub use error::RpcError;
pub use helpers::{block_num, block_num_from_id};
pub use metrics::ClientMetricsSnapshot;
pub use options::RpcClientOptions;
pub use strategy::BatchStrategy;
pub use transport::{JsonRpcTransport, RpcTransport};
