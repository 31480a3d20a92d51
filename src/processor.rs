//! Retry loops and block range reconciliation driving the RPC layer.

pub mod backoff;
pub(crate) mod reconciler;
