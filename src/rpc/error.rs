//! Error taxonomy shared by the transport, retry policy, and client facade.
//! Errors travel as `anyhow::Error`; classification downcasts to [`RpcError`].

use std::fmt;

#[derive(Debug, Clone)]
pub enum RpcError {
    /// Caller-supplied arguments violate a precondition.
    InvalidInput { reason: String },
    /// The upstream answered, but the payload is empty or structurally wrong.
    BadResponse { method: String, reason: String },
    /// The transport reported a communication or JSON-RPC level failure.
    Transport { method: String, message: String },
    Timeout { method: String },
    /// Reconciliation gave up after the configured number of passes.
    MissingBlocks { passes: usize, missing: Vec<u64> },
}

impl RpcError {
    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        RpcError::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn bad_response(method: &str, reason: impl Into<String>) -> Self {
        RpcError::BadResponse {
            method: method.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn transport(method: &str, message: impl Into<String>) -> Self {
        RpcError::Transport {
            method: method.to_owned(),
            message: message.into(),
        }
    }

    /// Upstream failures that are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RpcError::BadResponse { .. } | RpcError::Transport { .. } | RpcError::Timeout { .. }
        )
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcError::InvalidInput { reason } => write!(f, "invalid input: {reason}"),
            RpcError::BadResponse { method, reason } => {
                write!(f, "rpc {method} returned a bad response: {reason}")
            }
            RpcError::Transport { method, message } => {
                write!(f, "rpc {method} call failed: {message}")
            }
            RpcError::Timeout { method } => write!(f, "rpc method {method} timed out"),
            RpcError::MissingBlocks { passes, missing } => write!(
                f,
                "blocks still missing after {passes} passes: {missing:?}"
            ),
        }
    }
}

impl std::error::Error for RpcError {}

/// Returns the [`RpcError`] carried by `err`, if any.
pub fn rpc_error(err: &anyhow::Error) -> Option<&RpcError> {
    err.downcast_ref::<RpcError>()
}

/// True when `err` is an upstream failure the retry policy should absorb.
pub fn is_transient(err: &anyhow::Error) -> bool {
    rpc_error(err).map(RpcError::is_transient).unwrap_or(false)
}
