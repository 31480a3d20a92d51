//! Shared retry context, logging helpers, and canned message templates used by
//! the retrying call sites so instrumentation stays consistent.

use crate::processor::backoff::{
    retry_with_backoff, Backoff, RetryBackoff, RetryDisposition,
};
use crate::rpc::error::is_transient;
use crate::rpc::metrics::ClientMetrics;
use anyhow::{Error, Result};
use std::future::Future;
use std::time::Duration;

macro_rules! log_with_retry_ctx {
    ($level:ident, $ctx:expr, $($rest:tt)*) => {{
        if let Some(blocks) = $ctx.blocks {
            tracing::$level!(
                method = $ctx.method,
                start_block = blocks.start,
                end_block = blocks.end,
                $($rest)*
            );
        } else {
            tracing::$level!(method = $ctx.method, $($rest)*);
        }
    }};
}

#[derive(Clone, Copy)]
pub(crate) struct RetryBlocks {
    pub(crate) start: u64,
    pub(crate) end: u64,
}

impl RetryBlocks {
    fn from_params(params: &[Vec<serde_json::Value>]) -> Option<Self> {
        let numbers: Vec<u64> = params
            .iter()
            .filter_map(|call| call.first().and_then(serde_json::Value::as_u64))
            .collect();
        if numbers.len() != params.len() {
            return None;
        }
        let start = numbers.iter().copied().min()?;
        let end = numbers.iter().copied().max().unwrap_or(start);
        Some(Self { start, end })
    }
}

/// Log lines for one retrying call site.
#[derive(Clone, Copy)]
pub(crate) struct RetryMessages {
    pub(crate) retry: &'static str,
    pub(crate) exhausted: &'static str,
    pub(crate) recovered: &'static str,
}

/// Context handed to [`retry_transient`] so call sites attach method and
/// optional block-number metadata to every log line.
#[derive(Clone, Copy)]
pub(crate) struct RetryContext<'a> {
    pub(crate) method: &'a str,
    pub(crate) blocks: Option<RetryBlocks>,
    messages: &'a RetryMessages,
}

impl<'a> RetryContext<'a> {
    pub(crate) fn new(messages: &'a RetryMessages, method: &'a str) -> Self {
        Self {
            method,
            blocks: None,
            messages,
        }
    }

    /// Attaches the block range when every call is a `[number]` lookup.
    pub(crate) fn with_params(
        messages: &'a RetryMessages,
        method: &'a str,
        params: &[Vec<serde_json::Value>],
    ) -> Self {
        Self {
            method,
            blocks: RetryBlocks::from_params(params),
            messages,
        }
    }

    pub(crate) fn log_retry(&self, attempt: usize, backoff: Duration, err: &Error) {
        let backoff_ms = duration_to_millis(backoff);
        log_with_retry_ctx!(
            warn,
            self,
            attempt,
            backoff_ms,
            error = %err,
            "{}",
            self.messages.retry
        );
    }

    /// Only bounded policies exhaust, and the error still surfaces through the
    /// returned `Result` for an outer policy or the caller to handle.
    pub(crate) fn log_exhausted(&self, attempt: usize, err: &Error) {
        log_with_retry_ctx!(warn, self, attempt, error = %err, "{}", self.messages.exhausted);
    }

    pub(crate) fn log_recovered(&self, attempt: usize) {
        if attempt > 1 {
            log_with_retry_ctx!(info, self, attempt, "{}", self.messages.recovered);
        }
    }
}

fn duration_to_millis(backoff: Duration) -> u64 {
    backoff.as_millis().min(u128::from(u64::MAX)) as u64
}

/// Retries `operation` on transient upstream errors using `config`, logging
/// through `context` and counting retries in `metrics`.
pub(crate) async fn retry_transient<T, F, Fut>(
    config: RetryBackoff,
    context: RetryContext<'_>,
    metrics: &ClientMetrics,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_attempt = 0;
    let value = retry_with_backoff(
        config,
        |attempt| {
            last_attempt = attempt;
            operation()
        },
        |attempt, backoff, err, will_retry| {
            metrics.record_failure();
            if will_retry {
                metrics.record_retry();
                context.log_retry(attempt, backoff, err);
            } else {
                context.log_exhausted(attempt, err);
            }
        },
        |_, err| {
            if is_transient(err) {
                RetryDisposition::Retry
            } else {
                RetryDisposition::Abort
            }
        },
    )
    .await?;

    context.log_recovered(last_attempt);
    Ok(value)
}

/// Unbounded linear retry used for DGP polling and gateway batches.
pub(crate) fn linear_policy(unit: Duration) -> RetryBackoff {
    RetryBackoff::unbounded(Backoff::Linear { unit })
}

pub(crate) const DGP_RETRY: RetryMessages = RetryMessages {
    retry: "get_dynamic_global_properties failed; retrying",
    exhausted: "get_dynamic_global_properties exhausted retries",
    recovered: "get_dynamic_global_properties recovered after retries",
};

pub(crate) const GATEWAY_BATCH_RETRY: RetryMessages = RetryMessages {
    retry: "gateway batch failed; retrying whole batch",
    exhausted: "gateway batch exhausted retries",
    recovered: "gateway batch recovered after retries",
};

pub(crate) const SINGLE_CALL_RETRY: RetryMessages = RetryMessages {
    retry: "rpc call failed; retrying",
    exhausted: "rpc call exhausted retries",
    recovered: "rpc call recovered after retries",
};
