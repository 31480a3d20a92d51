//! Gap-free block range retrieval.
//!
//! Upstreams drop entries from batches, answer `null` for blocks they have not
//! caught up to yet, and occasionally repeat a block. `RangeReconciler` keeps
//! re-requesting exactly the numbers that are still missing until every block
//! of the half-open range has been seen once, then hands the blocks back in
//! ascending order.

use crate::processor::backoff::RetryBackoff;
use crate::rpc::error::{is_transient, RpcError};
use crate::rpc::helpers::block_num;
use crate::rpc::metrics::ClientMetrics;
use crate::rpc::strategy::BatchStrategy;
use crate::rpc::transport::RpcTransport;
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::sleep;

const GET_BLOCK: &str = "get_block";

pub(crate) struct RangeReconciler<'a, T: ?Sized> {
    pub(crate) transport: &'a T,
    pub(crate) strategy: BatchStrategy,
    pub(crate) retry: RetryBackoff,
    pub(crate) missing_delay: Duration,
    pub(crate) max_passes: Option<usize>,
    pub(crate) metrics: &'a ClientMetrics,
}

impl<'a, T> RangeReconciler<'a, T>
where
    T: RpcTransport + ?Sized,
{
    /// Returns exactly `upper - lower` blocks numbered `lower..upper`.
    pub(crate) async fn fetch_range(&self, lower: u64, upper: u64) -> Result<Vec<Value>> {
        if lower > upper {
            return Err(RpcError::invalid_input(format!(
                "block range lower bound {lower} exceeds upper bound {upper}"
            ))
            .into());
        }

        let mut blocks = BlocksMap::new(lower, upper);
        let mut missing = blocks.missing();
        let mut pass = 0usize;

        while !missing.is_empty() {
            pass += 1;
            self.metrics.record_reconcile_pass();

            let params: Vec<Vec<Value>> = missing.iter().map(|num| vec![Value::from(*num)]).collect();
            match self
                .strategy
                .execute_each(self.transport, GET_BLOCK, &params, self.retry, self.metrics)
                .await
            {
                Ok(results) => {
                    let fetched = self.keep_successful(pass, results)?;
                    blocks.absorb(fetched, self.metrics);
                }
                Err(err) if is_transient(&err) => {
                    tracing::warn!(
                        pass,
                        requested = params.len(),
                        error = %err,
                        "get_block pass failed; treating requested blocks as missing"
                    );
                }
                Err(err) => return Err(err),
            }

            missing = blocks.missing();
            if missing.is_empty() {
                break;
            }

            tracing::warn!(
                pass,
                start_block = lower,
                end_block = upper,
                missing = ?missing,
                "API missed blocks"
            );

            if let Some(max_passes) = self.max_passes {
                if pass >= max_passes {
                    return Err(RpcError::MissingBlocks {
                        passes: pass,
                        missing,
                    }
                    .into());
                }
            }

            sleep(self.missing_delay).await;
        }

        if pass > 1 {
            tracing::info!(passes = pass, start_block = lower, end_block = upper, "block range reconciled");
        }

        blocks.into_ordered()
    }

    /// Splits per-call results into the blocks that arrived. Transiently
    /// failed calls leave their numbers missing for the next pass; any other
    /// failure aborts the range.
    fn keep_successful(&self, pass: usize, results: Vec<Result<Value>>) -> Result<Vec<Value>> {
        let mut fetched = Vec::with_capacity(results.len());
        let mut failed = 0usize;
        let mut last_error = None;

        for result in results {
            match result {
                Ok(block) => fetched.push(block),
                Err(err) if is_transient(&err) => {
                    failed += 1;
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(err) = last_error {
            tracing::warn!(
                pass,
                failed,
                error = %err,
                "get_block calls failed; their blocks stay missing"
            );
        }

        Ok(fetched)
    }
}

/// Validated blocks keyed by number. Grows monotonically; the first block
/// seen for a number is the one kept.
pub(crate) struct BlocksMap {
    lower: u64,
    upper: u64,
    blocks: BTreeMap<u64, Value>,
}

impl BlocksMap {
    pub(crate) fn new(lower: u64, upper: u64) -> Self {
        Self {
            lower,
            upper,
            blocks: BTreeMap::new(),
        }
    }

    /// Required numbers not yet validated, ascending.
    pub(crate) fn missing(&self) -> Vec<u64> {
        (self.lower..self.upper)
            .filter(|num| !self.blocks.contains_key(num))
            .collect()
    }

    /// Validates and stores a batch of raw `get_block` results. Entries
    /// without a decodable `block_id` are dropped; repeats keep the first.
    pub(crate) fn absorb(&mut self, fetched: Vec<Value>, metrics: &ClientMetrics) {
        for block in fetched {
            let num = match block_num(&block) {
                Ok(num) => num,
                Err(err) => {
                    metrics.record_dropped_block();
                    tracing::warn!(error = %err, block = %block, "invalid block returned; discarding");
                    continue;
                }
            };

            match self.blocks.entry(num) {
                Entry::Occupied(_) => {
                    metrics.record_duplicate_block();
                    tracing::warn!(block_num = num, "batch get_block returned duplicate; keeping first");
                }
                Entry::Vacant(slot) => {
                    slot.insert(block);
                }
            }
        }
    }

    fn into_ordered(mut self) -> Result<Vec<Value>> {
        (self.lower..self.upper)
            .map(|num| {
                self.blocks
                    .remove(&num)
                    .ok_or_else(|| anyhow!("block {num} missing after reconciliation"))
            })
            .collect()
    }
}
