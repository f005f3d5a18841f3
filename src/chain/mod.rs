//! Chain log fetching — the transport collaborator.
//!
//! Owns pagination, retry with backoff, and block-timestamp resolution.
//! The core never sees any of it: this layer hands over a flat list of raw
//! records (possibly duplicated, possibly out of order) and the pipeline
//! takes it from there. An empty result after exhausted retries is a valid
//! result, not a crash.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, Filter, Log, H256};
use futures::stream::{self, StreamExt};

use crate::error::{Result, ScanError};
use crate::event::{RawApprovalLog, APPROVAL_TOPIC};

/// Boundary trait for approval-log transport.
#[async_trait]
pub trait ApprovalLogSource: Send + Sync {
    /// Fetch all `Approval` logs emitted for `owner` in the inclusive
    /// block range. Order and uniqueness are not guaranteed.
    async fn fetch_approval_logs(
        &self,
        owner: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawApprovalLog>>;
}

/// Split an inclusive block range into inclusive chunks of at most
/// `chunk_size` blocks. Covers the range exactly, without overlap.
pub fn split_block_ranges(from: u64, to: u64, chunk_size: u64) -> Vec<(u64, u64)> {
    let chunk = chunk_size.max(1);
    let mut ranges = Vec::new();
    let mut start = from;
    while start <= to {
        let end = start.saturating_add(chunk - 1).min(to);
        ranges.push((start, end));
        if end == u64::MAX {
            break;
        }
        start = end + 1;
    }
    ranges
}

/// `eth_getLogs`-backed source with chunked pagination and bounded retry.
pub struct RpcLogSource {
    provider: Arc<Provider<Http>>,
    chunk_size: u64,
    max_retries: u32,
    retry_base: Duration,
    timestamp_concurrency: usize,
}

impl RpcLogSource {
    pub fn new(provider: Arc<Provider<Http>>, chunk_size: u64, max_retries: u32) -> Self {
        Self {
            provider,
            chunk_size,
            max_retries,
            retry_base: Duration::from_millis(500),
            timestamp_concurrency: 8,
        }
    }

    pub async fn latest_block(&self) -> Result<u64> {
        self.provider
            .get_block_number()
            .await
            .map(|n| n.as_u64())
            .map_err(|e| ScanError::Rpc(e.to_string()))
    }

    async fn fetch_chunk(&self, filter: &Filter) -> Result<Vec<Log>> {
        let mut attempt = 0u32;
        loop {
            match self.provider.get_logs(filter).await {
                Ok(logs) => return Ok(logs),
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.retry_base * 2u32.saturating_pow(attempt - 1);
                    tracing::warn!(
                        "eth_getLogs failed (attempt {attempt}/{}): {e}; retrying in {delay:?}",
                        self.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(ScanError::Rpc(e.to_string())),
            }
        }
    }

    /// Resolve block timestamps for the given block numbers. Best-effort:
    /// a header that cannot be fetched leaves its blocks without a
    /// timestamp rather than failing the scan.
    async fn block_timestamps(&self, blocks: HashSet<u64>) -> HashMap<u64, DateTime<Utc>> {
        stream::iter(blocks)
            .map(|number| {
                let provider = self.provider.clone();
                async move {
                    let timestamp = provider
                        .get_block(number)
                        .await
                        .ok()
                        .flatten()
                        .and_then(|block| {
                            Utc.timestamp_opt(block.timestamp.low_u64() as i64, 0).single()
                        });
                    (number, timestamp)
                }
            })
            .buffer_unordered(self.timestamp_concurrency)
            .filter_map(|(number, timestamp)| async move { timestamp.map(|t| (number, t)) })
            .collect()
            .await
    }
}

#[async_trait]
impl ApprovalLogSource for RpcLogSource {
    async fn fetch_approval_logs(
        &self,
        owner: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawApprovalLog>> {
        if from_block > to_block {
            return Err(ScanError::InvalidRange {
                from: from_block,
                to: to_block,
            });
        }

        let mut logs: Vec<Log> = Vec::new();
        for (start, end) in split_block_ranges(from_block, to_block, self.chunk_size) {
            let filter = Filter::new()
                .topic0(*APPROVAL_TOPIC)
                .topic1(H256::from(owner))
                .from_block(start)
                .to_block(end);
            let chunk = self.fetch_chunk(&filter).await?;
            tracing::debug!(start, end, count = chunk.len(), "fetched approval log chunk");
            logs.extend(chunk);
        }

        let blocks: HashSet<u64> = logs
            .iter()
            .filter_map(|log| log.block_number.map(|n| n.as_u64()))
            .collect();
        let timestamps = self.block_timestamps(blocks).await;

        Ok(logs
            .into_iter()
            .map(|log| raw_from_log(log, &timestamps))
            .collect())
    }
}

fn raw_from_log(log: Log, timestamps: &HashMap<u64, DateTime<Utc>>) -> RawApprovalLog {
    let block_number = log.block_number.map(|n| n.as_u64());
    RawApprovalLog {
        token: log.address,
        topics: log.topics,
        data: log.data.to_vec(),
        block_number,
        transaction_hash: log.transaction_hash,
        block_timestamp: block_number.and_then(|n| timestamps.get(&n).copied()),
    }
}
