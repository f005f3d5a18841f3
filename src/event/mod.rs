//! Event normalization — raw approval log records into canonical events.
//!
//! The chain collaborator hands over whatever the transport produced
//! (possibly duplicated, out of order, or malformed). Normalization is a
//! pure transform: one bad record never fails the batch, it is simply
//! dropped and counted.

use chrono::{DateTime, Utc};
use ethers::types::{Address, H256, U256};
use ethers::utils::keccak256;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};

/// topic0 of `Approval(address,address,uint256)`.
pub static APPROVAL_TOPIC: Lazy<H256> =
    Lazy::new(|| H256::from(keccak256(b"Approval(address,address,uint256)")));

/// Parse an address from user or config input. The single boundary where
/// address strings enter the system; everything past this point compares
/// addresses byte-wise, so inconsistent casing in log data cannot split keys.
pub fn parse_address(s: &str) -> Result<Address> {
    s.trim()
        .parse::<Address>()
        .map_err(|_| ScanError::InvalidAddress(s.to_string()))
}

/// A raw approval log record as delivered by the transport layer.
///
/// Field presence is deliberately optional: paginated `eth_getLogs` results
/// can include pending or partial entries, and the normalizer decides what
/// is usable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawApprovalLog {
    /// Emitting contract, i.e. the token.
    pub token: Address,
    pub topics: Vec<H256>,
    pub data: Vec<u8>,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<H256>,
    /// Block timestamp, resolved by the chain layer when available.
    pub block_timestamp: Option<DateTime<Utc>>,
}

/// One on-chain `Approval` emission in canonical shape.
///
/// `value` is the new allowance as of this event, not a delta.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedApprovalEvent {
    pub token: Address,
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
    pub block_number: u64,
    pub transaction_hash: Option<H256>,
    pub timestamp: Option<DateTime<Utc>>,
}

fn topic_to_address(topic: &H256) -> Address {
    Address::from_slice(&topic.as_bytes()[12..])
}

/// Normalize one raw record. `None` means "unparseable, skip": missing
/// owner or spender topic, missing block number, or a value that is not a
/// big-endian word of at most 32 bytes.
pub fn normalize_log(raw: &RawApprovalLog) -> Option<NormalizedApprovalEvent> {
    match raw.topics.first() {
        Some(topic0) if *topic0 == *APPROVAL_TOPIC => {}
        _ => return None,
    }
    if raw.topics.len() < 3 {
        return None;
    }
    let block_number = raw.block_number?;
    if raw.data.is_empty() || raw.data.len() > 32 {
        return None;
    }

    Some(NormalizedApprovalEvent {
        token: raw.token,
        owner: topic_to_address(&raw.topics[1]),
        spender: topic_to_address(&raw.topics[2]),
        value: U256::from_big_endian(&raw.data),
        block_number,
        transaction_hash: raw.transaction_hash,
        timestamp: raw.block_timestamp,
    })
}

/// Normalize a batch, preserving input order. Returns the events plus the
/// number of records dropped as unparseable.
pub fn normalize_batch(raws: &[RawApprovalLog]) -> (Vec<NormalizedApprovalEvent>, usize) {
    let mut events = Vec::with_capacity(raws.len());
    let mut skipped = 0usize;
    for raw in raws {
        match normalize_log(raw) {
            Some(event) => events.push(event),
            None => skipped += 1,
        }
    }
    (events, skipped)
}
