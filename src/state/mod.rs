//! Approval state reduction — event streams into current per-pair state.
//!
//! Folds a possibly unordered, possibly duplicated sequence of normalized
//! events into one `ApprovalPairState` per (token, spender) pair. The event
//! with the highest block number wins; exact block ties are broken by input
//! position (last applied wins), never by map iteration order.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::event::NormalizedApprovalEvent;

/// Composite identity of one approval relationship.
///
/// Addresses are compared byte-wise, so keys cannot split on hex casing the
/// way string-concatenation keys do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    pub token: Address,
    pub spender: Address,
}

impl PairKey {
    pub fn new(token: Address, spender: Address) -> Self {
        Self { token, spender }
    }
}

/// Current reduced state of one (token, spender) pair for one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPairState {
    pub token: Address,
    pub spender: Address,
    /// Allowance as of the winning (latest) event.
    pub current_allowance: U256,
    /// Block time of the earliest contributing event. Not reset by a
    /// revoke/re-approve cycle: it tracks how long the spender relationship
    /// has existed.
    pub first_seen_at: Option<DateTime<Utc>>,
    /// Block time of the winning event.
    pub last_modified_at: Option<DateTime<Utc>>,
    pub first_seen_block: u64,
    pub last_modified_block: u64,
    /// Distinct events folded into this pair, accumulated across revoke and
    /// re-approve cycles.
    pub mutation_count: u32,
    pub is_unlimited: bool,
}

impl ApprovalPairState {
    pub fn key(&self) -> PairKey {
        PairKey::new(self.token, self.spender)
    }
}

/// Allowance at or above this value is treated as practically infinite.
/// `percent` is clamped to the supported 50–99 range.
pub fn unlimited_threshold(percent: u8) -> U256 {
    let pct = percent.clamp(50, 99);
    U256::MAX / U256::from(100u8) * U256::from(pct)
}

#[derive(Debug, Clone)]
pub struct ReducerOptions {
    /// Retain fully revoked pairs (`current_allowance == 0`) for audit
    /// reporting instead of dropping them.
    pub include_zero_allowances: bool,
    pub unlimited_threshold: U256,
}

impl Default for ReducerOptions {
    fn default() -> Self {
        Self {
            include_zero_allowances: false,
            unlimited_threshold: unlimited_threshold(90),
        }
    }
}

/// Reduce an event sequence for a single owner into per-pair current state.
///
/// Events for other owners are skipped (over-broad fetches happen with
/// misconfigured filters). Exact duplicates are treated as pagination
/// overlap and collapsed before counting mutations.
pub fn reduce_events(
    owner: Address,
    events: &[NormalizedApprovalEvent],
    opts: &ReducerOptions,
) -> BTreeMap<PairKey, ApprovalPairState> {
    let mut seen: HashSet<&NormalizedApprovalEvent> = HashSet::new();
    let mut groups: BTreeMap<PairKey, Vec<(usize, &NormalizedApprovalEvent)>> = BTreeMap::new();

    for (idx, event) in events.iter().enumerate() {
        if event.owner != owner {
            continue;
        }
        if !seen.insert(event) {
            continue;
        }
        groups
            .entry(PairKey::new(event.token, event.spender))
            .or_default()
            .push((idx, event));
    }

    let mut reduced = BTreeMap::new();
    for (key, mut group) in groups {
        // Stable total order: block number, then input position.
        group.sort_by_key(|(idx, event)| (event.block_number, *idx));
        let (_, first) = group[0];
        let (_, winner) = group[group.len() - 1];

        if winner.value.is_zero() && !opts.include_zero_allowances {
            continue;
        }

        reduced.insert(
            key,
            ApprovalPairState {
                token: key.token,
                spender: key.spender,
                current_allowance: winner.value,
                first_seen_at: first.timestamp,
                last_modified_at: winner.timestamp,
                first_seen_block: first.block_number,
                last_modified_block: winner.block_number,
                mutation_count: group.len() as u32,
                is_unlimited: winner.value >= opts.unlimited_threshold,
            },
        );
    }
    reduced
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn owner() -> Address {
        addr(0x0F)
    }

    fn event(block: u64, value: U256) -> NormalizedApprovalEvent {
        NormalizedApprovalEvent {
            token: addr(0xA0),
            owner: owner(),
            spender: addr(0xB0),
            value,
            block_number: block,
            transaction_hash: None,
            timestamp: Utc.timestamp_opt(1_600_000_000 + block as i64, 0).single(),
        }
    }

    fn reduce(events: &[NormalizedApprovalEvent]) -> BTreeMap<PairKey, ApprovalPairState> {
        reduce_events(owner(), events, &ReducerOptions::default())
    }

    #[test]
    fn latest_block_wins_regardless_of_input_order() {
        let events = vec![
            event(30, U256::from(300)),
            event(10, U256::from(100)),
            event(20, U256::from(200)),
        ];
        let reduced = reduce(&events);
        let state = reduced.values().next().unwrap();
        assert_eq!(state.current_allowance, U256::from(300));
        assert_eq!(state.first_seen_block, 10);
        assert_eq!(state.last_modified_block, 30);
        assert_eq!(state.mutation_count, 3);
    }

    #[test]
    fn same_block_tie_broken_by_input_position() {
        let mut second = event(10, U256::from(2));
        second.transaction_hash = Some(ethers::types::H256::from_low_u64_be(2));
        let events = vec![event(10, U256::from(1)), second];
        let reduced = reduce(&events);
        assert_eq!(
            reduced.values().next().unwrap().current_allowance,
            U256::from(2)
        );
    }

    #[test]
    fn revoked_pairs_excluded_by_default() {
        let events = vec![event(10, U256::from(100)), event(20, U256::zero())];
        assert!(reduce(&events).is_empty());
    }

    #[test]
    fn revoked_pairs_retained_on_request() {
        let events = vec![event(10, U256::from(100)), event(20, U256::zero())];
        let opts = ReducerOptions {
            include_zero_allowances: true,
            ..Default::default()
        };
        let reduced = reduce_events(owner(), &events, &opts);
        let state = reduced.values().next().unwrap();
        assert_eq!(state.current_allowance, U256::zero());
        assert_eq!(state.mutation_count, 2);
    }

    #[test]
    fn reapproval_after_revocation_is_live_again() {
        let events = vec![
            event(10, U256::from(100)),
            event(20, U256::zero()),
            event(30, U256::from(50)),
        ];
        let reduced = reduce(&events);
        let state = reduced.values().next().unwrap();
        assert_eq!(state.current_allowance, U256::from(50));
        assert_eq!(state.mutation_count, 3);
        // first_seen survives the revoke cycle
        assert_eq!(state.first_seen_block, 10);
    }

    #[test]
    fn foreign_owner_events_are_skipped() {
        let mut foreign = event(10, U256::from(100));
        foreign.owner = addr(0xEE);
        assert!(reduce(&[foreign]).is_empty());
    }

    #[test]
    fn exact_duplicates_collapse() {
        let events = vec![event(10, U256::from(100)), event(10, U256::from(100))];
        let reduced = reduce(&events);
        assert_eq!(reduced.values().next().unwrap().mutation_count, 1);
    }

    #[test]
    fn max_allowance_marks_unlimited() {
        let events = vec![event(10, U256::MAX)];
        let reduced = reduce(&events);
        assert!(reduced.values().next().unwrap().is_unlimited);
    }

    #[test]
    fn moderate_allowance_is_not_unlimited() {
        let events = vec![event(10, U256::from(1_000_000u64))];
        let reduced = reduce(&events);
        assert!(!reduced.values().next().unwrap().is_unlimited);
    }

    #[test]
    fn threshold_percent_is_clamped() {
        assert_eq!(unlimited_threshold(10), unlimited_threshold(50));
        assert_eq!(unlimited_threshold(255), unlimited_threshold(99));
        assert!(unlimited_threshold(50) < unlimited_threshold(99));
    }

    #[test]
    fn pairs_are_keyed_per_token_and_spender() {
        let mut other_token = event(10, U256::from(1));
        other_token.token = addr(0xA1);
        let mut other_spender = event(10, U256::from(2));
        other_spender.spender = addr(0xB1);
        let events = vec![event(10, U256::from(3)), other_token, other_spender];
        assert_eq!(reduce(&events).len(), 3);
    }

    proptest! {
        // Property: the reduced allowance equals the value of the event with
        // the maximum block number, for any input permutation.
        #[test]
        fn reduction_is_permutation_invariant(
            (values, order) in proptest::collection::vec(any::<u64>(), 1..16)
                .prop_flat_map(|values| {
                    let n = values.len();
                    (Just(values), Just((0..n).collect::<Vec<usize>>()).prop_shuffle())
                })
        ) {
            let shuffled: Vec<NormalizedApprovalEvent> = order
                .iter()
                .map(|&i| event(10 + i as u64 * 10, U256::from(values[i])))
                .collect();
            let opts = ReducerOptions {
                include_zero_allowances: true,
                ..Default::default()
            };
            let reduced = reduce_events(owner(), &shuffled, &opts);
            let state = reduced.values().next().unwrap();
            prop_assert_eq!(
                state.current_allowance,
                U256::from(values[values.len() - 1])
            );
        }
    }
}
