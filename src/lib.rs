//! revoscan — read-only risk scanner for outstanding ERC-20 approvals.
//!
//! Reconstructs the current approval state of an owner address from its
//! on-chain `Approval` history, assigns each outstanding (token, spender)
//! pair a deterministic risk score, and emits prioritized revocation
//! recommendations. It never signs or submits transactions.
//!
//! The pipeline is linear and pure: raw logs → normalized events → reduced
//! per-pair state → risk assessments → prioritized recommendations. All
//! I/O (log fetching, metadata enrichment) happens in collaborator layers
//! before [`analyze`] runs.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ethers::providers::{Http, Provider};
//! use revoscan::chain::RpcLogSource;
//! use revoscan::enrich::RpcEnrichment;
//! use revoscan::{scan, ScanOptions};
//!
//! # async fn run() -> revoscan::error::Result<()> {
//! let provider = Arc::new(
//!     Provider::<Http>::try_from("http://127.0.0.1:8545")
//!         .map_err(|e| revoscan::error::ScanError::Rpc(e.to_string()))?,
//! );
//! let source = RpcLogSource::new(provider.clone(), 10_000, 3);
//! let enricher = RpcEnrichment::new(provider, Default::default(), Default::default());
//! let options = ScanOptions::new(1, 0, 19_000_000);
//! let report = scan("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045", &source, &enricher, &options).await?;
//! println!("{} outstanding approvals", report.summary.total_pairs);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod chain;
pub mod config;
pub mod enrich;
pub mod error;
pub mod event;
pub mod output;
pub mod prioritize;
pub mod risk;
pub mod state;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use ethers::types::Address;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chain::ApprovalLogSource;
use crate::enrich::{Enrichment, EnrichmentProvider, TokenMetadata};
use crate::error::{Result, ScanError};
use crate::event::{normalize_batch, parse_address, RawApprovalLog};
use crate::prioritize::{prioritize, RevocationRecommendation, WalletSummary};
use crate::risk::{RiskEngine, RiskParams};
use crate::state::{
    reduce_events, unlimited_threshold, ApprovalPairState, PairKey, ReducerOptions,
};

/// Per-pair enrichment bundles, fully resolved before the pure stages run.
pub type EnrichmentMap = HashMap<PairKey, Enrichment>;

/// Options for a scan invocation.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub chain_id: u64,
    pub from_block: u64,
    pub to_block: u64,
    pub include_zero_allowances: bool,
    pub unlimited_percent: u8,
    pub risk_params: RiskParams,
    /// Reference time for dormancy and report stamping; injected so that
    /// identical inputs yield identical output.
    pub now: DateTime<Utc>,
}

impl ScanOptions {
    pub fn new(chain_id: u64, from_block: u64, to_block: u64) -> Self {
        Self {
            chain_id,
            from_block,
            to_block,
            include_zero_allowances: false,
            unlimited_percent: 90,
            risk_params: RiskParams::new(),
            now: Utc::now(),
        }
    }

    fn reducer_options(&self) -> ReducerOptions {
        ReducerOptions {
            include_zero_allowances: self.include_zero_allowances,
            unlimited_threshold: unlimited_threshold(self.unlimited_percent),
        }
    }
}

/// Complete scan report: plain data, no formatting logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub run_id: Uuid,
    pub owner: Address,
    pub chain_id: u64,
    pub generated_at: DateTime<Utc>,
    pub from_block: u64,
    pub to_block: u64,
    /// Raw records dropped as unparseable.
    pub skipped_records: usize,
    pub recommendations: Vec<RevocationRecommendation>,
    pub summary: WalletSummary,
    /// Token display metadata keyed by lowercased token address.
    pub tokens: BTreeMap<String, TokenMetadata>,
}

/// Canonical string key for token metadata maps.
pub fn token_key(token: Address) -> String {
    format!("{token:#x}")
}

/// The pure pipeline: normalize → reduce → score → prioritize.
///
/// Returns the prioritized recommendations, the wallet summary, and the
/// number of raw records dropped as unparseable. Fully synchronous and
/// deterministic for a given `now`.
pub fn analyze(
    owner: Address,
    raw_logs: &[RawApprovalLog],
    enrichment: &EnrichmentMap,
    params: &RiskParams,
    reducer_opts: &ReducerOptions,
    now: DateTime<Utc>,
) -> (Vec<RevocationRecommendation>, WalletSummary, usize) {
    let (events, skipped) = normalize_batch(raw_logs);
    let reduced = reduce_events(owner, &events, reducer_opts);
    let pairs: Vec<ApprovalPairState> = reduced.into_values().collect();
    let (recommendations, summary) = score_and_prioritize(pairs, enrichment, params, now);
    (recommendations, summary, skipped)
}

/// Score already-reduced pairs and prioritize. Used by [`analyze`] and by
/// callers replaying cached pair states.
pub fn score_and_prioritize(
    pairs: Vec<ApprovalPairState>,
    enrichment: &EnrichmentMap,
    params: &RiskParams,
    now: DateTime<Utc>,
) -> (Vec<RevocationRecommendation>, WalletSummary) {
    let engine = RiskEngine::new(params.clone());
    let default_bundle = Enrichment::default();
    let scored = pairs
        .into_iter()
        .map(|pair| {
            let bundle = enrichment.get(&pair.key()).unwrap_or(&default_bundle);
            let assessment = engine.assess(&pair, bundle, now);
            (pair, assessment)
        })
        .collect();
    prioritize(scored)
}

/// Resolve enrichment for every pair and token up front, so the scoring
/// stage never awaits anything. Lookups are best-effort by contract.
pub async fn gather_enrichment(
    enricher: &dyn EnrichmentProvider,
    pairs: &[ApprovalPairState],
) -> (EnrichmentMap, BTreeMap<String, TokenMetadata>) {
    let keys: Vec<PairKey> = pairs.iter().map(ApprovalPairState::key).collect();
    let bundles = join_all(keys.iter().map(|key| enricher.enrich_pair(key))).await;
    let enrichment: EnrichmentMap = keys.iter().copied().zip(bundles).collect();

    let tokens: Vec<Address> = pairs
        .iter()
        .map(|pair| pair.token)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let metadata = join_all(tokens.iter().map(|token| enricher.token_metadata(*token))).await;
    let token_map = tokens
        .iter()
        .zip(metadata)
        .map(|(token, meta)| (token_key(*token), meta))
        .collect();

    (enrichment, token_map)
}

/// Run a complete scan: validate the owner, fetch logs, gather enrichment,
/// then run the pure pipeline.
pub async fn scan(
    owner: &str,
    source: &dyn ApprovalLogSource,
    enricher: &dyn EnrichmentProvider,
    options: &ScanOptions,
) -> Result<ScanReport> {
    let owner = parse_address(owner)?;
    if options.from_block > options.to_block {
        return Err(ScanError::InvalidRange {
            from: options.from_block,
            to: options.to_block,
        });
    }

    let raw_logs = source
        .fetch_approval_logs(owner, options.from_block, options.to_block)
        .await?;
    tracing::info!(count = raw_logs.len(), "fetched approval log records");

    let (events, skipped) = normalize_batch(&raw_logs);
    if skipped > 0 {
        tracing::debug!(skipped, "dropped unparseable log records");
    }
    let reduced = reduce_events(owner, &events, &options.reducer_options());
    let pairs: Vec<ApprovalPairState> = reduced.into_values().collect();

    let (enrichment, tokens) = gather_enrichment(enricher, &pairs).await;
    let (recommendations, summary) =
        score_and_prioritize(pairs, &enrichment, &options.risk_params, options.now);

    Ok(ScanReport {
        run_id: Uuid::new_v4(),
        owner,
        chain_id: options.chain_id,
        generated_at: options.now,
        from_block: options.from_block,
        to_block: options.to_block,
        skipped_records: skipped,
        recommendations,
        summary,
        tokens,
    })
}

/// Render a scan report in the specified format.
pub fn render_report(report: &ScanReport, format: output::OutputFormat) -> Result<String> {
    output::render(report, format)
}
