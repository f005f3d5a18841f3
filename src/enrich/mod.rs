//! Token and spender enrichment — best-effort lookups with deterministic
//! placeholders.
//!
//! Enrichment never fails: a provider that cannot answer returns placeholder
//! metadata or an all-unknown bundle. The scoring engine treats "unknown" as
//! its own signal, never as an error. All enrichment is gathered before the
//! pure pipeline runs; nothing here is called from inside the scorer.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers::contract::abigen;
use ethers::providers::{Http, Provider};
use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::state::PairKey;

abigen!(
    Erc20Metadata,
    r#"[
        function name() external view returns (string)
        function symbol() external view returns (string)
        function decimals() external view returns (uint8)
    ]"#
);

pub const PLACEHOLDER_NAME: &str = "Unknown Token";
pub const PLACEHOLDER_SYMBOL: &str = "UNKNOWN";
pub const PLACEHOLDER_DECIMALS: u8 = 18;

/// Display metadata for a token contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub verified: bool,
}

impl TokenMetadata {
    /// The deterministic fallback used whenever a lookup fails.
    pub fn placeholder() -> Self {
        Self {
            name: PLACEHOLDER_NAME.into(),
            symbol: PLACEHOLDER_SYMBOL.into(),
            decimals: PLACEHOLDER_DECIMALS,
            verified: false,
        }
    }
}

impl Default for TokenMetadata {
    fn default() -> Self {
        Self::placeholder()
    }
}

/// Per-pair enrichment signals, all optional with documented defaults.
///
/// This is a closed, versioned struct rather than an open property bag:
/// adding a signal means adding a field here. `Default` is the all-unknown
/// bundle, which scores conservatively (unknown spender counts as
/// unverified).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    /// `Some(true)` when the spender contract is source-verified or on the
    /// configured trusted registry; `None` means unknown.
    pub spender_verified: Option<bool>,
    /// Approximate USD value reachable through this allowance.
    pub usd_value: Option<f64>,
    /// Spender appears on a malicious-address list known to the provider.
    pub known_malicious: bool,
    /// Last observed spend through this allowance.
    pub last_used_at: Option<DateTime<Utc>>,
    /// `Some(true)` when usage data exists and shows no spend ever occurred.
    /// `None` when no usage data is available at all.
    pub never_used: Option<bool>,
}

/// Best-effort enrichment collaborator. Implementations must be total:
/// failures degrade to placeholders, they never propagate.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    async fn token_metadata(&self, token: Address) -> TokenMetadata;
    async fn enrich_pair(&self, key: &PairKey) -> Enrichment;
}

/// Enrichment backed by an RPC endpoint plus configured registries.
///
/// Token metadata comes from `name()`/`symbol()`/`decimals()` calls; spender
/// trust comes from the immutable trusted/denylist sets loaded from config.
pub struct RpcEnrichment {
    provider: Arc<Provider<Http>>,
    trusted_spenders: HashSet<Address>,
    denylist: HashSet<Address>,
}

impl RpcEnrichment {
    pub fn new(
        provider: Arc<Provider<Http>>,
        trusted_spenders: HashSet<Address>,
        denylist: HashSet<Address>,
    ) -> Self {
        Self {
            provider,
            trusted_spenders,
            denylist,
        }
    }
}

#[async_trait]
impl EnrichmentProvider for RpcEnrichment {
    async fn token_metadata(&self, token: Address) -> TokenMetadata {
        let contract = Erc20Metadata::new(token, self.provider.clone());
        let name = match contract.name().call().await {
            Ok(name) => name,
            Err(e) => {
                tracing::debug!(token = ?token, "name() call failed: {e}");
                PLACEHOLDER_NAME.into()
            }
        };
        let symbol = match contract.symbol().call().await {
            Ok(symbol) => symbol,
            Err(e) => {
                tracing::debug!(token = ?token, "symbol() call failed: {e}");
                PLACEHOLDER_SYMBOL.into()
            }
        };
        let decimals = match contract.decimals().call().await {
            Ok(decimals) => decimals,
            Err(e) => {
                tracing::debug!(token = ?token, "decimals() call failed: {e}");
                PLACEHOLDER_DECIMALS
            }
        };
        TokenMetadata {
            name,
            symbol,
            decimals,
            verified: false,
        }
    }

    async fn enrich_pair(&self, key: &PairKey) -> Enrichment {
        let spender_verified = if self.trusted_spenders.contains(&key.spender) {
            Some(true)
        } else {
            None
        };
        Enrichment {
            spender_verified,
            known_malicious: self.denylist.contains(&key.spender),
            ..Default::default()
        }
    }
}

/// In-memory enrichment for tests and offline runs. Missing entries fall
/// back to placeholders, same as any other provider.
#[derive(Debug, Clone, Default)]
pub struct StaticEnrichment {
    pub tokens: HashMap<Address, TokenMetadata>,
    pub pairs: HashMap<PairKey, Enrichment>,
}

#[async_trait]
impl EnrichmentProvider for StaticEnrichment {
    async fn token_metadata(&self, token: Address) -> TokenMetadata {
        self.tokens.get(&token).cloned().unwrap_or_default()
    }

    async fn enrich_pair(&self, key: &PairKey) -> Enrichment {
        self.pairs.get(key).cloned().unwrap_or_default()
    }
}
