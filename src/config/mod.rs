//! Configuration from `revoscan.toml`.
//!
//! All policy constants live here and are turned into immutable parameter
//! structs at load time; nothing in the pipeline reads configuration
//! globals.

use std::collections::HashSet;
use std::path::Path;

use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::event::parse_address;
use crate::risk::{default_high_value_usd, LevelCutoffs, RiskParams, RiskWeights};
use crate::state::{unlimited_threshold, ReducerOptions};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rpc: RpcConfig,
    pub scan: ScanConfig,
    pub scoring: ScoringConfig,
    pub registry: RegistryConfig,
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub url: String,
    pub chain_id: u64,
    /// Blocks per `eth_getLogs` request.
    pub chunk_size: u64,
    pub max_retries: u32,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8545".into(),
            chain_id: 1,
            chunk_size: 10_000,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Percent of the maximum 256-bit value at which an allowance counts
    /// as unlimited. Clamped to 50–99 at use sites.
    pub unlimited_percent: u8,
    pub include_zero_allowances: bool,
    pub from_block: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            unlimited_percent: 90,
            include_zero_allowances: false,
            from_block: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: RiskWeights,
    pub levels: LevelCutoffs,
    pub high_value_usd: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            levels: LevelCutoffs::default(),
            high_value_usd: default_high_value_usd(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Spenders treated as verified without an external lookup.
    pub trusted_spenders: Vec<String>,
    /// Spenders treated as known malicious.
    pub denylist: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub path: String,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: ".revoscan-cache.json".into(),
            ttl_seconds: 3_600,
        }
    }
}

impl Config {
    /// Load config from a TOML file. Returns default if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Scoring policy with the registry resolved to typed addresses.
    /// Malformed registry entries fail fast rather than being coerced.
    pub fn risk_params(&self) -> Result<RiskParams> {
        let denylist = parse_address_set(&self.registry.denylist)?;
        Ok(RiskParams {
            weights: self.scoring.weights.clone(),
            cutoffs: self.scoring.levels,
            high_value_usd: self.scoring.high_value_usd,
            denylist,
        })
    }

    pub fn trusted_spenders(&self) -> Result<HashSet<Address>> {
        parse_address_set(&self.registry.trusted_spenders)
    }

    pub fn reducer_options(&self) -> ReducerOptions {
        ReducerOptions {
            include_zero_allowances: self.scan.include_zero_allowances,
            unlimited_threshold: unlimited_threshold(self.scan.unlimited_percent),
        }
    }

    /// Generate a starter config file.
    pub fn starter_toml() -> &'static str {
        r#"# revoscan configuration

[rpc]
url = "http://127.0.0.1:8545"
chain_id = 1
# Blocks per eth_getLogs request.
chunk_size = 10000
max_retries = 3

[scan]
# Percent of the max uint256 value at which an allowance counts as unlimited.
unlimited_percent = 90
include_zero_allowances = false
from_block = 0

[scoring]
high_value_usd = 1000.0

# [scoring.weights]
# unlimited_allowance = 45.0
# unverified_spender = 25.0
# high_value = 25.0
# dormant_approval = 15.0
# never_used = 20.0
# known_malicious = 95.0

# [scoring.levels]
# critical = 90
# high = 70
# medium = 40

[registry]
# Spenders treated as verified without an external lookup.
trusted_spenders = []
# Spenders treated as known malicious.
denylist = []

[cache]
enabled = true
path = ".revoscan-cache.json"
ttl_seconds = 3600
"#
    }
}

fn parse_address_set(entries: &[String]) -> Result<HashSet<Address>> {
    entries.iter().map(|s| parse_address(s)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/revoscan.toml")).unwrap();
        assert_eq!(config.rpc.chain_id, 1);
        assert_eq!(config.scan.unlimited_percent, 90);
        assert!(config.cache.enabled);
    }

    #[test]
    fn starter_toml_parses_back() {
        let config: Config = toml::from_str(Config::starter_toml()).unwrap();
        assert_eq!(config.rpc.chunk_size, 10_000);
        assert_eq!(config.scoring.high_value_usd, 1_000.0);
    }

    #[test]
    fn partial_file_keeps_section_defaults() {
        let config: Config = toml::from_str(
            r#"
            [rpc]
            chain_id = 137

            [scoring.weights]
            unlimited_allowance = 50.0
            "#,
        )
        .unwrap();
        assert_eq!(config.rpc.chain_id, 137);
        // untouched fields fall back per section
        assert_eq!(config.rpc.chunk_size, 10_000);
        assert_eq!(config.scoring.weights.unlimited_allowance, 50.0);
        assert_eq!(config.scoring.weights.known_malicious, 95.0);
    }

    #[test]
    fn registry_addresses_resolve_to_typed_sets() {
        let config: Config = toml::from_str(
            r#"
            [registry]
            denylist = ["0x000000000000000000000000000000000000bAd1"]
            trusted_spenders = ["0x0000000000000000000000000000000000007bb1"]
            "#,
        )
        .unwrap();
        let params = config.risk_params().unwrap();
        assert_eq!(params.denylist.len(), 1);
        assert_eq!(config.trusted_spenders().unwrap().len(), 1);
    }

    #[test]
    fn malformed_registry_address_fails_fast() {
        let config: Config = toml::from_str(
            r#"
            [registry]
            denylist = ["bogus"]
            "#,
        )
        .unwrap();
        assert!(config.risk_params().is_err());
    }

    #[test]
    fn reducer_options_follow_scan_section() {
        let config: Config = toml::from_str(
            r#"
            [scan]
            include_zero_allowances = true
            unlimited_percent = 50
            "#,
        )
        .unwrap();
        let opts = config.reducer_options();
        assert!(opts.include_zero_allowances);
        assert_eq!(opts.unlimited_threshold, unlimited_threshold(50));
    }
}
