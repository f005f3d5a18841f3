//! Risk scoring engine.
//!
//! Converts one reduced approval state plus its enrichment bundle into a
//! deterministic, explainable assessment. Every factor carries a raw score
//! on a single 0.0–1.0 scale and a point weight; the overall score is the
//! **weighted sum** of `raw * weight`, clamped to [0, 100]. The default
//! table is arranged so that no combination of minor factors reaches
//! Critical on its own: only an unlimited allowance combined with another
//! factor, or a denylisted spender by itself, can.

pub mod checks;

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use ethers::types::Address;
use serde::{Deserialize, Serialize};

use crate::enrich::Enrichment;
use crate::state::ApprovalPairState;

/// Closed set of signals that can contribute to a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactorKind {
    UnlimitedAllowance,
    DormantApproval,
    NeverUsed,
    UnverifiedSpender,
    HighValue,
    KnownMalicious,
    /// Short-circuit marker for fully revoked pairs scored in audit mode.
    ZeroApproval,
}

impl std::fmt::Display for RiskFactorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnlimitedAllowance => write!(f, "unlimited_allowance"),
            Self::DormantApproval => write!(f, "dormant_approval"),
            Self::NeverUsed => write!(f, "never_used"),
            Self::UnverifiedSpender => write!(f, "unverified_spender"),
            Self::HighValue => write!(f, "high_value"),
            Self::KnownMalicious => write!(f, "known_malicious"),
            Self::ZeroApproval => write!(f, "zero_approval"),
        }
    }
}

/// One contributing signal. `raw_score` is factor-local on 0.0–1.0;
/// `weight` is the point multiplier from the engine's table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub kind: RiskFactorKind,
    pub raw_score: f64,
    pub weight: f64,
    /// Human-readable explanation; every score must be auditable.
    pub description: String,
}

impl RiskFactor {
    pub fn contribution(&self) -> f64 {
        self.raw_score * self.weight
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Scoring output for one approval pair. Factors are in evaluation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall_score: u8,
    pub level: RiskLevel,
    pub factors: Vec<RiskFactor>,
    pub recommendation: String,
}

/// Point weights per factor kind. Immutable once the engine is built;
/// overrides come in through the constructor, never by patching globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub unlimited_allowance: f64,
    pub unverified_spender: f64,
    pub high_value: f64,
    pub dormant_approval: f64,
    pub never_used: f64,
    pub known_malicious: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            unlimited_allowance: 45.0,
            unverified_spender: 25.0,
            high_value: 25.0,
            dormant_approval: 15.0,
            never_used: 20.0,
            known_malicious: 95.0,
        }
    }
}

/// Score-to-level cutoffs. One shared table; call sites never duplicate it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelCutoffs {
    pub critical: u8,
    pub high: u8,
    pub medium: u8,
}

impl Default for LevelCutoffs {
    fn default() -> Self {
        Self {
            critical: 90,
            high: 70,
            medium: 40,
        }
    }
}

impl LevelCutoffs {
    pub fn level_for(&self, score: u8) -> RiskLevel {
        if score >= self.critical {
            RiskLevel::Critical
        } else if score >= self.high {
            RiskLevel::High
        } else if score >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Complete scoring policy, passed explicitly into the engine.
#[derive(Debug, Clone)]
pub struct RiskParams {
    pub weights: RiskWeights,
    pub cutoffs: LevelCutoffs,
    /// USD value at which the high-value factor starts firing.
    pub high_value_usd: f64,
    /// Spender addresses treated as known malicious.
    pub denylist: HashSet<Address>,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            cutoffs: LevelCutoffs::default(),
            high_value_usd: default_high_value_usd(),
            denylist: HashSet::new(),
        }
    }
}

impl RiskParams {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn default_high_value_usd() -> f64 {
    1_000.0
}

/// Everything a check may consult. `triggered` holds the factors fired by
/// earlier checks in this evaluation, enabling ordering-dependent policy
/// (the value check stands down when the unlimited check already fired).
pub struct FactorContext<'a> {
    pub state: &'a ApprovalPairState,
    pub enrichment: &'a Enrichment,
    pub now: DateTime<Utc>,
    pub params: &'a RiskParams,
    pub triggered: &'a [RiskFactor],
}

impl FactorContext<'_> {
    pub fn has_triggered(&self, kind: RiskFactorKind) -> bool {
        self.triggered.iter().any(|f| f.kind == kind)
    }
}

/// Static description of a registered check, for `list-checks` output.
#[derive(Debug, Clone, Serialize)]
pub struct CheckInfo {
    pub kind: RiskFactorKind,
    pub name: &'static str,
    pub description: &'static str,
}

/// A risk check evaluates one signal against a pair state.
pub trait RiskCheck: Send + Sync {
    fn info(&self) -> CheckInfo;

    /// `None` when the signal does not apply. Must be total: malformed
    /// enrichment values are ignored, never propagated.
    fn evaluate(&self, ctx: &FactorContext<'_>) -> Option<RiskFactor>;
}

/// The scoring engine: a fixed-order check registry plus immutable policy.
pub struct RiskEngine {
    params: RiskParams,
    checks: Vec<Box<dyn RiskCheck>>,
}

impl RiskEngine {
    pub fn new(params: RiskParams) -> Self {
        Self {
            params,
            checks: checks::all_checks(),
        }
    }

    pub fn params(&self) -> &RiskParams {
        &self.params
    }

    pub fn list_checks(&self) -> Vec<CheckInfo> {
        self.checks.iter().map(|c| c.info()).collect()
    }

    /// Score one pair. Total over its domain: every valid state yields an
    /// assessment, including zero-allowance pairs scored in audit mode.
    pub fn assess(
        &self,
        state: &ApprovalPairState,
        enrichment: &Enrichment,
        now: DateTime<Utc>,
    ) -> RiskAssessment {
        if state.current_allowance.is_zero() {
            return RiskAssessment {
                overall_score: 0,
                level: RiskLevel::Low,
                factors: vec![RiskFactor {
                    kind: RiskFactorKind::ZeroApproval,
                    raw_score: 0.0,
                    weight: 0.0,
                    description: "Allowance is fully revoked".into(),
                }],
                recommendation: recommendation_text(
                    RiskLevel::Low,
                    Some(RiskFactorKind::ZeroApproval),
                ),
            };
        }

        let mut factors: Vec<RiskFactor> = Vec::new();
        for check in &self.checks {
            let ctx = FactorContext {
                state,
                enrichment,
                now,
                params: &self.params,
                triggered: &factors,
            };
            if let Some(factor) = check.evaluate(&ctx) {
                factors.push(factor);
            }
        }

        let total: f64 = factors.iter().map(RiskFactor::contribution).sum();
        let overall_score = total.clamp(0.0, 100.0).round() as u8;
        let level = self.params.cutoffs.level_for(overall_score);
        let dominant = factors
            .iter()
            .max_by(|a, b| {
                a.contribution()
                    .partial_cmp(&b.contribution())
                    .unwrap_or(Ordering::Equal)
            })
            .map(|f| f.kind);

        RiskAssessment {
            overall_score,
            level,
            factors,
            recommendation: recommendation_text(level, dominant),
        }
    }
}

/// Deterministic recommendation text from level and dominant factor.
pub fn recommendation_text(level: RiskLevel, dominant: Option<RiskFactorKind>) -> String {
    match (level, dominant) {
        (_, Some(RiskFactorKind::ZeroApproval)) => {
            "No action needed: the allowance is already revoked.".into()
        }
        (RiskLevel::Critical, Some(RiskFactorKind::KnownMalicious)) => {
            "Revoke immediately: the spender is a known malicious address.".into()
        }
        (RiskLevel::Critical, _) => {
            "Revoke immediately: this approval carries critical risk.".into()
        }
        (RiskLevel::High, Some(RiskFactorKind::UnlimitedAllowance)) => {
            "Revoke soon: an unlimited allowance is exposed to this spender.".into()
        }
        (RiskLevel::High, _) => "Revoke soon: this approval carries high risk.".into(),
        (RiskLevel::Medium, _) => {
            "Review this approval and revoke it if the spender is no longer needed.".into()
        }
        (RiskLevel::Low, _) => {
            "No urgent action needed; revoke opportunistically if unused.".into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use ethers::types::U256;
    use pretty_assertions::assert_eq;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).single().unwrap()
    }

    fn state(allowance: U256) -> ApprovalPairState {
        ApprovalPairState {
            token: addr(0xA0),
            spender: addr(0xB0),
            current_allowance: allowance,
            first_seen_at: Some(now() - Duration::days(1)),
            last_modified_at: Some(now() - Duration::days(1)),
            first_seen_block: 10,
            last_modified_block: 20,
            mutation_count: 1,
            is_unlimited: allowance >= crate::state::unlimited_threshold(90),
        }
    }

    fn verified() -> Enrichment {
        Enrichment {
            spender_verified: Some(true),
            ..Default::default()
        }
    }

    fn engine() -> RiskEngine {
        RiskEngine::new(RiskParams::new())
    }

    #[test]
    fn zero_allowance_short_circuits() {
        let a = engine().assess(&state(U256::zero()), &Enrichment::default(), now());
        assert_eq!(a.overall_score, 0);
        assert_eq!(a.level, RiskLevel::Low);
        assert_eq!(a.factors.len(), 1);
        assert_eq!(a.factors[0].kind, RiskFactorKind::ZeroApproval);
    }

    #[test]
    fn unlimited_alone_reaches_medium() {
        let a = engine().assess(&state(U256::MAX), &verified(), now());
        assert!(a
            .factors
            .iter()
            .any(|f| f.kind == RiskFactorKind::UnlimitedAllowance));
        assert_eq!(a.level, RiskLevel::Medium);
    }

    #[test]
    fn unlimited_with_unknown_spender_reaches_high() {
        let a = engine().assess(&state(U256::MAX), &Enrichment::default(), now());
        assert_eq!(a.overall_score, 70);
        assert_eq!(a.level, RiskLevel::High);
    }

    #[test]
    fn dormancy_is_monotonic() {
        let eng = engine();
        let mut older = state(U256::from(100));
        older.last_modified_at = Some(now() - Duration::days(400));
        let mut newer = state(U256::from(100));
        newer.last_modified_at = Some(now() - Duration::days(40));

        let older_score = eng.assess(&older, &verified(), now()).overall_score;
        let newer_score = eng.assess(&newer, &verified(), now()).overall_score;
        assert!(older_score >= newer_score);
    }

    #[test]
    fn dormancy_alone_stays_out_of_high() {
        let mut s = state(U256::from(1));
        s.last_modified_at = Some(now() - Duration::days(400));
        let a = engine().assess(&s, &verified(), now());
        assert_eq!(a.factors.len(), 1);
        assert_eq!(a.factors[0].kind, RiskFactorKind::DormantApproval);
        assert!(a.level <= RiskLevel::Medium);
    }

    #[test]
    fn denylisted_spender_alone_is_critical() {
        let mut params = RiskParams::new();
        params.denylist.insert(addr(0xB0));
        let a = RiskEngine::new(params).assess(&state(U256::from(100)), &verified(), now());
        assert!(a
            .factors
            .iter()
            .any(|f| f.kind == RiskFactorKind::KnownMalicious));
        assert_eq!(a.level, RiskLevel::Critical);
    }

    #[test]
    fn high_value_skipped_when_unlimited_fired() {
        let enrichment = Enrichment {
            spender_verified: Some(true),
            usd_value: Some(1_000_000.0),
            ..Default::default()
        };
        let a = engine().assess(&state(U256::MAX), &enrichment, now());
        assert!(!a.factors.iter().any(|f| f.kind == RiskFactorKind::HighValue));
    }

    #[test]
    fn malformed_usd_values_are_ignored() {
        let eng = engine();
        for usd in [-5.0, f64::NAN, f64::INFINITY] {
            let enrichment = Enrichment {
                spender_verified: Some(true),
                usd_value: Some(usd),
                ..Default::default()
            };
            let a = eng.assess(&state(U256::from(100)), &enrichment, now());
            assert!(
                !a.factors.iter().any(|f| f.kind == RiskFactorKind::HighValue),
                "usd {usd} should not fire high_value"
            );
        }
    }

    #[test]
    fn minor_factors_cannot_reach_critical() {
        // Worst case without unlimited or malicious: unknown spender,
        // high value, never used, maximally dormant.
        let mut s = state(U256::from(100));
        s.last_modified_at = Some(now() - Duration::days(1_000));
        let enrichment = Enrichment {
            spender_verified: Some(false),
            usd_value: Some(1_000_000.0),
            never_used: Some(true),
            ..Default::default()
        };
        let a = engine().assess(&s, &enrichment, now());
        assert!(a.overall_score < 90, "got {}", a.overall_score);
        assert!(a.level < RiskLevel::Critical);
    }

    #[test]
    fn unlimited_plus_others_can_reach_critical() {
        let mut s = state(U256::MAX);
        s.last_modified_at = Some(now() - Duration::days(400));
        let enrichment = Enrichment {
            spender_verified: None,
            never_used: Some(true),
            ..Default::default()
        };
        let a = engine().assess(&s, &enrichment, now());
        assert_eq!(a.level, RiskLevel::Critical);
    }

    #[test]
    fn scoring_is_idempotent() {
        let eng = engine();
        let s = state(U256::MAX);
        let e = Enrichment::default();
        let first = eng.assess(&s, &e, now());
        let second = eng.assess(&s, &e, now());
        assert_eq!(first, second);
    }

    #[test]
    fn level_cutoff_boundaries() {
        let cutoffs = LevelCutoffs::default();
        assert_eq!(cutoffs.level_for(90), RiskLevel::Critical);
        assert_eq!(cutoffs.level_for(89), RiskLevel::High);
        assert_eq!(cutoffs.level_for(70), RiskLevel::High);
        assert_eq!(cutoffs.level_for(69), RiskLevel::Medium);
        assert_eq!(cutoffs.level_for(40), RiskLevel::Medium);
        assert_eq!(cutoffs.level_for(39), RiskLevel::Low);
        assert_eq!(cutoffs.level_for(0), RiskLevel::Low);
    }

    #[test]
    fn factors_preserve_evaluation_order() {
        let mut s = state(U256::MAX);
        s.last_modified_at = Some(now() - Duration::days(400));
        let a = engine().assess(&s, &Enrichment::default(), now());
        let kinds: Vec<RiskFactorKind> = a.factors.iter().map(|f| f.kind).collect();
        assert_eq!(
            kinds,
            vec![
                RiskFactorKind::UnlimitedAllowance,
                RiskFactorKind::DormantApproval,
                RiskFactorKind::UnverifiedSpender,
            ]
        );
    }

    #[test]
    fn custom_weights_flow_through_constructor() {
        let params = RiskParams {
            weights: RiskWeights {
                unlimited_allowance: 10.0,
                ..Default::default()
            },
            ..RiskParams::new()
        };
        let a = RiskEngine::new(params).assess(&state(U256::MAX), &verified(), now());
        assert_eq!(a.overall_score, 10);
        assert_eq!(a.level, RiskLevel::Low);
    }
}
