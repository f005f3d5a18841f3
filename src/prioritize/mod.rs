//! Recommendation prioritization — scored approvals into an ordered action
//! list plus wallet-level aggregate statistics.
//!
//! Ordering is fully deterministic: urgency tier first, then priority score
//! descending, then original input position (the sort is stable). Running
//! the prioritizer twice on the same input yields identical output.

use serde::{Deserialize, Serialize};

use crate::risk::{RiskAssessment, RiskFactorKind, RiskLevel};
use crate::state::ApprovalPairState;

/// Action urgency, a total-order image of the risk level. Declaration
/// order doubles as sort order: most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Immediate,
    High,
    Medium,
    Low,
}

impl From<RiskLevel> for Urgency {
    fn from(level: RiskLevel) -> Self {
        match level {
            RiskLevel::Critical => Self::Immediate,
            RiskLevel::High => Self::High,
            RiskLevel::Medium => Self::Medium,
            RiskLevel::Low => Self::Low,
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Immediate => write!(f, "immediate"),
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

/// One actionable entry: the pair, its assessment, and the action verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevocationRecommendation {
    pub pair: ApprovalPairState,
    pub assessment: RiskAssessment,
    pub should_revoke: bool,
    pub urgency: Urgency,
    /// Sort key among revocation candidates; not the user-facing score.
    pub priority_score: u32,
}

/// Wallet-level aggregate, recomputed from the current assessments on
/// every run rather than kept as shared mutable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSummary {
    pub total_pairs: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub revoke_recommended: usize,
    /// Blend of 60% worst single exposure and 40% mean score, so one
    /// critical approval is not diluted by many safe ones.
    pub overall_score: u8,
}

/// Revoke when the level is high or critical, or medium with at least two
/// contributing factors.
pub fn should_revoke(assessment: &RiskAssessment) -> bool {
    match assessment.level {
        RiskLevel::High | RiskLevel::Critical => true,
        RiskLevel::Medium => assessment.factors.len() >= 2,
        RiskLevel::Low => false,
    }
}

fn priority_bonus(kind: RiskFactorKind) -> u32 {
    match kind {
        RiskFactorKind::KnownMalicious => 20,
        RiskFactorKind::UnlimitedAllowance => 10,
        RiskFactorKind::HighValue => 5,
        _ => 0,
    }
}

fn priority_score(assessment: &RiskAssessment) -> u32 {
    let bonuses: u32 = assessment
        .factors
        .iter()
        .map(|f| priority_bonus(f.kind))
        .sum();
    u32::from(assessment.overall_score) + bonuses
}

/// Convert scored approvals into the ordered action list and the wallet
/// summary.
pub fn prioritize(
    scored: Vec<(ApprovalPairState, RiskAssessment)>,
) -> (Vec<RevocationRecommendation>, WalletSummary) {
    let mut recommendations: Vec<RevocationRecommendation> = scored
        .into_iter()
        .map(|(pair, assessment)| {
            let urgency = Urgency::from(assessment.level);
            let should_revoke = should_revoke(&assessment);
            let priority_score = priority_score(&assessment);
            RevocationRecommendation {
                pair,
                assessment,
                should_revoke,
                urgency,
                priority_score,
            }
        })
        .collect();

    // Stable sort: original input position is the implicit tertiary key.
    recommendations.sort_by(|a, b| {
        a.urgency
            .cmp(&b.urgency)
            .then(b.priority_score.cmp(&a.priority_score))
    });

    let summary = summarize(&recommendations);
    (recommendations, summary)
}

/// Aggregate counts and the blended wallet score.
pub fn summarize(recommendations: &[RevocationRecommendation]) -> WalletSummary {
    let mut summary = WalletSummary {
        total_pairs: recommendations.len(),
        critical: 0,
        high: 0,
        medium: 0,
        low: 0,
        revoke_recommended: 0,
        overall_score: 0,
    };

    if recommendations.is_empty() {
        return summary;
    }

    let mut max_score = 0u8;
    let mut score_sum = 0u32;
    for rec in recommendations {
        match rec.assessment.level {
            RiskLevel::Critical => summary.critical += 1,
            RiskLevel::High => summary.high += 1,
            RiskLevel::Medium => summary.medium += 1,
            RiskLevel::Low => summary.low += 1,
        }
        if rec.should_revoke {
            summary.revoke_recommended += 1;
        }
        max_score = max_score.max(rec.assessment.overall_score);
        score_sum += u32::from(rec.assessment.overall_score);
    }

    let mean = f64::from(score_sum) / recommendations.len() as f64;
    let blended = 0.6 * f64::from(max_score) + 0.4 * mean;
    summary.overall_score = blended.round().clamp(0.0, 100.0) as u8;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::{recommendation_text, RiskFactor};
    use chrono::{TimeZone, Utc};
    use ethers::types::{Address, U256};
    use pretty_assertions::assert_eq;

    fn pair(n: u64) -> ApprovalPairState {
        ApprovalPairState {
            token: Address::from_low_u64_be(n),
            spender: Address::from_low_u64_be(n + 100),
            current_allowance: U256::from(100),
            first_seen_at: Utc.timestamp_opt(1_600_000_000, 0).single(),
            last_modified_at: Utc.timestamp_opt(1_600_000_000, 0).single(),
            first_seen_block: 1,
            last_modified_block: 2,
            mutation_count: 1,
            is_unlimited: false,
        }
    }

    fn factor(kind: RiskFactorKind) -> RiskFactor {
        RiskFactor {
            kind,
            raw_score: 1.0,
            weight: 10.0,
            description: "test factor".into(),
        }
    }

    fn assessment(score: u8, level: RiskLevel, kinds: &[RiskFactorKind]) -> RiskAssessment {
        RiskAssessment {
            overall_score: score,
            level,
            factors: kinds.iter().map(|&k| factor(k)).collect(),
            recommendation: recommendation_text(level, kinds.first().copied()),
        }
    }

    #[test]
    fn orders_by_urgency_then_priority() {
        let scored = vec![
            (
                pair(1),
                assessment(45, RiskLevel::Medium, &[RiskFactorKind::UnlimitedAllowance]),
            ),
            (
                pair(2),
                assessment(95, RiskLevel::Critical, &[RiskFactorKind::KnownMalicious]),
            ),
            (
                pair(3),
                assessment(75, RiskLevel::High, &[RiskFactorKind::UnlimitedAllowance]),
            ),
            (
                pair(4),
                assessment(72, RiskLevel::High, &[RiskFactorKind::KnownMalicious]),
            ),
        ];
        let (recs, _) = prioritize(scored);
        let tokens: Vec<Address> = recs.iter().map(|r| r.pair.token).collect();
        // Critical first; within High, 72+20 bonus outranks 75+10.
        assert_eq!(
            tokens,
            vec![
                Address::from_low_u64_be(2),
                Address::from_low_u64_be(4),
                Address::from_low_u64_be(3),
                Address::from_low_u64_be(1),
            ]
        );
    }

    #[test]
    fn ties_keep_original_order() {
        let a = (pair(1), assessment(50, RiskLevel::Medium, &[]));
        let b = (pair(2), assessment(50, RiskLevel::Medium, &[]));
        let (recs, _) = prioritize(vec![a, b]);
        assert_eq!(recs[0].pair.token, Address::from_low_u64_be(1));
        assert_eq!(recs[1].pair.token, Address::from_low_u64_be(2));
    }

    #[test]
    fn prioritizer_is_deterministic() {
        let scored = vec![
            (
                pair(1),
                assessment(95, RiskLevel::Critical, &[RiskFactorKind::KnownMalicious]),
            ),
            (
                pair(2),
                assessment(45, RiskLevel::Medium, &[RiskFactorKind::DormantApproval]),
            ),
        ];
        let first = prioritize(scored.clone());
        let second = prioritize(scored);
        assert_eq!(first, second);
    }

    #[test]
    fn revoke_verdicts_per_level() {
        assert!(should_revoke(&assessment(95, RiskLevel::Critical, &[])));
        assert!(should_revoke(&assessment(75, RiskLevel::High, &[])));
        assert!(should_revoke(&assessment(
            50,
            RiskLevel::Medium,
            &[
                RiskFactorKind::DormantApproval,
                RiskFactorKind::UnverifiedSpender
            ]
        )));
        assert!(!should_revoke(&assessment(
            45,
            RiskLevel::Medium,
            &[RiskFactorKind::UnlimitedAllowance]
        )));
        assert!(!should_revoke(&assessment(10, RiskLevel::Low, &[])));
    }

    #[test]
    fn summary_weights_worst_exposure_over_mean() {
        let scored = vec![
            (pair(1), assessment(90, RiskLevel::Critical, &[])),
            (pair(2), assessment(10, RiskLevel::Low, &[])),
        ];
        let (_, summary) = prioritize(scored);
        // 0.6 * 90 + 0.4 * 50 = 74
        assert_eq!(summary.overall_score, 74);
        assert_eq!(summary.critical, 1);
        assert_eq!(summary.low, 1);
        assert_eq!(summary.revoke_recommended, 1);
    }

    #[test]
    fn empty_input_yields_empty_summary() {
        let (recs, summary) = prioritize(vec![]);
        assert!(recs.is_empty());
        assert_eq!(summary.total_pairs, 0);
        assert_eq!(summary.overall_score, 0);
    }
}
