use crate::risk::{CheckInfo, FactorContext, RiskCheck, RiskFactor, RiskFactorKind};

/// Unverified-spender check.
///
/// Unknown verification status counts as unverified: an enrichment
/// collaborator that could not answer yields the same caution as a
/// confirmed-unverified contract, just with a distinct description.
pub struct UnverifiedSpenderCheck;

impl RiskCheck for UnverifiedSpenderCheck {
    fn info(&self) -> CheckInfo {
        CheckInfo {
            kind: RiskFactorKind::UnverifiedSpender,
            name: "Unverified spender",
            description: "Spender contract is unverified or unknown",
        }
    }

    fn evaluate(&self, ctx: &FactorContext<'_>) -> Option<RiskFactor> {
        let description = match ctx.enrichment.spender_verified {
            Some(true) => return None,
            Some(false) => "Spender contract is not source-verified",
            None => "Spender verification status is unknown",
        };
        Some(RiskFactor {
            kind: RiskFactorKind::UnverifiedSpender,
            raw_score: 1.0,
            weight: ctx.params.weights.unverified_spender,
            description: description.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::Enrichment;
    use crate::risk::RiskParams;
    use crate::state::ApprovalPairState;
    use chrono::{TimeZone, Utc};
    use ethers::types::{Address, U256};

    fn evaluate(verified: Option<bool>) -> Option<RiskFactor> {
        let s = ApprovalPairState {
            token: Address::from_low_u64_be(1),
            spender: Address::from_low_u64_be(2),
            current_allowance: U256::from(100),
            first_seen_at: None,
            last_modified_at: None,
            first_seen_block: 1,
            last_modified_block: 1,
            mutation_count: 1,
            is_unlimited: false,
        };
        let e = Enrichment {
            spender_verified: verified,
            ..Default::default()
        };
        let params = RiskParams::new();
        let ctx = FactorContext {
            state: &s,
            enrichment: &e,
            now: Utc.timestamp_opt(0, 0).single().unwrap(),
            params: &params,
            triggered: &[],
        };
        UnverifiedSpenderCheck.evaluate(&ctx)
    }

    #[test]
    fn verified_spender_is_silent() {
        assert!(evaluate(Some(true)).is_none());
    }

    #[test]
    fn unverified_and_unknown_both_fire() {
        let confirmed = evaluate(Some(false)).unwrap();
        let unknown = evaluate(None).unwrap();
        assert_eq!(confirmed.kind, RiskFactorKind::UnverifiedSpender);
        assert_eq!(confirmed.raw_score, unknown.raw_score);
        assert_ne!(confirmed.description, unknown.description);
    }
}
