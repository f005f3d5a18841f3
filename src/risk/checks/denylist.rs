use crate::risk::{CheckInfo, FactorContext, RiskCheck, RiskFactor, RiskFactorKind};

/// Known-malicious check.
///
/// Fires when the spender appears on the engine's configured denylist or
/// when the enrichment collaborator flags it from its own intelligence.
/// Weighted to dominate: a denylisted spender is critical on its own.
pub struct DenylistCheck;

impl RiskCheck for DenylistCheck {
    fn info(&self) -> CheckInfo {
        CheckInfo {
            kind: RiskFactorKind::KnownMalicious,
            name: "Known malicious spender",
            description: "Spender appears on a malicious-address denylist",
        }
    }

    fn evaluate(&self, ctx: &FactorContext<'_>) -> Option<RiskFactor> {
        let listed = ctx.params.denylist.contains(&ctx.state.spender);
        if !listed && !ctx.enrichment.known_malicious {
            return None;
        }
        Some(RiskFactor {
            kind: RiskFactorKind::KnownMalicious,
            raw_score: 1.0,
            weight: ctx.params.weights.known_malicious,
            description: "Spender address appears on a malicious-address denylist".into(),
        })
    }
}
