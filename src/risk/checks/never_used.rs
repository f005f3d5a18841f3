use crate::risk::{CheckInfo, FactorContext, RiskCheck, RiskFactor, RiskFactorKind};

/// Never-used check.
///
/// Fires only when usage data exists and shows no spend ever went through
/// the approval. Absence of usage data (`None`) is not the same signal and
/// stays silent. Weighted above plain dormancy: an approval nobody ever
/// used has no reason to exist.
pub struct NeverUsedCheck;

impl RiskCheck for NeverUsedCheck {
    fn info(&self) -> CheckInfo {
        CheckInfo {
            kind: RiskFactorKind::NeverUsed,
            name: "Never used",
            description: "Usage data shows no spend has ever occurred",
        }
    }

    fn evaluate(&self, ctx: &FactorContext<'_>) -> Option<RiskFactor> {
        if ctx.enrichment.never_used != Some(true) {
            return None;
        }
        Some(RiskFactor {
            kind: RiskFactorKind::NeverUsed,
            raw_score: 1.0,
            weight: ctx.params.weights.never_used,
            description: "No spend has ever been observed through this approval".into(),
        })
    }
}
