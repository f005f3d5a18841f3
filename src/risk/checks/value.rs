use crate::risk::{CheckInfo, FactorContext, RiskCheck, RiskFactor, RiskFactorKind};

/// High-value check.
///
/// Stands down when the unlimited check already fired: both factors
/// describe the same underlying exposure, and it must not be counted
/// twice. Malformed USD input (negative, NaN, infinite) is ignored.
pub struct HighValueCheck;

impl RiskCheck for HighValueCheck {
    fn info(&self) -> CheckInfo {
        CheckInfo {
            kind: RiskFactorKind::HighValue,
            name: "High value at risk",
            description: "Approved USD value exceeds the configured threshold",
        }
    }

    fn evaluate(&self, ctx: &FactorContext<'_>) -> Option<RiskFactor> {
        if ctx.has_triggered(RiskFactorKind::UnlimitedAllowance) {
            return None;
        }
        let threshold = ctx.params.high_value_usd;
        if !(threshold > 0.0) {
            return None;
        }
        let usd = ctx.enrichment.usd_value?;
        if !usd.is_finite() || usd < threshold {
            return None;
        }
        // 0.5 at the threshold, 1.0 from ten times the threshold upward.
        let raw_score = (usd / (threshold * 10.0)).clamp(0.5, 1.0);

        Some(RiskFactor {
            kind: RiskFactorKind::HighValue,
            raw_score,
            weight: ctx.params.weights.high_value,
            description: format!("Approved value at risk is about ${usd:.0}"),
        })
    }
}
