use crate::risk::{CheckInfo, FactorContext, RiskCheck, RiskFactor, RiskFactorKind};

/// Unlimited-allowance check.
///
/// The dominant single factor: an effectively infinite allowance exposes
/// the owner's entire balance, present and future, to the spender. Fires
/// off the reducer's `is_unlimited` flag so that state and score can never
/// disagree on the threshold.
pub struct UnlimitedAllowanceCheck;

impl RiskCheck for UnlimitedAllowanceCheck {
    fn info(&self) -> CheckInfo {
        CheckInfo {
            kind: RiskFactorKind::UnlimitedAllowance,
            name: "Unlimited allowance",
            description: "Allowance at or above the unlimited threshold",
        }
    }

    fn evaluate(&self, ctx: &FactorContext<'_>) -> Option<RiskFactor> {
        if !ctx.state.is_unlimited {
            return None;
        }
        Some(RiskFactor {
            kind: RiskFactorKind::UnlimitedAllowance,
            raw_score: 1.0,
            weight: ctx.params.weights.unlimited_allowance,
            description: "Allowance is effectively unlimited; the spender can move the \
                          entire balance"
                .into(),
        })
    }
}
