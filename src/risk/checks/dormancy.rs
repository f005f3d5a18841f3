use crate::risk::{CheckInfo, FactorContext, RiskCheck, RiskFactor, RiskFactorKind};

/// Dormancy check.
///
/// Graduated thresholds at 30/90/180/365 days. The reference point is the
/// last observed spend when usage data exists, otherwise the last allowance
/// mutation, otherwise first sight of the pair. Contribution is monotone in
/// elapsed time: longer dormancy never scores lower.
pub struct DormancyCheck;

/// (minimum days, raw score) tiers, longest first.
const TIERS: [(i64, f64); 4] = [(365, 1.0), (180, 0.75), (90, 0.5), (30, 0.25)];

impl RiskCheck for DormancyCheck {
    fn info(&self) -> CheckInfo {
        CheckInfo {
            kind: RiskFactorKind::DormantApproval,
            name: "Dormant approval",
            description: "No associated activity for 30+ days",
        }
    }

    fn evaluate(&self, ctx: &FactorContext<'_>) -> Option<RiskFactor> {
        let reference = ctx
            .enrichment
            .last_used_at
            .or(ctx.state.last_modified_at)
            .or(ctx.state.first_seen_at)?;
        let days = (ctx.now - reference).num_days();
        let raw_score = TIERS
            .iter()
            .find(|(min_days, _)| days >= *min_days)
            .map(|(_, raw)| *raw)?;

        Some(RiskFactor {
            kind: RiskFactorKind::DormantApproval,
            raw_score,
            weight: ctx.params.weights.dormant_approval,
            description: format!("No activity associated with this approval for {days} days"),
        })
    }
}
