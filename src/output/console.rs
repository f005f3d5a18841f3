use crate::enrich::TokenMetadata;
use crate::prioritize::Urgency;
use crate::{token_key, ScanReport};

use super::display_allowance;

/// Render a report as plain console text, most urgent first (the
/// prioritizer already ordered the recommendations).
pub fn render(report: &ScanReport) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "\n  Approval scan for {:#x} (chain {})\n",
        report.owner, report.chain_id
    ));
    output.push_str(&format!(
        "  Blocks {}..={}, generated {}\n\n",
        report.from_block,
        report.to_block,
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    if report.recommendations.is_empty() {
        output.push_str("  No outstanding approvals found.\n\n");
        return output;
    }

    for rec in &report.recommendations {
        let urgency_tag = match rec.urgency {
            Urgency::Immediate => "[IMMEDIATE]",
            Urgency::High => "[HIGH]     ",
            Urgency::Medium => "[MEDIUM]   ",
            Urgency::Low => "[LOW]      ",
        };
        let placeholder = TokenMetadata::placeholder();
        let meta = report
            .tokens
            .get(&token_key(rec.pair.token))
            .unwrap_or(&placeholder);

        output.push_str(&format!(
            "  {} {} ({:#x})\n",
            urgency_tag, meta.symbol, rec.pair.token
        ));
        output.push_str(&format!("              spender   {:#x}\n", rec.pair.spender));
        output.push_str(&format!(
            "              allowance {} | score {} ({}){}\n",
            display_allowance(&rec.pair, meta.decimals),
            rec.assessment.overall_score,
            rec.assessment.level,
            if rec.should_revoke { " | revoke" } else { "" },
        ));
        for factor in &rec.assessment.factors {
            output.push_str(&format!(
                "              - {}: {}\n",
                factor.kind, factor.description
            ));
        }
        output.push_str(&format!(
            "              action: {}\n\n",
            rec.assessment.recommendation
        ));
    }

    output.push_str(&format!(
        "  Summary: {} approval(s), {} revocation(s) recommended\n",
        report.summary.total_pairs, report.summary.revoke_recommended
    ));
    output.push_str(&format!(
        "  Levels:  {} critical, {} high, {} medium, {} low\n",
        report.summary.critical, report.summary.high, report.summary.medium, report.summary.low
    ));
    output.push_str(&format!(
        "  Wallet risk score: {}/100\n\n",
        report.summary.overall_score
    ));

    output
}
