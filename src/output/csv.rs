use crate::enrich::TokenMetadata;
use crate::{token_key, ScanReport};

use super::display_allowance;

const HEADER: &str =
    "token,symbol,spender,allowance,unlimited,score,level,urgency,should_revoke,priority,factors";

/// Render one CSV row per recommendation, in priority order.
pub fn render(report: &ScanReport) -> String {
    let mut output = String::from(HEADER);
    output.push('\n');

    let placeholder = TokenMetadata::placeholder();
    for rec in &report.recommendations {
        let meta = report
            .tokens
            .get(&token_key(rec.pair.token))
            .unwrap_or(&placeholder);
        let factors = rec
            .assessment
            .factors
            .iter()
            .map(|f| f.kind.to_string())
            .collect::<Vec<_>>()
            .join("|");

        let row = [
            format!("{:#x}", rec.pair.token),
            escape(&meta.symbol),
            format!("{:#x}", rec.pair.spender),
            display_allowance(&rec.pair, meta.decimals),
            rec.pair.is_unlimited.to_string(),
            rec.assessment.overall_score.to_string(),
            rec.assessment.level.to_string(),
            rec.urgency.to_string(),
            rec.should_revoke.to_string(),
            rec.priority_score.to_string(),
            factors,
        ];
        output.push_str(&row.join(","));
        output.push('\n');
    }
    output
}

/// Quote a field when it contains CSV-significant characters.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
