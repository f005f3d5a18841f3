//! Report rendering. The pipeline emits plain data; everything
//! presentation-related lives here.

pub mod console;
pub mod csv;
pub mod json;

use ethers::types::U256;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::state::ApprovalPairState;
use crate::ScanReport;

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Console,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "console" | "text" => Some(Self::Console),
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

/// Render a report into the specified format.
pub fn render(report: &ScanReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Console => Ok(console::render(report)),
        OutputFormat::Json => json::render(report),
        OutputFormat::Csv => Ok(csv::render(report)),
    }
}

/// Human-readable allowance: "unlimited" past the threshold, otherwise the
/// token amount scaled by `decimals` with up to four fractional digits.
pub fn display_allowance(state: &ApprovalPairState, decimals: u8) -> String {
    if state.is_unlimited {
        return "unlimited".into();
    }
    let value = state.current_allowance;
    let scale = match U256::from(10).checked_pow(U256::from(decimals)) {
        Some(scale) if !scale.is_zero() => scale,
        _ => return value.to_string(),
    };
    let whole = value / scale;
    let remainder = value % scale;
    if remainder.is_zero() {
        return whole.to_string();
    }
    let frac = match remainder.checked_mul(U256::from(10_000u64)) {
        Some(scaled) => (scaled / scale).as_u64(),
        None => 0,
    };
    if frac == 0 {
        // below display precision
        return format!("~{whole}");
    }
    let frac = format!("{frac:04}");
    format!("{whole}.{}", frac.trim_end_matches('0'))
}
