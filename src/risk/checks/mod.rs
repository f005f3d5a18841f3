//! Built-in risk checks, registered in evaluation order.

mod denylist;
mod dormancy;
mod never_used;
mod spender;
mod unlimited;
mod value;

pub use denylist::DenylistCheck;
pub use dormancy::DormancyCheck;
pub use never_used::NeverUsedCheck;
pub use spender::UnverifiedSpenderCheck;
pub use unlimited::UnlimitedAllowanceCheck;
pub use value::HighValueCheck;

use super::RiskCheck;

/// All checks in their fixed evaluation order. The order is policy: the
/// value check consults earlier results to avoid double-penalizing an
/// exposure the unlimited check already covered.
pub fn all_checks() -> Vec<Box<dyn RiskCheck>> {
    vec![
        Box::new(UnlimitedAllowanceCheck),
        Box::new(DormancyCheck),
        Box::new(NeverUsedCheck),
        Box::new(UnverifiedSpenderCheck),
        Box::new(HighValueCheck),
        Box::new(DenylistCheck),
    ]
}
