use taxlens_core::Money;

use crate::brackets::{TAX_FREE_THRESHOLD, PIT_BRACKETS};
use crate::report::BracketDetail;

/// Progressive personal income tax over [`PIT_BRACKETS`].
pub struct PitCalculator;

impl PitCalculator {
    /// Total tax and the per-band contributions, ascending. Negative income is
    /// treated as zero.
    pub fn calculate(taxable_income: Money) -> (Money, Vec<BracketDetail>) {
        let income = taxable_income.floor_zero();
        if income <= TAX_FREE_THRESHOLD {
            return (Money::ZERO, Vec::new());
        }

        let mut breakdown = Vec::new();
        for bracket in &PIT_BRACKETS {
            if income <= bracket.min {
                break;
            }
            if bracket.rate.is_zero() {
                continue;
            }
            let taxable = bracket.portion_of(income);
            if taxable.is_positive() {
                breakdown.push(BracketDetail {
                    bracket_min: bracket.min,
                    bracket_max: bracket.max,
                    rate: bracket.rate,
                    taxable_in_bracket: taxable,
                    tax_amount: taxable * bracket.rate,
                });
            }
        }

        let total = breakdown.iter().map(|d| d.tax_amount).sum();
        (total, breakdown)
    }

    pub fn tax_due(taxable_income: Money) -> Money {
        Self::calculate(taxable_income).0
    }
}
