use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use taxlens_core::Money;

/// One marginal band. `max` is `None` for the open-ended top band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaxBracket {
    pub min: Money,
    pub max: Option<Money>,
    pub rate: Decimal,
}

impl TaxBracket {
    const fn new(min: Decimal, max: Option<Decimal>, rate: Decimal) -> Self {
        let max = match max {
            Some(m) => Some(Money::new(m)),
            None => None,
        };
        Self {
            min: Money::new(min),
            max,
            rate,
        }
    }

    /// Portion of `income` that falls inside this band, never negative.
    pub fn portion_of(&self, income: Money) -> Money {
        let ceiling = match self.max {
            Some(max) => income.min(max),
            None => income,
        };
        (ceiling - self.min).floor_zero()
    }
}

/// Income at or below this is untaxed.
pub const TAX_FREE_THRESHOLD: Money = Money::new(dec!(800000));

/// Annual PIT schedule, ascending and contiguous in whole naira.
pub static PIT_BRACKETS: [TaxBracket; 6] = [
    TaxBracket::new(dec!(0), Some(dec!(800000)), dec!(0)),
    TaxBracket::new(dec!(800001), Some(dec!(3000000)), dec!(0.15)),
    TaxBracket::new(dec!(3000001), Some(dec!(12000000)), dec!(0.18)),
    TaxBracket::new(dec!(12000001), Some(dec!(25000000)), dec!(0.21)),
    TaxBracket::new(dec!(25000001), Some(dec!(50000000)), dec!(0.23)),
    TaxBracket::new(dec!(50000001), None, dec!(0.25)),
];
