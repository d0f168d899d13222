use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use taxlens_core::Money;

use crate::engine::TaxError;

pub const RENT_RELIEF_RATE: Decimal = dec!(0.20);
pub const RENT_RELIEF_CAP: Money = Money::new(dec!(500000));

/// Declared annual reliefs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReliefInput {
    #[serde(default)]
    pub annual_rent: Money,
    #[serde(default)]
    pub pension_contribution: Money,
    #[serde(default)]
    pub nhis_contribution: Money,
    #[serde(default)]
    pub nhf_contribution: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReliefKind {
    RentRelief,
    Pension,
    Nhis,
    Nhf,
}

impl fmt::Display for ReliefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReliefKind::RentRelief => write!(f, "rent_relief"),
            ReliefKind::Pension => write!(f, "pension"),
            ReliefKind::Nhis => write!(f, "nhis"),
            ReliefKind::Nhf => write!(f, "nhf"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReliefSummary {
    pub total: Money,
    /// Only reliefs that actually reduce income appear here.
    pub applied: BTreeMap<ReliefKind, Money>,
}

impl ReliefSummary {
    pub fn get(&self, kind: ReliefKind) -> Money {
        self.applied.get(&kind).copied().unwrap_or_default()
    }
}

/// 20% of annual rent, capped at ₦500,000. Nothing for non-positive rent.
pub fn rent_relief(annual_rent: Money) -> Money {
    if !annual_rent.is_positive() {
        return Money::ZERO;
    }
    (annual_rent * RENT_RELIEF_RATE).min(RENT_RELIEF_CAP)
}

pub struct ReliefCalculator;

impl ReliefCalculator {
    pub fn calculate(input: &ReliefInput) -> Result<ReliefSummary, TaxError> {
        let candidates = [
            (ReliefKind::RentRelief, rent_relief(input.annual_rent)),
            (ReliefKind::Pension, input.pension_contribution),
            (ReliefKind::Nhis, input.nhis_contribution),
            (ReliefKind::Nhf, input.nhf_contribution),
        ];

        let applied: BTreeMap<_, _> = candidates
            .into_iter()
            .filter(|(_, amount)| amount.is_positive())
            .collect();
        let total = applied
            .values()
            .try_fold(Money::ZERO, |acc, v| acc.checked_add(*v))
            .ok_or_else(|| TaxError::Overflow("total reliefs".into()))?;
        Ok(ReliefSummary { total, applied })
    }
}
