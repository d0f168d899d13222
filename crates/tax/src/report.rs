use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use taxlens_core::{Category, Money, TaxYear};
use uuid::Uuid;

use crate::reliefs::ReliefKind;

/// Tax contributed by one band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketDetail {
    pub bracket_min: Money,
    /// `None` for the open-ended top band.
    pub bracket_max: Option<Money>,
    pub rate: Decimal,
    pub taxable_in_bracket: Money,
    pub tax_amount: Money,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub pit_breakdown: Vec<BracketDetail>,
    /// Credit-side income per category. Only categories that received income.
    pub income_by_category: BTreeMap<Category, Money>,
    pub reliefs_applied: BTreeMap<ReliefKind, Money>,
}

/// Result of one calculation request.
///
/// `other_income` merges `other_income` and `interest_income`; the breakdown
/// keeps them apart. `cgt_amount` is always zero: capital gains need cost-basis
/// tracking, which is not done here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxReport {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub tax_year: TaxYear,

    pub total_income: Money,
    pub employment_income: Money,
    pub freelance_income: Money,
    pub rental_income: Money,
    pub investment_income: Money,
    pub crypto_income: Money,
    pub other_income: Money,

    pub rent_relief: Money,
    pub pension_deduction: Money,
    pub nhis_deduction: Money,
    pub nhf_deduction: Money,
    pub total_reliefs: Money,

    pub taxable_income: Money,
    pub pit_amount: Money,
    pub cgt_amount: Money,
    pub total_tax: Money,

    pub breakdown: TaxBreakdown,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// PIT on a raw annual income, without aggregation or reliefs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuickPit {
    pub annual_income: Money,
    pub pit_amount: Money,
    /// Percentage of income; `None` when income is not positive.
    pub effective_rate: Option<Decimal>,
}
