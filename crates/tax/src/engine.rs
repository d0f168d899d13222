use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use taxlens_core::{Category, Money, TaxYear, Transaction};
use thiserror::Error;
use uuid::Uuid;

use crate::pit::PitCalculator;
use crate::reliefs::{ReliefCalculator, ReliefInput, ReliefKind};
use crate::report::{QuickPit, TaxBreakdown, TaxReport};

#[derive(Debug, Error, PartialEq)]
pub enum TaxError {
    #[error("Negative amount {amount} on income transaction '{description}'")]
    NegativeAmount { description: String, amount: Money },
    #[error("Amount overflow while totalling {0}")]
    Overflow(String),
}

/// Body of a full calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxCalculationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub tax_year: TaxYear,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub reliefs: ReliefInput,
}

/// Aggregates categorized transactions and applies reliefs and PIT.
pub struct TaxEngine;

impl TaxEngine {
    pub fn calculate(request: &TaxCalculationRequest) -> Result<TaxReport, TaxError> {
        let income_by_category = aggregate_income(request)?;
        let income = |c: Category| income_by_category.get(&c).copied().unwrap_or_default();

        let other_income = income(Category::OtherIncome)
            .checked_add(income(Category::InterestIncome))
            .ok_or_else(|| TaxError::Overflow("other income".into()))?;
        let total_income = income_by_category
            .values()
            .try_fold(Money::ZERO, |acc, v| acc.checked_add(*v))
            .ok_or_else(|| TaxError::Overflow("total income".into()))?;

        let reliefs = ReliefCalculator::calculate(&request.reliefs)?;
        let taxable_income = (total_income - reliefs.total).floor_zero();
        let (pit_amount, pit_breakdown) = PitCalculator::calculate(taxable_income);
        let cgt_amount = Money::ZERO;

        let now = Utc::now();
        Ok(TaxReport {
            id: Uuid::new_v4(),
            user_id: request.user_id.clone(),
            tax_year: request.tax_year,
            total_income,
            employment_income: income(Category::EmploymentIncome),
            freelance_income: income(Category::FreelanceIncome),
            rental_income: income(Category::RentalIncome),
            investment_income: income(Category::InvestmentIncome),
            crypto_income: income(Category::CryptoIncome),
            other_income,
            rent_relief: reliefs.get(ReliefKind::RentRelief),
            pension_deduction: reliefs.get(ReliefKind::Pension),
            nhis_deduction: reliefs.get(ReliefKind::Nhis),
            nhf_deduction: reliefs.get(ReliefKind::Nhf),
            total_reliefs: reliefs.total,
            taxable_income,
            pit_amount,
            cgt_amount,
            total_tax: pit_amount + cgt_amount,
            breakdown: TaxBreakdown {
                pit_breakdown,
                income_by_category,
                reliefs_applied: reliefs.applied,
            },
            created_at: now,
            updated_at: now,
        })
    }

    pub fn quick_pit(annual_income: Money) -> QuickPit {
        let pit_amount = PitCalculator::tax_due(annual_income);
        let effective_rate = annual_income
            .is_positive()
            .then(|| (pit_amount.amount() / annual_income.amount() * Decimal::ONE_HUNDRED).round_dp(2));
        QuickPit {
            annual_income,
            pit_amount,
            effective_rate,
        }
    }

    pub fn rent_relief(annual_rent: Money) -> Money {
        crate::reliefs::rent_relief(annual_rent)
    }
}

fn aggregate_income(
    request: &TaxCalculationRequest,
) -> Result<BTreeMap<Category, Money>, TaxError> {
    let mut totals: BTreeMap<Category, Money> = BTreeMap::new();
    let mut outside_year = 0usize;

    for tx in request.transactions.iter().filter(|tx| tx.is_income()) {
        if tx.amount().is_negative() {
            return Err(TaxError::NegativeAmount {
                description: tx.parsed.description.clone(),
                amount: tx.amount(),
            });
        }
        if let Some(date) = tx.parsed.date {
            if !request.tax_year.contains(date) {
                outside_year += 1;
            }
        }
        let entry = totals.entry(tx.category).or_default();
        *entry = entry
            .checked_add(tx.amount())
            .ok_or_else(|| TaxError::Overflow(tx.category.to_string()))?;
    }

    if outside_year > 0 {
        tracing::warn!(
            tax_year = %request.tax_year,
            count = outside_year,
            "income transactions dated outside the tax year were included"
        );
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use taxlens_core::{Direction, ParsedTransaction};

    fn tx(category: Category, amount: i64, direction: Direction) -> Transaction {
        let parsed = ParsedTransaction::new(
            NaiveDate::from_ymd_opt(2026, 6, 30),
            category.as_str(),
            Money::from(amount),
            direction,
        );
        Transaction::new(parsed, category)
    }

    fn request(transactions: Vec<Transaction>, reliefs: ReliefInput) -> TaxCalculationRequest {
        TaxCalculationRequest {
            user_id: Some("user-1".into()),
            tax_year: TaxYear::new(2026),
            transactions,
            reliefs,
        }
    }

    // ── Aggregation ───────────────────────────────────────────────────────────

    #[test]
    fn only_credit_income_counts() {
        let req = request(
            vec![
                tx(Category::EmploymentIncome, 3_000_000, Direction::Credit),
                tx(Category::EmploymentIncome, 400_000, Direction::Debit),
                tx(Category::Expense, 900_000, Direction::Debit),
                tx(Category::Transfer, 1_000_000, Direction::Credit),
                tx(Category::Uncategorized, 70_000, Direction::Credit),
            ],
            ReliefInput::default(),
        );
        let report = TaxEngine::calculate(&req).unwrap();
        assert_eq!(report.total_income, Money::from(3_000_000));
        assert_eq!(report.employment_income, Money::from(3_000_000));
        assert_eq!(report.breakdown.income_by_category.len(), 1);
    }

    #[test]
    fn interest_merges_into_other_income_summary() {
        let req = request(
            vec![
                tx(Category::OtherIncome, 100_000, Direction::Credit),
                tx(Category::InterestIncome, 25_000, Direction::Credit),
                tx(Category::CryptoIncome, 500_000, Direction::Credit),
            ],
            ReliefInput::default(),
        );
        let report = TaxEngine::calculate(&req).unwrap();
        assert_eq!(report.other_income, Money::from(125_000));
        let by_cat = &report.breakdown.income_by_category;
        assert_eq!(by_cat[&Category::OtherIncome], Money::from(100_000));
        assert_eq!(by_cat[&Category::InterestIncome], Money::from(25_000));
        assert_eq!(report.total_income, Money::from(625_000));
    }

    #[test]
    fn category_totals_sum_to_total_income() {
        let req = request(
            vec![
                tx(Category::EmploymentIncome, 2_500_000, Direction::Credit),
                tx(Category::FreelanceIncome, 1_250_000, Direction::Credit),
                tx(Category::RentalIncome, 600_000, Direction::Credit),
                tx(Category::InvestmentIncome, 75_000, Direction::Credit),
                tx(Category::InterestIncome, 1_234, Direction::Credit),
            ],
            ReliefInput::default(),
        );
        let report = TaxEngine::calculate(&req).unwrap();
        let sum: Money = report.breakdown.income_by_category.values().copied().sum();
        assert_eq!(sum, report.total_income);
    }

    // ── Reliefs, PIT and totals ───────────────────────────────────────────────

    #[test]
    fn full_report() {
        let req = request(
            vec![tx(Category::EmploymentIncome, 5_575_000, Direction::Credit)],
            ReliefInput {
                annual_rent: Money::from(2_000_000),
                pension_contribution: Money::from(100_000),
                nhis_contribution: Money::from(50_000),
                nhf_contribution: Money::from(25_000),
            },
        );
        let report = TaxEngine::calculate(&req).unwrap();
        assert_eq!(report.total_reliefs, Money::from(575_000));
        assert_eq!(report.rent_relief, Money::from(400_000));
        assert_eq!(report.taxable_income, Money::from(5_000_000));
        assert_eq!(report.pit_amount, Money::new(dec!(689999.67)));
        assert_eq!(report.cgt_amount, Money::ZERO);
        assert_eq!(report.total_tax, report.pit_amount);
        assert_eq!(report.breakdown.pit_breakdown.len(), 2);
        assert_eq!(report.breakdown.reliefs_applied.len(), 4);
        assert_eq!(report.user_id.as_deref(), Some("user-1"));
        assert_eq!(report.created_at, report.updated_at);
    }

    #[test]
    fn reliefs_above_income_floor_taxable_at_zero() {
        let req = request(
            vec![tx(Category::FreelanceIncome, 300_000, Direction::Credit)],
            ReliefInput {
                pension_contribution: Money::from(900_000),
                ..Default::default()
            },
        );
        let report = TaxEngine::calculate(&req).unwrap();
        assert_eq!(report.taxable_income, Money::ZERO);
        assert_eq!(report.total_tax, Money::ZERO);
    }

    #[test]
    fn empty_request_is_all_zero() {
        let report = TaxEngine::calculate(&request(Vec::new(), ReliefInput::default())).unwrap();
        assert_eq!(report.total_income, Money::ZERO);
        assert!(report.breakdown.pit_breakdown.is_empty());
        assert!(report.breakdown.income_by_category.is_empty());
    }

    #[test]
    fn identical_inputs_give_identical_figures() {
        let req = request(
            vec![
                tx(Category::EmploymentIncome, 9_000_000, Direction::Credit),
                tx(Category::CryptoIncome, 4_000_000, Direction::Credit),
            ],
            ReliefInput {
                annual_rent: Money::from(1_500_000),
                ..Default::default()
            },
        );
        let a = TaxEngine::calculate(&req).unwrap();
        let b = TaxEngine::calculate(&req).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.total_tax, b.total_tax);
        assert_eq!(a.breakdown, b.breakdown);
    }

    #[test]
    fn out_of_year_income_is_still_counted() {
        let mut late = tx(Category::EmploymentIncome, 1_000_000, Direction::Credit);
        late.parsed.date = NaiveDate::from_ymd_opt(2027, 1, 2);
        let mut undated = tx(Category::EmploymentIncome, 500_000, Direction::Credit);
        undated.parsed.date = None;
        let report = TaxEngine::calculate(&request(vec![late, undated], ReliefInput::default())).unwrap();
        assert_eq!(report.total_income, Money::from(1_500_000));
    }

    // ── Errors ────────────────────────────────────────────────────────────────

    #[test]
    fn negative_income_amount_is_an_error() {
        let req = request(
            vec![tx(Category::RentalIncome, -10, Direction::Credit)],
            ReliefInput::default(),
        );
        assert!(matches!(
            TaxEngine::calculate(&req),
            Err(TaxError::NegativeAmount { .. })
        ));
    }

    #[test]
    fn overflow_is_an_error() {
        let huge = Money::new(Decimal::MAX);
        let mut a = tx(Category::EmploymentIncome, 0, Direction::Credit);
        a.parsed.amount = huge;
        let mut b = tx(Category::EmploymentIncome, 0, Direction::Credit);
        b.parsed.amount = huge;
        let err = TaxEngine::calculate(&request(vec![a, b], ReliefInput::default())).unwrap_err();
        assert!(matches!(err, TaxError::Overflow(_)));
    }

    #[test]
    fn huge_reliefs_are_an_error_not_a_panic() {
        let reliefs = ReliefInput {
            pension_contribution: Money::new(Decimal::MAX),
            nhis_contribution: Money::new(Decimal::MAX),
            ..Default::default()
        };
        let req = request(vec![tx(Category::EmploymentIncome, 1_000, Direction::Credit)], reliefs);
        assert_eq!(
            TaxEngine::calculate(&req).unwrap_err(),
            TaxError::Overflow("total reliefs".into())
        );
    }

    // ── Quick PIT ─────────────────────────────────────────────────────────────

    #[test]
    fn quick_pit_effective_rate() {
        let quick = TaxEngine::quick_pit(Money::from(1_000_000));
        assert_eq!(quick.pit_amount, Money::new(dec!(29999.85)));
        assert_eq!(quick.effective_rate, Some(dec!(3.00)));
    }

    #[test]
    fn quick_pit_zero_income_has_no_rate() {
        let quick = TaxEngine::quick_pit(Money::ZERO);
        assert_eq!(quick.pit_amount, Money::ZERO);
        assert_eq!(quick.effective_rate, None);
    }

    #[test]
    fn report_json_shape() {
        let req = request(
            vec![tx(Category::EmploymentIncome, 1_000_000, Direction::Credit)],
            ReliefInput::default(),
        );
        let json = serde_json::to_value(TaxEngine::calculate(&req).unwrap()).unwrap();
        assert_eq!(json["tax_year"], 2026);
        assert_eq!(json["cgt_amount"], 0.0);
        assert_eq!(json["breakdown"]["income_by_category"]["employment_income"], 1000000.0);
        let rate = json["breakdown"]["pit_breakdown"][0]["rate"].as_f64().unwrap();
        assert!((rate - 0.15).abs() < 1e-9);
        assert!(json["id"].is_string());
    }
}
