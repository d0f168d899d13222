use serde::{Deserialize, Serialize};
use std::fmt;

/// Transaction classification. Closed set; the wire form is snake_case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    EmploymentIncome,
    FreelanceIncome,
    RentalIncome,
    InvestmentIncome,
    CryptoIncome,
    InterestIncome,
    OtherIncome,
    Expense,
    RentExpense,
    Transfer,
    Uncategorized,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::EmploymentIncome,
        Category::FreelanceIncome,
        Category::RentalIncome,
        Category::InvestmentIncome,
        Category::CryptoIncome,
        Category::InterestIncome,
        Category::OtherIncome,
        Category::Expense,
        Category::RentExpense,
        Category::Transfer,
        Category::Uncategorized,
    ];

    pub const INCOME: [Category; 7] = [
        Category::EmploymentIncome,
        Category::FreelanceIncome,
        Category::RentalIncome,
        Category::InvestmentIncome,
        Category::CryptoIncome,
        Category::InterestIncome,
        Category::OtherIncome,
    ];

    pub fn is_income(self) -> bool {
        matches!(
            self,
            Category::EmploymentIncome
                | Category::FreelanceIncome
                | Category::RentalIncome
                | Category::InvestmentIncome
                | Category::CryptoIncome
                | Category::InterestIncome
                | Category::OtherIncome
        )
    }

    /// Every income category is taxable; nothing else is.
    pub fn is_taxable(self) -> bool {
        self.is_income()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::EmploymentIncome => "employment_income",
            Category::FreelanceIncome => "freelance_income",
            Category::RentalIncome => "rental_income",
            Category::InvestmentIncome => "investment_income",
            Category::CryptoIncome => "crypto_income",
            Category::InterestIncome => "interest_income",
            Category::OtherIncome => "other_income",
            Category::Expense => "expense",
            Category::RentExpense => "rent_expense",
            Category::Transfer => "transfer",
            Category::Uncategorized => "uncategorized",
        }
    }

    /// One-line gloss used when describing the vocabulary to a language model.
    pub fn describe(self) -> &'static str {
        match self {
            Category::EmploymentIncome => "Salary, wages, payroll from employer",
            Category::FreelanceIncome => "Payments from freelance platforms or clients",
            Category::RentalIncome => "Rent received from tenants",
            Category::InvestmentIncome => "Dividends, investment returns",
            Category::CryptoIncome => "Cryptocurrency trading/sales",
            Category::InterestIncome => "Bank interest",
            Category::OtherIncome => "Other income sources",
            Category::Expense => "General expenses",
            Category::RentExpense => "Rent payments to landlord",
            Category::Transfer => "Money transfers between accounts",
            Category::Uncategorized => "Cannot determine",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| format!("Unknown category: '{s}'"))
    }
}
