use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::category::Category;
use super::money::Money;

/// Which way money moved relative to the account holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Credit,
    Debit,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Credit => write!(f, "credit"),
            Direction::Debit => write!(f, "debit"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "credit" | "cr" => Ok(Direction::Credit),
            "debit" | "dr" => Ok(Direction::Debit),
            other => Err(format!("Unknown direction: '{other}'")),
        }
    }
}

/// One statement line as read from a bank export, before classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedTransaction {
    /// `None` when the bank's date cell matched none of the accepted patterns.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub description: String,
    /// Always non-negative; the sign lives in `direction`.
    pub amount: Money,
    #[serde(rename = "type", alias = "direction", alias = "transaction_type")]
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl ParsedTransaction {
    pub fn new(
        date: Option<NaiveDate>,
        description: impl Into<String>,
        amount: Money,
        direction: Direction,
    ) -> Self {
        Self {
            date,
            description: description.into(),
            amount,
            direction,
            balance: None,
            reference: None,
        }
    }

    pub fn is_credit(&self) -> bool {
        self.direction == Direction::Credit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationMethod {
    Ai,
    Rules,
}

impl fmt::Display for ClassificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassificationMethod::Ai => write!(f, "ai"),
            ClassificationMethod::Rules => write!(f, "rules"),
        }
    }
}

/// Outcome of classifying one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: Category,
    /// Heuristic certainty in `[0, 1]`.
    pub confidence: f32,
    pub method: ClassificationMethod,
}

impl ClassificationResult {
    pub fn new(category: Category, confidence: f32, method: ClassificationMethod) -> Self {
        Self {
            category,
            confidence: confidence.clamp(0.0, 1.0),
            method,
        }
    }

    pub fn rules(category: Category, confidence: f32) -> Self {
        Self::new(category, confidence, ClassificationMethod::Rules)
    }

    pub fn ai(category: Category, confidence: f32) -> Self {
        Self::new(category, confidence, ClassificationMethod::Ai)
    }

    /// The degraded result: nothing is known about the transaction.
    pub fn uncategorized(method: ClassificationMethod) -> Self {
        Self::new(Category::Uncategorized, 0.0, method)
    }
}

/// A parsed transaction together with the classification it received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedTransaction {
    #[serde(flatten)]
    pub transaction: ParsedTransaction,
    #[serde(flatten)]
    pub classification: ClassificationResult,
}

/// A categorized transaction as submitted for tax calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(flatten)]
    pub parsed: ParsedTransaction,
    pub category: Category,
    #[serde(default)]
    pub confidence: f32,
    /// Set when the user overrode the automatic category.
    #[serde(default)]
    pub is_manual: bool,
}

impl Transaction {
    pub fn new(parsed: ParsedTransaction, category: Category) -> Self {
        Self {
            parsed,
            category,
            confidence: 1.0,
            is_manual: true,
        }
    }

    pub fn from_classification(parsed: ParsedTransaction, result: ClassificationResult) -> Self {
        Self {
            parsed,
            category: result.category,
            confidence: result.confidence,
            is_manual: false,
        }
    }

    pub fn amount(&self) -> Money {
        self.parsed.amount
    }

    pub fn direction(&self) -> Direction {
        self.parsed.direction
    }

    /// Credit-side money in an income category.
    pub fn is_income(&self) -> bool {
        self.parsed.is_credit() && self.category.is_income()
    }
}
