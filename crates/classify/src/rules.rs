use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use taxlens_core::{Category, ClassificationResult, Direction};

/// Substring table hit.
pub const TABLE_MATCH_CONFIDENCE: f32 = 0.85;
/// Generic spending keyword on a debit.
pub const EXPENSE_KEYWORD_CONFIDENCE: f32 = 0.70;
/// Incoming transfer: could be any kind of income.
pub const CREDIT_TRANSFER_CONFIDENCE: f32 = 0.50;
pub const DEBIT_TRANSFER_CONFIDENCE: f32 = 0.60;

const INCOME_PATTERNS: &[(&str, Category)] = &[
    // employment
    ("SALARY", Category::EmploymentIncome),
    ("PAY", Category::EmploymentIncome),
    ("WAGES", Category::EmploymentIncome),
    ("PAYROLL", Category::EmploymentIncome),
    ("REMUNERATION", Category::EmploymentIncome),
    // freelance platforms
    ("UPWORK", Category::FreelanceIncome),
    ("FIVERR", Category::FreelanceIncome),
    ("PAYONEER", Category::FreelanceIncome),
    ("WISE", Category::FreelanceIncome),
    ("TOPTAL", Category::FreelanceIncome),
    ("FREELANCER", Category::FreelanceIncome),
    ("CONTRA", Category::FreelanceIncome),
    // crypto exchanges
    ("BINANCE", Category::CryptoIncome),
    ("LUNO", Category::CryptoIncome),
    ("QUIDAX", Category::CryptoIncome),
    ("PAXFUL", Category::CryptoIncome),
    ("COINBASE", Category::CryptoIncome),
    ("KRAKEN", Category::CryptoIncome),
    ("BYBIT", Category::CryptoIncome),
    ("KUCOIN", Category::CryptoIncome),
    ("ROQQU", Category::CryptoIncome),
    ("PATRICIA", Category::CryptoIncome),
    ("BUSHA", Category::CryptoIncome),
    ("YELLOW CARD", Category::CryptoIncome),
    ("NOONES", Category::CryptoIncome),
    // investments
    ("DIVIDEND", Category::InvestmentIncome),
    ("INVESTMENT RETURN", Category::InvestmentIncome),
    ("BAMBOO", Category::InvestmentIncome),
    ("RISEVEST", Category::InvestmentIncome),
    ("TROVE", Category::InvestmentIncome),
    ("CHAKA", Category::InvestmentIncome),
    // interest
    ("INTEREST", Category::InterestIncome),
    ("INT CREDIT", Category::InterestIncome),
    // rental
    ("RENT RECEIVED", Category::RentalIncome),
    ("TENANT", Category::RentalIncome),
    ("RENTAL INCOME", Category::RentalIncome),
];

const EXPENSE_PATTERNS: &[(&str, Category)] = &[
    ("RENT PAYMENT", Category::RentExpense),
    ("LANDLORD", Category::RentExpense),
    ("HOUSE RENT", Category::RentExpense),
    ("ACCOMMODATION", Category::RentExpense),
];

const EXPENSE_KEYWORDS: [&str; 6] = ["POS", "ATM", "WITHDRAWAL", "TRANSFER", "PAYMENT", "PURCHASE"];

fn re_transfer() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?i)(NIP|TRANSFER|TRF)").expect("invalid regex"))
}

/// A description substring that maps to a category for one direction of money.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternRule {
    pub pattern: String,
    pub category: Category,
    pub direction: Direction,
}

impl PatternRule {
    pub fn new(pattern: &str, category: Category, direction: Direction) -> Self {
        Self {
            pattern: pattern.trim().to_uppercase(),
            category,
            direction,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default, rename = "pattern")]
    patterns: Vec<PatternRule>,
}

/// Keyword classifier over fixed pattern tables.
///
/// Each table is sorted once, longest pattern first, so a specific token such
/// as `PAYONEER` is always tried before a generic one such as `PAY`.
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    income: Vec<PatternRule>,
    expense: Vec<PatternRule>,
}

impl Default for RuleClassifier {
    fn default() -> Self {
        Self::with_extra_patterns(Vec::new())
    }
}

impl RuleClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in tables plus `extra`. An extra pattern replaces a built-in one with
    /// the same text and direction.
    pub fn with_extra_patterns(extra: Vec<PatternRule>) -> Self {
        let builtin = INCOME_PATTERNS
            .iter()
            .map(|(p, c)| PatternRule::new(p, *c, Direction::Credit))
            .chain(
                EXPENSE_PATTERNS
                    .iter()
                    .map(|(p, c)| PatternRule::new(p, *c, Direction::Debit)),
            );

        let extra: Vec<PatternRule> = extra
            .into_iter()
            .map(|r| PatternRule::new(&r.pattern, r.category, r.direction))
            .filter(|r| !r.pattern.is_empty())
            .collect();

        let (mut income, mut expense): (Vec<_>, Vec<_>) = builtin
            .filter(|b| {
                !extra
                    .iter()
                    .any(|e| e.pattern == b.pattern && e.direction == b.direction)
            })
            .chain(extra.iter().cloned())
            .partition(|r| r.direction == Direction::Credit);

        sort_longest_first(&mut income);
        sort_longest_first(&mut expense);
        Self { income, expense }
    }

    /// Extra patterns from a TOML document of `[[pattern]]` tables.
    pub fn from_toml(toml_content: &str) -> Result<Self, String> {
        let file: RuleFile =
            toml::from_str(toml_content).map_err(|e| format!("Failed to parse TOML: {e}"))?;
        if let Some(blank) = file.patterns.iter().find(|r| r.pattern.trim().is_empty()) {
            return Err(format!("Empty pattern for category '{}'", blank.category));
        }
        Ok(Self::with_extra_patterns(file.patterns))
    }

    /// The table scanned for `direction`, in match order.
    pub fn patterns(&self, direction: Direction) -> &[PatternRule] {
        match direction {
            Direction::Credit => &self.income,
            Direction::Debit => &self.expense,
        }
    }

    pub fn classify(&self, description: &str, direction: Direction) -> ClassificationResult {
        let text = description.to_uppercase();

        if let Some(rule) = find_pattern(self.patterns(direction), &text) {
            return ClassificationResult::rules(rule.category, TABLE_MATCH_CONFIDENCE);
        }

        if direction == Direction::Debit && EXPENSE_KEYWORDS.iter().any(|k| text.contains(k)) {
            return ClassificationResult::rules(Category::Expense, EXPENSE_KEYWORD_CONFIDENCE);
        }

        if re_transfer().is_match(&text) {
            return match direction {
                Direction::Credit => {
                    ClassificationResult::rules(Category::Uncategorized, CREDIT_TRANSFER_CONFIDENCE)
                }
                Direction::Debit => {
                    ClassificationResult::rules(Category::Transfer, DEBIT_TRANSFER_CONFIDENCE)
                }
            };
        }

        ClassificationResult::rules(Category::Uncategorized, 0.0)
    }
}

fn sort_longest_first(rules: &mut [PatternRule]) {
    rules.sort_by(|a, b| {
        b.pattern
            .chars()
            .count()
            .cmp(&a.pattern.chars().count())
            .then_with(|| a.pattern.cmp(&b.pattern))
    });
}

fn find_pattern<'a>(table: &'a [PatternRule], text: &str) -> Option<&'a PatternRule> {
    table.iter().find(|r| text.contains(r.pattern.as_str()))
}
