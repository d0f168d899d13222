use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Column layout of a bank's statement export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BankFormat {
    GtBank,
    Access,
    Uba,
    FirstBank,
    Generic,
}

impl fmt::Display for BankFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BankFormat::GtBank => write!(f, "gtbank"),
            BankFormat::Access => write!(f, "access"),
            BankFormat::Uba => write!(f, "uba"),
            BankFormat::FirstBank => write!(f, "firstbank"),
            BankFormat::Generic => write!(f, "generic"),
        }
    }
}

impl std::str::FromStr for BankFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gtbank" => Ok(BankFormat::GtBank),
            "access" => Ok(BankFormat::Access),
            "uba" => Ok(BankFormat::Uba),
            "firstbank" => Ok(BankFormat::FirstBank),
            "generic" => Ok(BankFormat::Generic),
            other => Err(format!("Unknown bank format: '{other}'")),
        }
    }
}

/// Header pairs that identify a bank layout. Checked in order; both columns must be present.
const FINGERPRINTS: [(BankFormat, [&str; 2]); 4] = [
    (BankFormat::Access, ["WITHDRAWALS", "LODGEMENTS"]),
    (BankFormat::Uba, ["MONEY OUT", "MONEY IN"]),
    (BankFormat::FirstBank, ["DEBIT AMOUNT", "CREDIT AMOUNT"]),
    (BankFormat::GtBank, ["NARRATION", "TRANS DATE"]),
];

const BALANCE: &[&str] = &["BALANCE"];
const REFERENCE: &[&str] = &["REF", "REF NO", "REFERENCE NO", "TRANSACTION REF", "CHEQUE NO", "REFERENCE"];
// FirstBank puts the narration in REFERENCE, so it is not also a reference column there.
const REFERENCE_NO_NARRATION: &[&str] = &["REF", "REF NO", "REFERENCE NO", "TRANSACTION REF", "CHEQUE NO"];

/// Candidate column names per field, tried in order.
#[derive(Debug, Clone, Copy)]
pub struct Layout {
    pub date: &'static [&'static str],
    pub description: &'static [&'static str],
    pub debit: &'static [&'static str],
    pub credit: &'static [&'static str],
    /// Single signed amount column, consulted only when no split column yields an amount.
    pub amount: &'static [&'static str],
    pub balance: &'static [&'static str],
    pub reference: &'static [&'static str],
}

static GTBANK: Layout = Layout {
    date: &["TRANS DATE", "DATE"],
    description: &["NARRATION", "DESCRIPTION"],
    debit: &["DEBIT"],
    credit: &["CREDIT"],
    amount: &[],
    balance: BALANCE,
    reference: REFERENCE,
};

static ACCESS: Layout = Layout {
    date: &["TRANSACTION DATE"],
    description: &["NARRATION"],
    debit: &["WITHDRAWALS"],
    credit: &["LODGEMENTS"],
    amount: &[],
    balance: BALANCE,
    reference: REFERENCE,
};

static UBA: Layout = Layout {
    date: &["DATE"],
    description: &["DESCRIPTION"],
    debit: &["MONEY OUT"],
    credit: &["MONEY IN"],
    amount: &[],
    balance: BALANCE,
    reference: REFERENCE,
};

static FIRSTBANK: Layout = Layout {
    date: &["VALUE DATE"],
    description: &["REFERENCE", "DESCRIPTION"],
    debit: &["DEBIT AMOUNT"],
    credit: &["CREDIT AMOUNT"],
    amount: &[],
    balance: BALANCE,
    reference: REFERENCE_NO_NARRATION,
};

static GENERIC: Layout = Layout {
    date: &["DATE", "TRANS DATE", "TRANSACTION DATE", "VALUE DATE", "POST DATE"],
    description: &["DESCRIPTION", "NARRATION", "REMARKS", "REFERENCE", "DETAILS"],
    debit: &["DEBIT", "WITHDRAWALS", "MONEY OUT", "DEBIT AMOUNT", "DR"],
    credit: &["CREDIT", "LODGEMENTS", "MONEY IN", "CREDIT AMOUNT", "CR"],
    amount: &["AMOUNT"],
    balance: BALANCE,
    reference: REFERENCE_NO_NARRATION,
};

impl BankFormat {
    /// Match the header against the known fingerprints, falling back to `Generic`.
    pub fn detect(columns: &ColumnIndex) -> BankFormat {
        FINGERPRINTS
            .iter()
            .find(|(_, pair)| pair.iter().all(|name| columns.contains(name)))
            .map(|(format, _)| *format)
            .unwrap_or(BankFormat::Generic)
    }

    pub fn layout(self) -> &'static Layout {
        match self {
            BankFormat::GtBank => &GTBANK,
            BankFormat::Access => &ACCESS,
            BankFormat::Uba => &UBA,
            BankFormat::FirstBank => &FIRSTBANK,
            BankFormat::Generic => &GENERIC,
        }
    }
}

/// Normalized header name → column position.
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    pub fn from_header(header: &StringRecord) -> Self {
        let mut positions = HashMap::new();
        for (idx, name) in header.iter().enumerate() {
            // First occurrence wins for duplicated headers.
            positions.entry(normalize_header(name)).or_insert(idx);
        }
        Self { positions }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// The cell under `name`, if the header has that column and the row reaches it.
    pub fn cell<'r>(&self, record: &'r StringRecord, name: &str) -> Option<&'r str> {
        self.position(name).and_then(|idx| record.get(idx))
    }

    /// Cells for each candidate column that exists in this row, in candidate order.
    pub fn cells<'a>(
        &'a self,
        record: &'a StringRecord,
        candidates: &'a [&'a str],
    ) -> impl Iterator<Item = &'a str> + 'a {
        candidates.iter().filter_map(move |name| self.cell(record, name))
    }
}

/// Uppercase, strip a byte-order mark, collapse internal whitespace.
pub fn normalize_header(name: &str) -> String {
    name.trim_start_matches('\u{feff}')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}
