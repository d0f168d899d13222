use chrono::NaiveDate;
use csv::StringRecord;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::str::FromStr;
use taxlens_core::{Direction, Money, ParsedTransaction};
use thiserror::Error;

use crate::format::{BankFormat, ColumnIndex, Layout};

/// Accepted date cell patterns, tried in order. Day-first forms come before month-first.
const DATE_FORMATS: [&str; 7] = [
    "%d-%b-%Y",  // 05-Jan-2026
    "%d/%m/%Y",  // 05/01/2026, 5/1/2026
    "%Y-%m-%d",  // 2026-01-05
    "%m/%d/%Y",  // 01/25/2026
    "%d-%m-%Y",  // 05-01-2026
    "%d %b %Y",  // 05 Jan 2026
    "%b %d, %Y", // Jan 05, 2026
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportProfile {
    pub delimiter: String,
    /// Skip detection and read the file with this layout.
    pub format: Option<BankFormat>,
}

impl Default for ImportProfile {
    fn default() -> Self {
        Self {
            delimiter: ",".to_string(),
            format: None,
        }
    }
}

/// Everything read out of one statement file.
#[derive(Debug, Clone)]
pub struct StatementImport {
    pub transactions: Vec<ParsedTransaction>,
    pub format: BankFormat,
    /// Rows the reader rejected or whose cells could not be interpreted.
    pub skipped_rows: usize,
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("CSV file too short: expected a header row and at least one data row")]
    TooShort,
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("PDF statements are not supported yet; export the statement as CSV")]
    PdfUnsupported,
    #[error("Unsupported file format '{0}'; upload a CSV statement")]
    UnsupportedFile(String),
}

pub struct CsvImporter;

impl CsvImporter {
    pub fn parse<R: Read>(
        reader: &mut csv::Reader<R>,
        profile: &ImportProfile,
    ) -> Result<StatementImport, ImportError> {
        let mut records = reader.records();

        let header = records.next().ok_or(ImportError::TooShort)??;
        let columns = ColumnIndex::from_header(&header);
        let format = profile.format.unwrap_or_else(|| BankFormat::detect(&columns));
        let layout = format.layout();

        let mut transactions = Vec::new();
        let mut data_rows = 0usize;
        let mut skipped_rows = 0usize;

        for (row, result) in records.enumerate() {
            data_rows += 1;
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    tracing::debug!(row = row + 1, error = %e, "skipping unreadable CSV row");
                    skipped_rows += 1;
                    continue;
                }
            };

            match extract_row(&record, &columns, layout) {
                Ok(Some(tx)) => transactions.push(tx),
                // Balance-only and other zero-amount lines are not transactions.
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(row = row + 1, error = %e, "skipping unparseable CSV row");
                    skipped_rows += 1;
                }
            }
        }

        if data_rows == 0 {
            return Err(ImportError::TooShort);
        }

        tracing::debug!(
            %format,
            rows = data_rows,
            transactions = transactions.len(),
            skipped = skipped_rows,
            "statement parsed"
        );

        Ok(StatementImport {
            transactions,
            format,
            skipped_rows,
        })
    }
}

/// Pull one transaction out of a data row. `Ok(None)` means the row carries no money movement.
fn extract_row(
    record: &StringRecord,
    columns: &ColumnIndex,
    layout: &Layout,
) -> Result<Option<ParsedTransaction>, ImportError> {
    let date = columns.cells(record, layout.date).find_map(parse_date);

    let description = columns
        .cells(record, layout.description)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string();

    // The first unreadable amount cell; it only matters if no other column carries money.
    let mut unreadable: Option<ImportError> = None;

    let mut entry = first_positive(columns.cells(record, layout.debit), &mut unreadable)
        .map(|amount| (amount, Direction::Debit));
    // A populated credit column wins over the debit side.
    if let Some(amount) = first_positive(columns.cells(record, layout.credit), &mut unreadable) {
        entry = Some((amount, Direction::Credit));
    }

    if entry.is_none() {
        if let Some(cell) = columns.cells(record, layout.amount).next() {
            match parse_amount(cell) {
                Ok(amount) if amount.is_negative() => entry = Some((amount.abs(), Direction::Debit)),
                Ok(amount) => entry = Some((amount, Direction::Credit)),
                Err(e) => {
                    unreadable.get_or_insert(e);
                }
            }
        }
    }

    let Some((amount, direction)) = entry.filter(|(amount, _)| !amount.is_zero()) else {
        return match unreadable {
            Some(e) => Err(e),
            None => Ok(None),
        };
    };

    let balance = columns
        .cells(record, layout.balance)
        .find(|s| !s.is_empty())
        .and_then(|s| parse_amount(s).ok());

    let reference = columns
        .cells(record, layout.reference)
        .find(|s| !s.is_empty())
        .map(str::to_string);

    Ok(Some(ParsedTransaction {
        date,
        description,
        amount,
        direction,
        balance,
        reference,
    }))
}

/// First positive amount among `cells`. Unreadable cells are recorded and passed over.
fn first_positive<'a>(
    cells: impl Iterator<Item = &'a str>,
    unreadable: &mut Option<ImportError>,
) -> Option<Money> {
    for cell in cells {
        match parse_amount(cell) {
            Ok(amount) if amount.is_positive() => return Some(amount),
            Ok(_) => {}
            Err(e) => {
                unreadable.get_or_insert(e);
            }
        }
    }
    None
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Parse a statement amount cell. Blank cells and `-` are zero; `(1,200.00)` is negative.
pub fn parse_amount(s: &str) -> Result<Money, ImportError> {
    let raw = s.trim();
    if raw.is_empty() || raw == "-" {
        return Ok(Money::ZERO);
    }

    let cleaned: String = raw
        .to_uppercase()
        .replace("NGN", "")
        .chars()
        .filter(|c| !matches!(c, '₦' | '$' | '£' | '€' | ',') && !c.is_whitespace())
        .collect();

    let (negative, digits) = match cleaned.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, cleaned.as_str()),
    };
    if digits.is_empty() || digits == "-" {
        return Ok(Money::ZERO);
    }

    let mut value =
        Decimal::from_str(digits).map_err(|_| ImportError::InvalidAmount(raw.to_string()))?;
    if negative {
        value = -value;
    }
    Ok(Money::new(value))
}

pub fn import_csv<R: Read>(data: R, profile: &ImportProfile) -> Result<StatementImport, ImportError> {
    let delimiter = profile
        .delimiter
        .as_bytes()
        .first()
        .copied()
        .unwrap_or(b',');
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .delimiter(delimiter)
        .from_reader(data);

    CsvImporter::parse(&mut reader, profile)
}
