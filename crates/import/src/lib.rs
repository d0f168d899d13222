pub mod csv;
pub mod format;

pub use self::csv::{CsvImporter, ImportError, ImportProfile, StatementImport};
pub use self::format::{BankFormat, ColumnIndex, Layout};

pub mod import {
    use crate::*;

    /// Statement file kinds recognised by extension.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum StatementKind {
        Csv,
        Pdf,
    }

    impl StatementKind {
        pub fn from_filename(filename: &str) -> Option<Self> {
            let lower = filename.trim().to_lowercase();
            if lower.ends_with(".csv") {
                Some(StatementKind::Csv)
            } else if lower.ends_with(".pdf") {
                Some(StatementKind::Pdf)
            } else {
                None
            }
        }
    }

    /// Import an uploaded statement. Only CSV exports are read; PDFs are refused.
    pub fn import_statement(
        filename: &str,
        data: &[u8],
        profile: &ImportProfile,
    ) -> Result<StatementImport, ImportError> {
        match StatementKind::from_filename(filename) {
            Some(StatementKind::Csv) => crate::csv::import_csv(data, profile),
            Some(StatementKind::Pdf) => Err(ImportError::PdfUnsupported),
            None => Err(ImportError::UnsupportedFile(filename.to_string())),
        }
    }

}
