pub mod brackets;
pub mod engine;
pub mod pit;
pub mod reliefs;
pub mod report;

pub use brackets::{TaxBracket, PIT_BRACKETS, TAX_FREE_THRESHOLD};
pub use engine::{TaxCalculationRequest, TaxEngine, TaxError};
pub use pit::PitCalculator;
pub use reliefs::{rent_relief, ReliefCalculator, ReliefInput, ReliefKind, ReliefSummary};
pub use report::{BracketDetail, QuickPit, TaxBreakdown, TaxReport};
