#![forbid(unsafe_code)]

pub mod bot;
pub mod checker;
pub mod cli;
pub mod code;
pub mod config;
pub mod error;
pub mod index;
pub mod ledger;
pub mod sheets;
pub mod telemetry;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

// Re-export the pipeline types at crate root for convenience
pub use crate::checker::{CheckOutcome, Checker};
pub use crate::code::CodeKey;
pub use crate::index::{CodeIndex, CodeSource, LoadReport, SourceError};
pub use crate::ledger::{BumpStats, CheckLedger, CheckRow, LedgerError};
