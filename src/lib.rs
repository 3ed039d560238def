//! Bulk data transfer engine for a personal-finance ledger.
//!
//! This library implements CSV export of a user's entire financial graph
//! (brokers, accounts, credit cards, categories, vendors, subscriptions,
//! installment plans and transactions) and CSV import that reconstructs that
//! graph while deduplicating against records that already exist.
//!
//! The public surface is [TransferEngine] and its three operations:
//! [export](TransferEngine::export), [import](TransferEngine::import) and
//! [validate](TransferEngine::validate). HTTP routing, authentication and
//! multipart decoding are the caller's responsibility.

#![warn(missing_docs)]

mod codec;
mod database_id;
mod db;
mod export;
mod extract;
mod model;
mod orchestrator;
mod report;
mod repository;
mod schema;

pub use database_id::{DatabaseID, UserID};
pub use db::initialize as initialize_db;
pub use model::{MovementType, TransactionDraft, TransferRow};
pub use export::ExportQuery;
pub use orchestrator::{ImportOptions, MAX_IMPORT_BYTES, TransferEngine};
pub use report::{
    CsvExport, EntityCounts, ImportReport, ImportStatistics, ImportStatus, ValidationReport,
};
pub use repository::{DuplicateMatcher, MatchDateAmountDescription};
pub use schema::{COLUMNS, REQUIRED_COLUMNS};

/// The errors that may occur in the transfer engine.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The CSV header is missing one or more required columns.
    ///
    /// This is a whole-file failure: no rows are processed.
    #[error("the CSV file is missing required columns: {0}")]
    MissingColumns(String),

    /// The CSV document contained no header row.
    #[error("the CSV file is empty")]
    EmptyFile,

    /// The uploaded file exceeds the import size ceiling.
    ///
    /// The whole file is materialised in memory during an import, so the
    /// size is checked before any decoding happens.
    #[error("the file is {0} bytes which exceeds the import limit")]
    FileTooLarge(usize),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLock,

    /// A row failed during staging while skip-errors mode was off.
    ///
    /// The whole run is rolled back; the message names the offending row.
    #[error("Row {0}: {1}")]
    RowFailed(usize, String),

    /// The CSV machinery failed outside of any single row.
    #[error("could not process CSV: {0}")]
    Csv(String),

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<csv::Error> for Error {
    fn from(value: csv::Error) -> Self {
        Error::Csv(value.to_string())
    }
}
