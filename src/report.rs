//! The structured reports returned by the transfer operations.
//!
//! These types are the engine's entire user-visible output: the caller maps
//! [ImportStatus] to a transport-level status code and serializes the rest
//! as-is. A raw error is never surfaced directly.

use serde::Serialize;

use crate::extract::UniqueEntities;

/// The terminal state of an import run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    /// All staged changes were committed.
    Completed,
    /// The run was aborted and every staged change rolled back.
    Failed,
}

/// Row counters for one import run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportStatistics {
    /// Data rows in the file, valid or not.
    pub total_rows: usize,
    /// Rows that created a new transaction.
    pub processed_rows: usize,
    /// Rows skipped because a matching transaction already exists.
    pub skipped_rows: usize,
    /// Rows rejected by validation or persistence.
    pub error_rows: usize,
}

/// Per-entity-type creation counts for one import run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    /// Brokers created.
    pub brokers: usize,
    /// Accounts created, including implicit transfer endpoints.
    pub accounts: usize,
    /// Credit cards created.
    pub credit_cards: usize,
    /// Categories created, parents and children alike.
    pub categories: usize,
    /// Vendors created.
    pub vendors: usize,
    /// Subscriptions created.
    pub subscriptions: usize,
    /// Installment plans created.
    pub installment_plans: usize,
    /// Transactions created.
    pub transactions: usize,
}

impl EntityCounts {
    /// Estimate counts from the extractor's unique sets, for dry runs.
    pub(crate) fn estimate(entities: &UniqueEntities, transactions: usize) -> Self {
        Self {
            brokers: entities.brokers.len(),
            accounts: entities.accounts.len(),
            credit_cards: entities.credit_cards.len(),
            categories: entities.categories.len(),
            vendors: entities.vendors.len(),
            subscriptions: entities.subscriptions.len(),
            installment_plans: entities.installment_plans.len(),
            transactions,
        }
    }
}

/// The structured report returned by [import](crate::TransferEngine::import).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImportReport {
    /// Whether the run committed or rolled back.
    pub status: ImportStatus,
    /// Row counters.
    pub statistics: ImportStatistics,
    /// How many records of each entity type were created.
    pub entities_created: EntityCounts,
    /// Fatal and row-scoped error messages, in row order.
    pub errors: Vec<String>,
    /// Non-fatal observations: unknown columns, unresolved references,
    /// skipped credit cards.
    pub warnings: Vec<String>,
}

impl ImportReport {
    /// A failed report carrying `message`, with `statistics` as far as the
    /// run got.
    pub(crate) fn failed(message: String, statistics: ImportStatistics) -> Self {
        Self {
            status: ImportStatus::Failed,
            statistics,
            entities_created: EntityCounts::default(),
            errors: vec![message],
            warnings: Vec::new(),
        }
    }
}

/// The report returned by [validate](crate::TransferEngine::validate).
///
/// Produced by a decode+extract pass with no persistence side effects.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Whether the file would import without any row errors.
    pub valid: bool,
    /// Data rows in the file, valid or not.
    pub row_count: usize,
    /// The entities a real import would attempt to create, before
    /// deduplication against the store.
    pub estimated_entities: EntityCounts,
    /// Non-fatal observations.
    pub warnings: Vec<String>,
    /// Fatal and row-scoped error messages.
    pub errors: Vec<String>,
}

/// The result of an export: the document plus its metadata envelope.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CsvExport {
    /// The CSV document with the canonical column order.
    pub text: String,
    /// The number of data rows in the document.
    pub row_count: usize,
    /// The size of the document in bytes.
    pub byte_size: usize,
}
