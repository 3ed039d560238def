//! Drives the export and import pipelines end to end.
//!
//! An import moves through a fixed sequence of phases: decoding, extracting,
//! creating entities, creating transactions, committing. Failure in any
//! phase rolls back every staged change; a partial commit is never visible.

use std::sync::{Arc, Mutex};

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::{
    Error, UserID,
    codec::{self, DecodeOutcome, NumberedRow},
    export::{self, ExportQuery},
    extract::{UniqueEntities, extract},
    model::{TransactionDraft, TransferRow},
    report::{CsvExport, EntityCounts, ImportReport, ImportStatistics, ImportStatus, ValidationReport},
    repository::{
        DuplicateMatcher, EntityKey, MatchDateAmountDescription, ReconciliationRepository,
        TransactionOutcome,
    },
};

/// The upload size ceiling, enforced before decoding begins.
///
/// The whole file is materialised in memory, so unbounded uploads would mean
/// unbounded memory growth.
pub const MAX_IMPORT_BYTES: usize = 50 * 1024 * 1024;

/// Caller-selected import behaviour.
#[derive(Clone, Copy, Debug, Default)]
pub struct ImportOptions {
    /// Tolerate row-level failures and tally them instead of aborting the
    /// run on the first one.
    pub skip_errors: bool,
    /// Stop after decoding and extraction; report counts without touching
    /// the store.
    pub validate_only: bool,
}

/// The pipeline phases, logged as the run progresses.
#[derive(Clone, Copy, Debug)]
enum Phase {
    Decoding,
    Extracting,
    CreatingEntities,
    CreatingTransactions,
    Committing,
}

fn enter(phase: Phase) {
    tracing::debug!("import phase: {phase:?}");
}

/// The transfer engine: CSV export, import and validation over one store.
///
/// Each operation is a single linear, synchronous pipeline scoped to one
/// call. Two simultaneous imports for the same user are not coordinated and
/// may race on duplicate detection; dedup is best-effort, not a strict
/// guarantee.
pub struct TransferEngine {
    connection: Arc<Mutex<Connection>>,
    matcher: Box<dyn DuplicateMatcher + Send + Sync>,
}

impl TransferEngine {
    /// Create an engine with the default duplicate heuristic.
    pub fn new(connection: Arc<Mutex<Connection>>) -> Self {
        Self::with_matcher(connection, Box::new(MatchDateAmountDescription))
    }

    /// Create an engine with a custom duplicate-matching strategy.
    pub fn with_matcher(
        connection: Arc<Mutex<Connection>>,
        matcher: Box<dyn DuplicateMatcher + Send + Sync>,
    ) -> Self {
        Self { connection, matcher }
    }

    /// Export a user's transactions as a CSV document.
    ///
    /// Each transaction is flattened together with its resolved
    /// relationships into one row.
    ///
    /// # Errors
    /// Returns an [Error::SqlError] if the fetch fails or [Error::Csv] if
    /// encoding fails. The fetch is read-only, so no cleanup is needed on
    /// failure and no file is retained.
    pub fn export(&self, user_id: UserID, query: &ExportQuery) -> Result<CsvExport, Error> {
        let connection = self.connection.lock().map_err(|_| Error::DatabaseLock)?;

        let rows = export::fetch_rows(&connection, user_id, query)?;
        let text = codec::encode(&rows)?;

        tracing::info!(
            "exported {} rows ({} bytes) for user {user_id}",
            rows.len(),
            text.len()
        );

        Ok(CsvExport {
            row_count: rows.len(),
            byte_size: text.len(),
            text,
        })
    }

    /// Validate a CSV document without any persistence side effect.
    ///
    /// Runs the decode and extraction passes only, and reports what a real
    /// import would attempt.
    pub fn validate(&self, text: &str) -> ValidationReport {
        if text.len() > MAX_IMPORT_BYTES {
            return ValidationReport {
                valid: false,
                row_count: 0,
                estimated_entities: EntityCounts::default(),
                warnings: Vec::new(),
                errors: vec![Error::FileTooLarge(text.len()).to_string()],
            };
        }

        let outcome = match codec::decode(text) {
            Ok(outcome) => outcome,
            Err(error) => {
                return ValidationReport {
                    valid: false,
                    row_count: 0,
                    estimated_entities: EntityCounts::default(),
                    warnings: Vec::new(),
                    errors: vec![error.to_string()],
                };
            }
        };

        let rows = plain_rows(&outcome.rows);
        let entities = extract(&rows);

        ValidationReport {
            valid: outcome.errors.is_empty(),
            row_count: outcome.total_rows,
            estimated_entities: EntityCounts::estimate(&entities, outcome.rows.len()),
            warnings: outcome.warnings,
            errors: outcome.errors,
        }
    }

    /// Import a CSV document, reconstructing the user's financial graph.
    ///
    /// Run-level failures (missing header columns, oversized files, commit
    /// failures, row failures when `skip_errors` is off) come back as
    /// `Ok(report)` with [ImportStatus::Failed]; the caller never sees a raw
    /// exception and decides the transport status code from the report.
    ///
    /// # Errors
    /// Returns [Error::DatabaseLock] only when the store lock is poisoned.
    pub fn import(
        &self,
        user_id: UserID,
        text: &str,
        options: &ImportOptions,
    ) -> Result<ImportReport, Error> {
        if text.len() > MAX_IMPORT_BYTES {
            return Ok(ImportReport::failed(
                Error::FileTooLarge(text.len()).to_string(),
                ImportStatistics::default(),
            ));
        }

        enter(Phase::Decoding);
        let outcome = match codec::decode(text) {
            Ok(outcome) => outcome,
            Err(error) => {
                return Ok(ImportReport::failed(
                    error.to_string(),
                    ImportStatistics::default(),
                ));
            }
        };

        let statistics = ImportStatistics {
            total_rows: outcome.total_rows,
            error_rows: outcome.errors.len(),
            ..Default::default()
        };

        enter(Phase::Extracting);
        let rows = plain_rows(&outcome.rows);
        let entities = extract(&rows);

        // A dry run stops here regardless of row errors; the skip-errors
        // abort only applies once a real run would touch the store.
        if options.validate_only {
            tracing::info!("dry run for user {user_id}: {} rows", outcome.total_rows);
            return Ok(ImportReport {
                status: ImportStatus::Completed,
                statistics,
                entities_created: EntityCounts::estimate(&entities, outcome.rows.len()),
                errors: outcome.errors,
                warnings: outcome.warnings,
            });
        }

        if !options.skip_errors && !outcome.errors.is_empty() {
            let mut report = ImportReport::failed(outcome.errors[0].clone(), statistics);
            report.errors = outcome.errors;
            return Ok(report);
        }

        let connection = self.connection.lock().map_err(|_| Error::DatabaseLock)?;
        let tx = match connection.unchecked_transaction() {
            Ok(tx) => tx,
            Err(error) => {
                return Ok(ImportReport::failed(error.to_string(), statistics));
            }
        };

        let staged = stage(
            &tx,
            user_id,
            &outcome,
            &entities,
            options,
            self.matcher.as_ref(),
        );

        let report = match staged {
            Ok(report) => report,
            Err(error) => {
                // Dropping the transaction rolls back everything staged.
                drop(tx);
                tracing::warn!("import for user {user_id} failed and was rolled back: {error}");
                return Ok(ImportReport::failed(error.to_string(), statistics));
            }
        };

        enter(Phase::Committing);
        if let Err(error) = tx.commit() {
            tracing::error!("could not commit import for user {user_id}: {error}");
            return Ok(ImportReport::failed(error.to_string(), statistics));
        }

        tracing::info!(
            "import for user {user_id} committed: {} created, {} skipped, {} errors",
            report.statistics.processed_rows,
            report.statistics.skipped_rows,
            report.statistics.error_rows,
        );

        Ok(report)
    }
}

fn plain_rows(rows: &[NumberedRow]) -> Vec<TransferRow> {
    rows.iter().map(|numbered| numbered.row.clone()).collect()
}

/// Stage every entity and transaction against the unit of work.
///
/// Entity creation runs in dependency order; transaction creation only
/// begins after all entity creation has succeeded.
fn stage(
    tx: &SqlTransaction,
    user_id: UserID,
    outcome: &DecodeOutcome,
    entities: &UniqueEntities,
    options: &ImportOptions,
    matcher: &dyn DuplicateMatcher,
) -> Result<ImportReport, Error> {
    let mut warnings = outcome.warnings.clone();
    let mut errors = outcome.errors.clone();
    let mut statistics = ImportStatistics {
        total_rows: outcome.total_rows,
        error_rows: outcome.errors.len(),
        ..Default::default()
    };

    enter(Phase::CreatingEntities);
    let mut repo = ReconciliationRepository::new(tx, user_id);

    for broker in &entities.brokers {
        repo.find_or_create_broker(broker)?;
    }

    for account in &entities.accounts {
        repo.find_or_create_account(account)?;
    }

    for card in &entities.credit_cards {
        if repo.find_or_create_credit_card(card)?.is_none() {
            warnings.push(format!(
                "Credit card \"{}\" was skipped because its account reference could not be resolved",
                card.name
            ));
        }
    }

    // Two passes over a hierarchy capped at depth 2: parents (including
    // names that only ever appear as a parent reference) first, children
    // second.
    for category in &entities.categories {
        match &category.parent {
            Some(parent) => {
                repo.find_or_create_category(parent, None)?;
            }
            None => {
                repo.find_or_create_category(&category.name, None)?;
            }
        }
    }
    for category in &entities.categories {
        if let Some(parent) = &category.parent {
            let parent_id = repo.lookup(&EntityKey::Category(parent.clone()));
            repo.find_or_create_category(&category.name, parent_id)?;
        }
    }

    for vendor in &entities.vendors {
        repo.find_or_create_vendor(vendor)?;
    }

    for subscription in &entities.subscriptions {
        repo.find_or_create_subscription(subscription)?;
    }

    for plan in &entities.installment_plans {
        repo.find_or_create_installment_plan(plan)?;
    }

    enter(Phase::CreatingTransactions);
    for NumberedRow { number, row } in &outcome.rows {
        let draft = build_draft(row, *number, &repo, &mut warnings);

        match repo.create_transaction(&draft, matcher) {
            Ok(TransactionOutcome::Created(_)) => statistics.processed_rows += 1,
            Ok(TransactionOutcome::Duplicate(_)) => statistics.skipped_rows += 1,
            Err(error) => {
                if !options.skip_errors {
                    return Err(Error::RowFailed(*number, error.to_string()));
                }
                statistics.error_rows += 1;
                errors.push(format!("Row {number}: {error}"));
            }
        }
    }

    Ok(ImportReport {
        status: ImportStatus::Completed,
        statistics,
        entities_created: repo.created(),
        errors,
        warnings,
    })
}

/// Resolve a row's name references through the entity map and build the
/// staging draft. Unresolvable references are left unset with a warning,
/// never fatal.
fn build_draft(
    row: &TransferRow,
    number: usize,
    repo: &ReconciliationRepository,
    warnings: &mut Vec<String>,
) -> TransactionDraft {
    let mut resolve = |name: &Option<String>, kind: fn(String) -> EntityKey, what: &str| {
        let name = name.as_ref()?;
        let id = repo.lookup(&kind(name.clone()));

        if id.is_none() {
            tracing::warn!("row {number}: could not resolve {what} \"{name}\"");
            warnings.push(format!(
                "Row {number}: could not resolve {what} \"{name}\"; the field was left unset"
            ));
        }

        id
    };

    let mut draft = TransactionDraft::new(row.date, row.amount, &row.description, row.movement);
    draft.currency = row.currency.clone();
    draft.notes = row.notes.clone();
    draft.is_paid = row.is_paid;
    draft.is_recurring = row.is_recurring;
    draft.account_id = resolve(&row.account_name, EntityKey::Account, "account");
    draft.credit_card_id = resolve(&row.credit_card_name, EntityKey::CreditCard, "credit card");
    draft.category_id = resolve(&row.category_name, EntityKey::Category, "category");
    draft.vendor_id = resolve(&row.vendor_name, EntityKey::Vendor, "vendor");
    draft.subscription_id = resolve(&row.subscription_name, EntityKey::Subscription, "subscription");
    draft.installment_plan_id = resolve(
        &row.installment_plan_name,
        EntityKey::InstallmentPlan,
        "installment plan",
    );
    draft.installment_number = row.installment_number;
    draft.from_account_id = resolve(&row.from_account_name, EntityKey::Account, "account");
    draft.to_account_id = resolve(&row.to_account_name, EntityKey::Account, "account");

    draft
}
