//! The flat column model shared by CSV export and import.
//!
//! One CSV row mixes fields from up to nine logical entities. Only the four
//! transaction fields are required; every other column denotes a relationship
//! by name and may be left empty.

use std::collections::HashMap;

use csv::StringRecord;

use crate::Error;

/// The canonical, ordered list of columns the engine reads and writes.
///
/// Export emits exactly these columns in exactly this order. Import accepts
/// any superset: unknown columns are ignored with a warning and missing
/// optional columns default to empty.
pub const COLUMNS: &[&str] = &[
    "transaction_date",
    "transaction_amount",
    "transaction_description",
    "movement_type",
    "transaction_currency",
    "transaction_notes",
    "is_paid",
    "is_recurring",
    "account_name",
    "account_type",
    "account_currency",
    "broker_name",
    "credit_card_name",
    "credit_card_limit",
    "credit_card_due_day",
    "category_name",
    "category_parent",
    "vendor_name",
    "subscription_name",
    "subscription_amount",
    "subscription_cycle",
    "subscription_next_due",
    "installment_plan_name",
    "installment_total",
    "installment_number",
    "from_account_name",
    "to_account_name",
];

/// The columns a file must provide for any row to be processed.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "transaction_date",
    "transaction_amount",
    "transaction_description",
    "movement_type",
];

/// Maps canonical column names to their position in an uploaded file.
///
/// Built once per import from the header row and consulted for every data
/// row, so optional columns can live at any position or be absent entirely.
pub struct HeaderIndex {
    positions: HashMap<&'static str, usize>,
}

impl HeaderIndex {
    /// The position of a canonical `column` in the uploaded file, if present.
    pub fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }

    /// The trimmed value of a canonical `column` in `record`.
    ///
    /// Returns `None` when the column is absent from the file or the cell is
    /// empty, folding both cases into "not provided".
    pub fn field<'a>(&self, record: &'a StringRecord, column: &str) -> Option<&'a str> {
        self.position(column)
            .and_then(|index| record.get(index))
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

/// Validate the header row of an uploaded CSV file.
///
/// Returns the column positions and a warning for each unknown column.
///
/// # Errors
/// Returns [Error::MissingColumns] listing every absent required column.
/// This is a whole-file failure: the caller must not process any data rows.
pub fn validate_header(header: &StringRecord) -> Result<(HeaderIndex, Vec<String>), Error> {
    let mut positions = HashMap::new();
    let mut warnings = Vec::new();

    for (index, raw_name) in header.iter().enumerate() {
        let name = raw_name.trim();

        match COLUMNS.iter().find(|column| **column == name) {
            Some(column) => {
                positions.insert(*column, index);
            }
            None => {
                warnings.push(format!("Unknown column \"{name}\" will be ignored"));
            }
        }
    }

    let missing = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !positions.contains_key(**column))
        .copied()
        .collect::<Vec<_>>();

    if !missing.is_empty() {
        return Err(Error::MissingColumns(missing.join(", ")));
    }

    Ok((HeaderIndex { positions }, warnings))
}
