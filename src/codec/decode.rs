//! Parses CSV text back into validated transfer rows.

use csv::StringRecord;
use rust_decimal::Decimal;
use time::Date;

use crate::{
    Error,
    model::{MovementType, TransferRow},
    schema::{HeaderIndex, validate_header},
};

use super::field::{
    parse_amount, parse_bool, parse_date, parse_due_day, parse_integer, strip_formula_guard,
};

/// A validated row together with its 1-based position among the data rows.
#[derive(Clone, Debug, PartialEq)]
pub struct NumberedRow {
    /// The 1-based data row ordinal, excluding the header.
    pub number: usize,
    /// The decoded row.
    pub row: TransferRow,
}

/// Everything decoding produced: the surviving rows plus diagnostics.
#[derive(Debug, Default)]
pub struct DecodeOutcome {
    /// Rows that passed validation, in file order.
    pub rows: Vec<NumberedRow>,
    /// One `"Row N: <reason>"` message per rejected row.
    pub errors: Vec<String>,
    /// Non-fatal observations, e.g. unknown columns.
    pub warnings: Vec<String>,
    /// The number of data rows in the file, valid or not.
    pub total_rows: usize,
}

/// Decode CSV `text` into validated rows and row-scoped errors.
///
/// A failure on one data row excludes that row and records a
/// `"Row N: <reason>"` message; decoding never aborts the whole file on a
/// single bad row.
///
/// # Errors
/// Returns [Error::EmptyFile] for a blank document and
/// [Error::MissingColumns] when the header lacks a required column. Both are
/// whole-file failures.
pub fn decode(text: &str) -> Result<DecodeOutcome, Error> {
    if text.trim().is_empty() {
        return Err(Error::EmptyFile);
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let header = reader
        .headers()
        .map_err(|error| Error::Csv(error.to_string()))?
        .clone();
    let (index, warnings) = validate_header(&header)?;

    let mut outcome = DecodeOutcome {
        warnings,
        ..Default::default()
    };

    for (position, record) in reader.records().enumerate() {
        let number = position + 1;
        outcome.total_rows += 1;

        let parsed = record
            .map_err(|error| error.to_string())
            .and_then(|record| parse_row(&index, &record));

        match parsed {
            Ok(row) => outcome.rows.push(NumberedRow { number, row }),
            Err(reason) => {
                tracing::debug!("rejected row {number}: {reason}");
                outcome.errors.push(format!("Row {number}: {reason}"));
            }
        }
    }

    Ok(outcome)
}

/// Validate and type-coerce a single data row.
fn parse_row(index: &HeaderIndex, record: &StringRecord) -> Result<TransferRow, String> {
    let date = parse_date(required(index, record, "transaction_date")?)?;
    let amount = parse_amount(required(index, record, "transaction_amount")?)?;
    let description = strip_formula_guard(required(index, record, "transaction_description")?);

    let movement_text = required(index, record, "movement_type")?;
    let movement = MovementType::parse(movement_text)
        .ok_or_else(|| format!("\"{movement_text}\" is not a valid movement type"))?;

    let mut row = TransferRow::new(date, amount, description, movement);

    row.currency = optional_text(index, record, "transaction_currency");
    row.notes = optional_text(index, record, "transaction_notes");
    row.is_paid = index.field(record, "is_paid").map(parse_bool);
    row.is_recurring = index.field(record, "is_recurring").map(parse_bool);

    row.account_name = optional_text(index, record, "account_name");
    row.account_type = optional_text(index, record, "account_type");
    row.account_currency = optional_text(index, record, "account_currency");
    row.broker_name = optional_text(index, record, "broker_name");

    row.credit_card_name = optional_text(index, record, "credit_card_name");
    row.credit_card_limit = optional_decimal(index, record, "credit_card_limit")?;
    row.credit_card_due_day = index
        .field(record, "credit_card_due_day")
        .map(parse_due_day)
        .transpose()?;

    row.category_name = optional_text(index, record, "category_name");
    row.category_parent = optional_text(index, record, "category_parent");
    row.vendor_name = optional_text(index, record, "vendor_name");

    row.subscription_name = optional_text(index, record, "subscription_name");
    row.subscription_amount = optional_decimal(index, record, "subscription_amount")?;
    row.subscription_cycle = optional_text(index, record, "subscription_cycle");
    row.subscription_next_due = optional_date(index, record, "subscription_next_due")?;

    row.installment_plan_name = optional_text(index, record, "installment_plan_name");
    row.installment_total = optional_integer(index, record, "installment_total")?;
    row.installment_number = optional_integer(index, record, "installment_number")?;

    row.from_account_name = optional_text(index, record, "from_account_name");
    row.to_account_name = optional_text(index, record, "to_account_name");

    validate_transfer_endpoints(&row)?;

    Ok(row)
}

/// Transfers must name two distinct endpoint accounts.
fn validate_transfer_endpoints(row: &TransferRow) -> Result<(), String> {
    if row.movement != MovementType::Transfer {
        return Ok(());
    }

    match (&row.from_account_name, &row.to_account_name) {
        (Some(from), Some(to)) if from == to => Err(format!(
            "a transfer cannot use the same account \"{from}\" as both source and destination"
        )),
        (Some(_), Some(_)) => Ok(()),
        _ => Err(
            "a transfer requires both from_account_name and to_account_name to be set".to_owned(),
        ),
    }
}

fn required<'a>(
    index: &HeaderIndex,
    record: &'a StringRecord,
    column: &str,
) -> Result<&'a str, String> {
    index
        .field(record, column)
        .ok_or_else(|| format!("missing required field {column}"))
}

fn optional_text(index: &HeaderIndex, record: &StringRecord, column: &str) -> Option<String> {
    index
        .field(record, column)
        .map(|value| strip_formula_guard(value).to_owned())
}

fn optional_decimal(
    index: &HeaderIndex,
    record: &StringRecord,
    column: &str,
) -> Result<Option<Decimal>, String> {
    index.field(record, column).map(parse_amount).transpose()
}

fn optional_date(
    index: &HeaderIndex,
    record: &StringRecord,
    column: &str,
) -> Result<Option<Date>, String> {
    index.field(record, column).map(parse_date).transpose()
}

fn optional_integer(
    index: &HeaderIndex,
    record: &StringRecord,
    column: &str,
) -> Result<Option<u32>, String> {
    index.field(record, column).map(parse_integer).transpose()
}

#[cfg(test)]
mod decode_tests {
    use rust_decimal::Decimal;
    use time::macros::date;

    use crate::{Error, model::MovementType};

    use super::decode;

    const HEADER: &str = "transaction_date,transaction_amount,transaction_description,\
        movement_type,category_name,category_parent,from_account_name,to_account_name";

    #[test]
    fn empty_file_is_a_hard_error() {
        assert_eq!(decode("").err(), Some(Error::EmptyFile));
        assert_eq!(decode("  \n ").err(), Some(Error::EmptyFile));
    }

    #[test]
    fn missing_required_column_is_a_hard_error() {
        let text = "transaction_date,transaction_description,movement_type\n\
            2025-01-01,Coffee,EXPENSE";

        let result = decode(text);

        assert_eq!(
            result.err(),
            Some(Error::MissingColumns("transaction_amount".to_owned()))
        );
    }

    #[test]
    fn decodes_a_valid_row() {
        let text = format!("{HEADER}\n2025-01-15,4.50,Coffee,expense,Dining,Food,,");

        let outcome = decode(&text).expect("Could not decode CSV");

        assert_eq!(outcome.total_rows, 1);
        assert!(outcome.errors.is_empty(), "got errors {:?}", outcome.errors);
        let row = &outcome.rows[0].row;
        assert_eq!(row.date, date!(2025 - 01 - 15));
        assert_eq!(row.amount, Decimal::new(450, 2));
        assert_eq!(row.description, "Coffee");
        assert_eq!(row.movement, MovementType::Expense);
        assert_eq!(row.category_name.as_deref(), Some("Dining"));
        assert_eq!(row.category_parent.as_deref(), Some("Food"));
    }

    #[test]
    fn bad_row_is_excluded_without_aborting_the_file() {
        let text = format!(
            "{HEADER}\n\
            2025-01-15,4.50,Coffee,EXPENSE,,,,\n\
            not-a-date,4.50,Tea,EXPENSE,,,,\n\
            2025-01-16,5.00,Lunch,EXPENSE,,,,"
        );

        let outcome = decode(&text).expect("Could not decode CSV");

        assert_eq!(outcome.total_rows, 3);
        assert_eq!(outcome.rows.len(), 2);
        assert_eq!(outcome.errors.len(), 1);
        assert!(
            outcome.errors[0].starts_with("Row 2:"),
            "error should name row 2: {}",
            outcome.errors[0]
        );
        assert_eq!(outcome.rows[0].number, 1);
        assert_eq!(outcome.rows[1].number, 3);
    }

    #[test]
    fn invalid_movement_type_is_a_row_error() {
        let text = format!("{HEADER}\n2025-01-15,4.50,Coffee,withdrawal,,,,");

        let outcome = decode(&text).expect("Could not decode CSV");

        assert!(outcome.rows.is_empty());
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].contains("movement type"));
    }

    #[test]
    fn transfer_with_identical_endpoints_is_a_row_error() {
        let text = format!("{HEADER}\n2025-01-15,100.00,Top up,TRANSFER,,,Everyday,Everyday");

        let outcome = decode(&text).expect("Could not decode CSV");

        assert!(outcome.rows.is_empty());
        assert_eq!(outcome.errors.len(), 1);
        assert!(
            outcome.errors[0].contains("source and destination"),
            "unexpected error: {}",
            outcome.errors[0]
        );
    }

    #[test]
    fn transfer_missing_an_endpoint_is_a_row_error() {
        let text = format!("{HEADER}\n2025-01-15,100.00,Top up,TRANSFER,,,Everyday,");

        let outcome = decode(&text).expect("Could not decode CSV");

        assert!(outcome.rows.is_empty());
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn transfer_with_distinct_endpoints_is_accepted() {
        let text = format!("{HEADER}\n2025-01-15,100.00,Top up,TRANSFER,,,Everyday,Savings");

        let outcome = decode(&text).expect("Could not decode CSV");

        assert_eq!(outcome.rows.len(), 1);
        let row = &outcome.rows[0].row;
        assert_eq!(row.from_account_name.as_deref(), Some("Everyday"));
        assert_eq!(row.to_account_name.as_deref(), Some("Savings"));
    }

    #[test]
    fn unknown_columns_produce_warnings_not_errors() {
        let text = "transaction_date,transaction_amount,transaction_description,\
            movement_type,mystery\n\
            2025-01-15,4.50,Coffee,EXPENSE,whatever";

        let outcome = decode(text).expect("Could not decode CSV");

        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("mystery"));
    }

    #[test]
    fn strips_export_side_formula_guard() {
        let text = format!("{HEADER}\n2025-01-15,4.50,'=1+1,EXPENSE,,,,");

        let outcome = decode(&text).expect("Could not decode CSV");

        assert_eq!(outcome.rows[0].row.description, "=1+1");
    }

    #[test]
    fn short_rows_treat_missing_cells_as_empty() {
        let text = format!("{HEADER}\n2025-01-15,4.50,Coffee,EXPENSE");

        let outcome = decode(&text).expect("Could not decode CSV");

        assert_eq!(outcome.rows.len(), 1, "got errors {:?}", outcome.errors);
        assert_eq!(outcome.rows[0].row.category_name, None);
    }
}
