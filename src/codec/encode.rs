//! Serializes transfer rows to CSV text.

use rust_decimal::Decimal;
use time::Date;

use crate::{Error, model::TransferRow, schema::COLUMNS};

use super::field::guard_formula;

/// Encode `rows` as CSV text with the canonical header and column order.
///
/// `None` fields become empty cells, booleans become lowercase
/// `true`/`false`, dates are ISO-8601 and decimals are written exactly with
/// no float rounding. String cells beginning with `=`, `+`, `-` or `@` are
/// prefixed with a quote character to neutralise formula injection.
///
/// # Errors
/// Returns an [Error::Csv] if the CSV writer fails, which should only
/// happen on allocation failure.
pub fn encode(rows: &[TransferRow]) -> Result<String, Error> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());

    writer.write_record(COLUMNS)?;

    for row in rows {
        writer.write_record(encode_row(row))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|error| Error::Csv(error.to_string()))?;

    String::from_utf8(bytes).map_err(|error| Error::Csv(error.to_string()))
}

/// Flatten one row into cells matching [COLUMNS] positionally.
fn encode_row(row: &TransferRow) -> Vec<String> {
    vec![
        row.date.to_string(),
        row.amount.to_string(),
        text(&row.description),
        row.movement.to_string(),
        optional_text(row.currency.as_deref()),
        optional_text(row.notes.as_deref()),
        optional_bool(row.is_paid),
        optional_bool(row.is_recurring),
        optional_text(row.account_name.as_deref()),
        optional_text(row.account_type.as_deref()),
        optional_text(row.account_currency.as_deref()),
        optional_text(row.broker_name.as_deref()),
        optional_text(row.credit_card_name.as_deref()),
        optional_decimal(row.credit_card_limit),
        optional_integer(row.credit_card_due_day.map(u32::from)),
        optional_text(row.category_name.as_deref()),
        optional_text(row.category_parent.as_deref()),
        optional_text(row.vendor_name.as_deref()),
        optional_text(row.subscription_name.as_deref()),
        optional_decimal(row.subscription_amount),
        optional_text(row.subscription_cycle.as_deref()),
        optional_date(row.subscription_next_due),
        optional_text(row.installment_plan_name.as_deref()),
        optional_integer(row.installment_total),
        optional_integer(row.installment_number),
        optional_text(row.from_account_name.as_deref()),
        optional_text(row.to_account_name.as_deref()),
    ]
}

fn text(value: &str) -> String {
    guard_formula(value).into_owned()
}

fn optional_text(value: Option<&str>) -> String {
    value.map(text).unwrap_or_default()
}

fn optional_bool(value: Option<bool>) -> String {
    value.map(|flag| flag.to_string()).unwrap_or_default()
}

fn optional_decimal(value: Option<Decimal>) -> String {
    value.map(|amount| amount.to_string()).unwrap_or_default()
}

fn optional_integer(value: Option<u32>) -> String {
    value.map(|number| number.to_string()).unwrap_or_default()
}

fn optional_date(value: Option<Date>) -> String {
    value.map(|date| date.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod encode_tests {
    use rust_decimal::Decimal;
    use time::macros::date;

    use crate::{
        model::{MovementType, TransferRow},
        schema::COLUMNS,
    };

    use super::encode;

    #[test]
    fn writes_canonical_header() {
        let text = encode(&[]).expect("Could not encode empty row list");

        let header = text.lines().next().expect("output should have a header");
        assert_eq!(header, COLUMNS.join(","));
    }

    #[test]
    fn encodes_required_fields_and_empty_optionals() {
        let row = TransferRow::new(
            date!(2025 - 06 - 01),
            Decimal::new(1234, 2),
            "Groceries",
            MovementType::Expense,
        );

        let text = encode(&[row]).expect("Could not encode row");
        let data_line = text.lines().nth(1).expect("output should have a data row");

        assert!(
            data_line.starts_with("2025-06-01,12.34,Groceries,EXPENSE,"),
            "unexpected data row: {data_line}"
        );
        let cell_count = data_line.split(',').count();
        assert_eq!(cell_count, COLUMNS.len(), "want {} cells", COLUMNS.len());
    }

    #[test]
    fn preserves_decimal_precision_exactly() {
        let mut row = TransferRow::new(
            date!(2025 - 06 - 01),
            "0.10".parse().unwrap(),
            "Ten cents",
            MovementType::Expense,
        );
        row.subscription_amount = Some("19.99".parse().unwrap());

        let text = encode(&[row]).expect("Could not encode row");
        let data_line = text.lines().nth(1).unwrap();
        let cells = data_line.split(',').collect::<Vec<_>>();

        assert_eq!(cells[1], "0.10");
        assert_eq!(cells[19], "19.99");
    }

    #[test]
    fn guards_formula_injection_in_string_cells() {
        let mut row = TransferRow::new(
            date!(2025 - 06 - 01),
            Decimal::ONE,
            "=1+1",
            MovementType::Expense,
        );
        row.vendor_name = Some("@evil".to_owned());

        let text = encode(&[row]).expect("Could not encode row");
        let data_line = text.lines().nth(1).unwrap();
        let cells = data_line.split(',').collect::<Vec<_>>();

        assert_eq!(cells[2], "'=1+1");
        assert_eq!(cells[17], "'@evil");
    }

    #[test]
    fn negative_amounts_are_not_guarded() {
        let row = TransferRow::new(
            date!(2025 - 06 - 01),
            Decimal::new(-500, 2),
            "Refund",
            MovementType::Income,
        );

        let text = encode(&[row]).expect("Could not encode row");
        let data_line = text.lines().nth(1).unwrap();

        assert!(
            data_line.contains(",-5.00,"),
            "amount cell should stay numeric: {data_line}"
        );
    }

    #[test]
    fn encodes_booleans_lowercase() {
        let mut row = TransferRow::new(
            date!(2025 - 06 - 01),
            Decimal::ONE,
            "Netflix",
            MovementType::Expense,
        );
        row.is_paid = Some(true);
        row.is_recurring = Some(false);

        let text = encode(&[row]).expect("Could not encode row");
        let data_line = text.lines().nth(1).unwrap();
        let cells = data_line.split(',').collect::<Vec<_>>();

        assert_eq!(cells[6], "true");
        assert_eq!(cells[7], "false");
    }
}
