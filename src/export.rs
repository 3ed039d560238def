//! Fetches a user's transactions and flattens them into transfer rows.

use std::ops::RangeInclusive;

use rusqlite::{Connection, Row, params_from_iter, types::Value};
use rust_decimal::Decimal;
use time::Date;

use crate::{Error, UserID, model::MovementType, model::TransferRow};

/// Selects which transactions an export includes.
#[derive(Clone, Debug, Default)]
pub struct ExportQuery {
    /// Include transactions within this date range (inclusive). `None`
    /// exports the user's full history.
    pub date_range: Option<RangeInclusive<Date>>,
    /// Also include soft-deleted transactions.
    pub include_deleted: bool,
}

/// Fetch every matching transaction with its relationships resolved to
/// names, ordered by date then insertion order.
///
/// # Errors
/// Returns an [Error::SqlError] if the query fails.
pub(crate) fn fetch_rows(
    connection: &Connection,
    user_id: UserID,
    query: &ExportQuery,
) -> Result<Vec<TransferRow>, Error> {
    let mut sql = "SELECT
            t.date, t.amount, t.description, t.movement_type, t.currency, t.notes,
            t.is_paid, t.is_recurring,
            a.name, a.account_type, a.currency, b.name,
            cc.name, cc.credit_limit, cc.due_day,
            c.name, cp.name,
            v.name,
            s.name, s.amount, s.billing_cycle, s.next_due,
            ip.name, ip.total_installments, t.installment_number,
            fa.name, ta.name
        FROM \"transaction\" t
        LEFT JOIN account a ON a.id = t.account_id
        LEFT JOIN broker b ON b.id = a.broker_id
        LEFT JOIN credit_card cc ON cc.id = t.credit_card_id
        LEFT JOIN category c ON c.id = t.category_id
        LEFT JOIN category cp ON cp.id = c.parent_id
        LEFT JOIN vendor v ON v.id = t.vendor_id
        LEFT JOIN subscription s ON s.id = t.subscription_id
        LEFT JOIN installment_plan ip ON ip.id = t.installment_plan_id
        LEFT JOIN account fa ON fa.id = t.from_account_id
        LEFT JOIN account ta ON ta.id = t.to_account_id
        WHERE t.user_id = ?1"
        .to_owned();
    let mut parameters: Vec<Value> = vec![user_id.as_i64().into()];

    if !query.include_deleted {
        sql.push_str(" AND t.is_deleted = 0");
    }

    if let Some(date_range) = &query.date_range {
        sql.push_str(&format!(
            " AND t.date BETWEEN ?{} AND ?{}",
            parameters.len() + 1,
            parameters.len() + 2,
        ));
        parameters.push(date_range.start().to_string().into());
        parameters.push(date_range.end().to_string().into());
    }

    sql.push_str(" ORDER BY t.date ASC, t.id ASC");

    connection
        .prepare(&sql)?
        .query_map(params_from_iter(parameters.iter()), map_row)?
        .map(|row| row.map_err(Error::from))
        .collect()
}

/// Map one joined result row onto the flat transfer row shape.
fn map_row(row: &Row) -> Result<TransferRow, rusqlite::Error> {
    Ok(TransferRow {
        date: row.get(0)?,
        amount: decimal_column(row, 1)?,
        description: row.get(2)?,
        movement: movement_column(row, 3)?,
        currency: row.get(4)?,
        notes: row.get(5)?,
        is_paid: row.get(6)?,
        is_recurring: row.get(7)?,
        account_name: row.get(8)?,
        account_type: row.get(9)?,
        account_currency: row.get(10)?,
        broker_name: row.get(11)?,
        credit_card_name: row.get(12)?,
        credit_card_limit: optional_decimal_column(row, 13)?,
        credit_card_due_day: row.get(14)?,
        category_name: row.get(15)?,
        category_parent: row.get(16)?,
        vendor_name: row.get(17)?,
        subscription_name: row.get(18)?,
        subscription_amount: optional_decimal_column(row, 19)?,
        subscription_cycle: row.get(20)?,
        subscription_next_due: row.get(21)?,
        installment_plan_name: row.get(22)?,
        installment_total: row.get(23)?,
        installment_number: row.get(24)?,
        from_account_name: row.get(25)?,
        to_account_name: row.get(26)?,
    })
}

fn decimal_column(row: &Row, index: usize) -> Result<Decimal, rusqlite::Error> {
    let text: String = row.get(index)?;

    decimal_column_text(&text, index)
}

fn optional_decimal_column(row: &Row, index: usize) -> Result<Option<Decimal>, rusqlite::Error> {
    match row.get::<_, Option<String>>(index)? {
        Some(text) => decimal_column_text(&text, index).map(Some),
        None => Ok(None),
    }
}

fn decimal_column_text(text: &str, index: usize) -> Result<Decimal, rusqlite::Error> {
    text.parse::<Decimal>().map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            Box::new(error),
        )
    })
}

fn movement_column(row: &Row, index: usize) -> Result<MovementType, rusqlite::Error> {
    let text: String = row.get(index)?;

    MovementType::parse(&text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            format!("\"{text}\" is not a valid movement type").into(),
        )
    })
}
