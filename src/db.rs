//! Sets up the SQLite tables the transfer engine reads and writes.
//!
//! The engine stages all writes against a single `rusqlite` transaction and
//! only makes them visible when the orchestrator commits, so every table here
//! is created with plain `CREATE TABLE IF NOT EXISTS` and no triggers.

use rusqlite::{Connection, Transaction as SqlTransaction};

use crate::Error;

const TABLE_DEFINITIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS broker (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        UNIQUE(user_id, name)
    )",
    "CREATE TABLE IF NOT EXISTS account (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        broker_id INTEGER,
        account_type TEXT NOT NULL,
        currency TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        display_order INTEGER NOT NULL DEFAULT 0,
        UNIQUE(user_id, name),
        FOREIGN KEY(broker_id) REFERENCES broker(id) ON DELETE SET NULL
    )",
    "CREATE TABLE IF NOT EXISTS credit_card (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        account_id INTEGER,
        credit_limit TEXT,
        due_day INTEGER,
        UNIQUE(user_id, name),
        FOREIGN KEY(account_id) REFERENCES account(id) ON DELETE SET NULL
    )",
    "CREATE TABLE IF NOT EXISTS category (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        parent_id INTEGER,
        FOREIGN KEY(parent_id) REFERENCES category(id) ON DELETE SET NULL
    )",
    "CREATE TABLE IF NOT EXISTS vendor (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        UNIQUE(user_id, name)
    )",
    "CREATE TABLE IF NOT EXISTS subscription (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        vendor_id INTEGER,
        amount TEXT,
        billing_cycle TEXT,
        next_due TEXT,
        UNIQUE(user_id, name),
        FOREIGN KEY(vendor_id) REFERENCES vendor(id) ON DELETE SET NULL
    )",
    "CREATE TABLE IF NOT EXISTS installment_plan (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        name TEXT NOT NULL,
        total_installments INTEGER,
        UNIQUE(user_id, name)
    )",
    "CREATE TABLE IF NOT EXISTS \"transaction\" (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        date TEXT NOT NULL,
        amount TEXT NOT NULL,
        description TEXT NOT NULL,
        movement_type TEXT NOT NULL,
        currency TEXT,
        notes TEXT,
        is_paid INTEGER,
        is_recurring INTEGER,
        account_id INTEGER,
        credit_card_id INTEGER,
        category_id INTEGER,
        vendor_id INTEGER,
        subscription_id INTEGER,
        installment_plan_id INTEGER,
        installment_number INTEGER,
        from_account_id INTEGER,
        to_account_id INTEGER,
        is_deleted INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY(account_id) REFERENCES account(id) ON DELETE SET NULL,
        FOREIGN KEY(credit_card_id) REFERENCES credit_card(id) ON DELETE SET NULL,
        FOREIGN KEY(category_id) REFERENCES category(id) ON DELETE SET NULL,
        FOREIGN KEY(vendor_id) REFERENCES vendor(id) ON DELETE SET NULL,
        FOREIGN KEY(subscription_id) REFERENCES subscription(id) ON DELETE SET NULL,
        FOREIGN KEY(installment_plan_id) REFERENCES installment_plan(id) ON DELETE SET NULL,
        FOREIGN KEY(from_account_id) REFERENCES account(id) ON DELETE SET NULL,
        FOREIGN KEY(to_account_id) REFERENCES account(id) ON DELETE SET NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_transaction_dedup
        ON \"transaction\" (user_id, date, amount, description)",
];

/// Create the tables used by the transfer engine, if they do not exist.
///
/// # Errors
/// Returns an [Error::SqlError] if table creation fails.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction =
        SqlTransaction::new_unchecked(connection, rusqlite::TransactionBehavior::Exclusive)?;

    for definition in TABLE_DEFINITIONS {
        transaction.execute(definition, ())?;
    }

    transaction.commit()?;

    Ok(())
}
