//! The staging shape for a transaction about to be written to the store.

use rust_decimal::Decimal;
use time::Date;

use crate::{DatabaseID, model::MovementType};

/// A transaction with every name reference already resolved to a database ID.
///
/// Built by the orchestrator from a [TransferRow](crate::TransferRow) and the
/// run's entity map; unresolved references are simply left `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct TransactionDraft {
    /// When the transaction happened.
    pub date: Date,
    /// The amount of money moved.
    pub amount: Decimal,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The cash-flow direction of the transaction.
    pub movement: MovementType,
    /// The ISO-4217 currency code, if recorded.
    pub currency: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Whether the transaction has been settled.
    pub is_paid: Option<bool>,
    /// Whether the transaction recurs on a schedule.
    pub is_recurring: Option<bool>,
    /// The account the transaction belongs to.
    pub account_id: Option<DatabaseID>,
    /// The credit card the transaction was charged to.
    pub credit_card_id: Option<DatabaseID>,
    /// The transaction's category.
    pub category_id: Option<DatabaseID>,
    /// The vendor the money was paid to.
    pub vendor_id: Option<DatabaseID>,
    /// The subscription this transaction pays for.
    pub subscription_id: Option<DatabaseID>,
    /// The installment plan this transaction belongs to.
    pub installment_plan_id: Option<DatabaseID>,
    /// Which installment of the plan this transaction is.
    pub installment_number: Option<u32>,
    /// The source account of a transfer.
    pub from_account_id: Option<DatabaseID>,
    /// The destination account of a transfer.
    pub to_account_id: Option<DatabaseID>,
}

impl TransactionDraft {
    /// Create a draft with only the required transaction fields set.
    pub fn new(date: Date, amount: Decimal, description: &str, movement: MovementType) -> Self {
        Self {
            date,
            amount,
            description: description.to_owned(),
            movement,
            currency: None,
            notes: None,
            is_paid: None,
            is_recurring: None,
            account_id: None,
            credit_card_id: None,
            category_id: None,
            vendor_id: None,
            subscription_id: None,
            installment_plan_id: None,
            installment_number: None,
            from_account_id: None,
            to_account_id: None,
        }
    }
}
