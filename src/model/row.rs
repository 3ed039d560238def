//! The flat record shared by both transfer directions.

use rust_decimal::Decimal;
use time::Date;

use crate::model::MovementType;

/// One flat CSV record mixing fields from up to nine logical entities.
///
/// The four transaction fields are always present; everything else is
/// optional and refers to related entities by name rather than by
/// identifier. A row is immutable once parsed.
#[derive(Clone, Debug, PartialEq)]
pub struct TransferRow {
    /// When the transaction happened.
    pub date: Date,
    /// The amount of money moved, always positive for expenses and incomes.
    pub amount: Decimal,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The cash-flow direction of the transaction.
    pub movement: MovementType,
    /// The ISO-4217 currency code of the transaction, if recorded.
    pub currency: Option<String>,
    /// Free-form notes attached to the transaction.
    pub notes: Option<String>,
    /// Whether the transaction has been settled.
    pub is_paid: Option<bool>,
    /// Whether the transaction recurs on a schedule.
    pub is_recurring: Option<bool>,
    /// The name of the account the transaction belongs to.
    pub account_name: Option<String>,
    /// The type of that account, e.g. "checking" or "brokerage".
    pub account_type: Option<String>,
    /// The currency of that account.
    pub account_currency: Option<String>,
    /// The name of the broker holding the account.
    pub broker_name: Option<String>,
    /// The name of the credit card the transaction was charged to.
    pub credit_card_name: Option<String>,
    /// The credit limit of that card.
    pub credit_card_limit: Option<Decimal>,
    /// The day of month the card's statement is due.
    pub credit_card_due_day: Option<u8>,
    /// The name of the transaction's category.
    pub category_name: Option<String>,
    /// The name of the category's parent, for two-level hierarchies.
    pub category_parent: Option<String>,
    /// The name of the vendor the money was paid to.
    pub vendor_name: Option<String>,
    /// The name of the subscription this transaction pays for.
    pub subscription_name: Option<String>,
    /// The recurring amount of that subscription.
    pub subscription_amount: Option<Decimal>,
    /// The billing cycle of that subscription, e.g. "monthly".
    pub subscription_cycle: Option<String>,
    /// When the subscription next falls due.
    pub subscription_next_due: Option<Date>,
    /// The name of the installment plan this transaction belongs to.
    pub installment_plan_name: Option<String>,
    /// The total number of installments in the plan.
    pub installment_total: Option<u32>,
    /// Which installment of the plan this transaction is.
    pub installment_number: Option<u32>,
    /// The source account of a transfer.
    pub from_account_name: Option<String>,
    /// The destination account of a transfer.
    pub to_account_name: Option<String>,
}

impl TransferRow {
    /// Create a row with only the required transaction fields set.
    pub fn new(date: Date, amount: Decimal, description: &str, movement: MovementType) -> Self {
        Self {
            date,
            amount,
            description: description.to_owned(),
            movement,
            ..Default::default()
        }
    }
}

// `time::Date` has no `Default`, so the blanket derive is not available.
impl Default for TransferRow {
    fn default() -> Self {
        Self {
            date: Date::MIN,
            amount: Decimal::ZERO,
            description: String::new(),
            movement: MovementType::default(),
            currency: None,
            notes: None,
            is_paid: None,
            is_recurring: None,
            account_name: None,
            account_type: None,
            account_currency: None,
            broker_name: None,
            credit_card_name: None,
            credit_card_limit: None,
            credit_card_due_day: None,
            category_name: None,
            category_parent: None,
            vendor_name: None,
            subscription_name: None,
            subscription_amount: None,
            subscription_cycle: None,
            subscription_next_due: None,
            installment_plan_name: None,
            installment_total: None,
            installment_number: None,
            from_account_name: None,
            to_account_name: None,
        }
    }
}
