//! Derives the unique higher-level entities implied by a batch of rows.
//!
//! Extraction is pure and order-independent: the sets use structural
//! equality, so the same logical entity referenced on many rows collapses to
//! a single creation, and running extraction twice on the same rows yields
//! identical sets.

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use time::Date;

use crate::model::TransferRow;

/// The natural key of an account: name plus descriptive fields.
///
/// Accounts are looked up by name during reconciliation; the remaining
/// fields only provide defaults when the account has to be created.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct AccountKey {
    /// The account name.
    pub name: String,
    /// The broker holding the account, if named on the row.
    pub broker: Option<String>,
    /// The account type, e.g. "checking".
    pub account_type: Option<String>,
    /// The account currency.
    pub currency: Option<String>,
}

/// The natural key of a credit card.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct CreditCardKey {
    /// The card name.
    pub name: String,
    /// The account the card settles against, if named on the row.
    pub account: Option<String>,
    /// The credit limit, if provided.
    pub limit: Option<Decimal>,
    /// The statement due day, if provided.
    pub due_day: Option<u8>,
}

/// The natural key of a category: name plus optional parent name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct CategoryKey {
    /// The category name.
    pub name: String,
    /// The parent category name for two-level hierarchies.
    pub parent: Option<String>,
}

/// The natural key of a subscription.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubscriptionKey {
    /// The subscription name.
    pub name: String,
    /// The vendor billed for, if named on the row.
    pub vendor: Option<String>,
    /// The recurring amount.
    pub amount: Option<Decimal>,
    /// The billing cycle, e.g. "monthly".
    pub cycle: Option<String>,
    /// When the subscription next falls due.
    pub next_due: Option<Date>,
}

/// The natural key of an installment plan.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct InstallmentPlanKey {
    /// The plan name.
    pub name: String,
    /// The total number of installments.
    pub total: Option<u32>,
}

/// The unique entity sets derived from one batch of rows.
#[derive(Debug, Default, PartialEq)]
pub struct UniqueEntities {
    /// Broker names.
    pub brokers: BTreeSet<String>,
    /// Accounts, including implicit transfer endpoints.
    pub accounts: BTreeSet<AccountKey>,
    /// Credit cards.
    pub credit_cards: BTreeSet<CreditCardKey>,
    /// Categories, parents and children alike.
    pub categories: BTreeSet<CategoryKey>,
    /// Vendor names.
    pub vendors: BTreeSet<String>,
    /// Subscriptions.
    pub subscriptions: BTreeSet<SubscriptionKey>,
    /// Installment plans.
    pub installment_plans: BTreeSet<InstallmentPlanKey>,
}

/// Derive the unique entity sets implied by `rows`.
///
/// Transfer endpoints that were not otherwise declared as a named account
/// are synthesized as implicit accounts, so a transfer can create its own
/// endpoints.
pub fn extract(rows: &[TransferRow]) -> UniqueEntities {
    let mut entities = UniqueEntities::default();

    for row in rows {
        if let Some(broker) = &row.broker_name {
            entities.brokers.insert(broker.clone());
        }

        if let Some(name) = &row.account_name {
            entities.accounts.insert(AccountKey {
                name: name.clone(),
                broker: row.broker_name.clone(),
                account_type: row.account_type.clone(),
                currency: row.account_currency.clone(),
            });
        }

        if let Some(name) = &row.credit_card_name {
            entities.credit_cards.insert(CreditCardKey {
                name: name.clone(),
                account: row.account_name.clone(),
                limit: row.credit_card_limit,
                due_day: row.credit_card_due_day,
            });
        }

        if let Some(name) = &row.category_name {
            entities.categories.insert(CategoryKey {
                name: name.clone(),
                parent: row.category_parent.clone(),
            });
        }

        if let Some(vendor) = &row.vendor_name {
            entities.vendors.insert(vendor.clone());
        }

        if let Some(name) = &row.subscription_name {
            entities.subscriptions.insert(SubscriptionKey {
                name: name.clone(),
                vendor: row.vendor_name.clone(),
                amount: row.subscription_amount,
                cycle: row.subscription_cycle.clone(),
                next_due: row.subscription_next_due,
            });
        }

        if let Some(name) = &row.installment_plan_name {
            entities.installment_plans.insert(InstallmentPlanKey {
                name: name.clone(),
                total: row.installment_total,
            });
        }
    }

    synthesize_transfer_endpoints(rows, &mut entities);

    entities
}

/// Add an implicit account for every transfer endpoint that no row declared
/// as a named account.
fn synthesize_transfer_endpoints(rows: &[TransferRow], entities: &mut UniqueEntities) {
    let declared = entities
        .accounts
        .iter()
        .map(|account| account.name.clone())
        .collect::<BTreeSet<_>>();

    for row in rows {
        for endpoint in [&row.from_account_name, &row.to_account_name]
            .into_iter()
            .flatten()
        {
            if declared.contains(endpoint) {
                continue;
            }

            entities.accounts.insert(AccountKey {
                name: endpoint.clone(),
                broker: None,
                account_type: None,
                currency: row.currency.clone(),
            });
        }
    }
}

#[cfg(test)]
mod extract_tests {
    use rust_decimal::Decimal;
    use time::macros::date;

    use crate::model::{MovementType, TransferRow};

    use super::{AccountKey, CategoryKey, InstallmentPlanKey, SubscriptionKey, extract};

    fn expense_row(description: &str) -> TransferRow {
        TransferRow::new(
            date!(2025 - 02 - 01),
            Decimal::new(1000, 2),
            description,
            MovementType::Expense,
        )
    }

    #[test]
    fn collapses_repeated_entities_to_one() {
        let mut first = expense_row("Coffee");
        first.account_name = Some("Everyday".to_owned());
        first.broker_name = Some("Acme Securities".to_owned());
        first.vendor_name = Some("Birdy Bytes".to_owned());

        let mut second = expense_row("More coffee");
        second.account_name = Some("Everyday".to_owned());
        second.broker_name = Some("Acme Securities".to_owned());
        second.vendor_name = Some("Birdy Bytes".to_owned());

        let entities = extract(&[first, second]);

        assert_eq!(entities.brokers.len(), 1);
        assert_eq!(entities.accounts.len(), 1);
        assert_eq!(entities.vendors.len(), 1);
    }

    #[test]
    fn is_idempotent_and_order_independent() {
        let mut first = expense_row("Coffee");
        first.account_name = Some("Everyday".to_owned());
        first.category_name = Some("Dining".to_owned());

        let mut second = expense_row("Rent");
        second.account_name = Some("Bills".to_owned());
        second.category_name = Some("Housing".to_owned());

        let forward = extract(&[first.clone(), second.clone()]);
        let reversed = extract(&[second, first.clone()]);
        let again = extract(&[first.clone(), {
            let mut second = expense_row("Rent");
            second.account_name = Some("Bills".to_owned());
            second.category_name = Some("Housing".to_owned());
            second
        }]);

        assert_eq!(forward, reversed);
        assert_eq!(forward, again);
    }

    #[test]
    fn synthesizes_accounts_for_transfer_endpoints() {
        let mut transfer = TransferRow::new(
            date!(2025 - 02 - 01),
            Decimal::new(50000, 2),
            "Monthly savings",
            MovementType::Transfer,
        );
        transfer.from_account_name = Some("Everyday".to_owned());
        transfer.to_account_name = Some("Savings".to_owned());

        let mut declared = expense_row("Coffee");
        declared.account_name = Some("Everyday".to_owned());
        declared.account_type = Some("checking".to_owned());

        let entities = extract(&[declared, transfer]);

        assert_eq!(entities.accounts.len(), 2);
        assert!(
            entities.accounts.contains(&AccountKey {
                name: "Savings".to_owned(),
                broker: None,
                account_type: None,
                currency: None,
            }),
            "implicit Savings account should be synthesized: {:?}",
            entities.accounts
        );
        // The declared Everyday account must not be duplicated by the
        // transfer endpoint of the same name.
        assert_eq!(
            entities
                .accounts
                .iter()
                .filter(|account| account.name == "Everyday")
                .count(),
            1
        );
    }

    #[test]
    fn keeps_parent_and_child_categories_distinct() {
        let mut child = expense_row("Rent");
        child.category_name = Some("Rent".to_owned());
        child.category_parent = Some("Housing".to_owned());

        let mut parent = expense_row("Rates");
        parent.category_name = Some("Housing".to_owned());

        let entities = extract(&[child, parent]);

        assert!(entities.categories.contains(&CategoryKey {
            name: "Rent".to_owned(),
            parent: Some("Housing".to_owned()),
        }));
        assert!(entities.categories.contains(&CategoryKey {
            name: "Housing".to_owned(),
            parent: None,
        }));
    }

    #[test]
    fn collapses_repeated_subscriptions_and_installment_plans() {
        let mut january = expense_row("Streaming");
        january.vendor_name = Some("Streamflix Ltd".to_owned());
        january.subscription_name = Some("Streamflix".to_owned());
        january.subscription_amount = Some(Decimal::new(1999, 2));
        january.subscription_cycle = Some("monthly".to_owned());
        january.subscription_next_due = Some(date!(2025 - 02 - 15));

        let mut february = january.clone();
        february.description = "Streaming again".to_owned();

        let mut first_installment = expense_row("Phone installment");
        first_installment.installment_plan_name = Some("Phone".to_owned());
        first_installment.installment_total = Some(12);
        first_installment.installment_number = Some(1);

        let mut second_installment = first_installment.clone();
        second_installment.installment_number = Some(2);

        let entities = extract(&[january, february, first_installment, second_installment]);

        assert_eq!(entities.subscriptions.len(), 1);
        assert!(entities.subscriptions.contains(&SubscriptionKey {
            name: "Streamflix".to_owned(),
            vendor: Some("Streamflix Ltd".to_owned()),
            amount: Some(Decimal::new(1999, 2)),
            cycle: Some("monthly".to_owned()),
            next_due: Some(date!(2025 - 02 - 15)),
        }));
        // The installment number varies per row but the plan is one entity.
        assert_eq!(entities.installment_plans.len(), 1);
        assert!(entities.installment_plans.contains(&InstallmentPlanKey {
            name: "Phone".to_owned(),
            total: Some(12),
        }));
    }
}
