//! Find-or-create reconciliation against the persistent store.
//!
//! Every operation here runs against one `rusqlite` transaction: nothing is
//! visible to other connections until the orchestrator commits. Lookups are
//! memoized through the run-scoped entity map, so repeated calls with the
//! same natural key return the same staged or found record without hitting
//! the database again.

use std::collections::BTreeMap;

use rusqlite::{OptionalExtension, Transaction as SqlTransaction, params, params_from_iter};
use rust_decimal::Decimal;

use crate::{
    DatabaseID, Error, UserID,
    extract::{AccountKey, CreditCardKey, InstallmentPlanKey, SubscriptionKey},
    model::TransactionDraft,
    report::EntityCounts,
};

/// Account type assigned when a row does not provide one.
const DEFAULT_ACCOUNT_TYPE: &str = "checking";

/// Currency assigned when neither the row nor the account provides one.
const DEFAULT_CURRENCY: &str = "USD";

/// The natural key of an entity within one import run.
///
/// The entity kinds form a fixed, closed set; the orchestrator handles each
/// kind explicitly rather than dispatching dynamically.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum EntityKey {
    Broker(String),
    Account(String),
    CreditCard(String),
    Category(String),
    Vendor(String),
    Subscription(String),
    InstallmentPlan(String),
}

/// The outcome of staging one transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TransactionOutcome {
    /// A new transaction was staged.
    Created(DatabaseID),
    /// A matching transaction already exists; nothing was staged.
    Duplicate(DatabaseID),
}

/// Decides whether a draft matches a transaction that already exists.
///
/// The default heuristic is inherently approximate; substituting a stricter
/// or looser matcher does not require touching the orchestrator.
pub trait DuplicateMatcher {
    /// The ID of an existing non-deleted transaction matching `draft`, if
    /// any.
    fn find_duplicate(
        &self,
        tx: &SqlTransaction,
        user_id: UserID,
        draft: &TransactionDraft,
    ) -> Result<Option<DatabaseID>, Error>;
}

/// The default duplicate heuristic: same user, date, amount and description,
/// and the same account or credit-card reference when the draft carries one.
///
/// This is a best-effort property, not a strict uniqueness guarantee: two
/// genuinely distinct purchases with identical details will be collapsed.
pub struct MatchDateAmountDescription;

impl DuplicateMatcher for MatchDateAmountDescription {
    fn find_duplicate(
        &self,
        tx: &SqlTransaction,
        user_id: UserID,
        draft: &TransactionDraft,
    ) -> Result<Option<DatabaseID>, Error> {
        let mut sql = "SELECT id FROM \"transaction\"
            WHERE user_id = ?1 AND is_deleted = 0
              AND date = ?2 AND amount = ?3 AND description = ?4"
            .to_owned();
        let mut parameters: Vec<rusqlite::types::Value> = vec![
            user_id.as_i64().into(),
            draft.date.to_string().into(),
            amount_to_sql(&draft.amount).into(),
            draft.description.clone().into(),
        ];

        if let Some(account_id) = draft.account_id {
            sql.push_str(" AND account_id = ?5");
            parameters.push(account_id.into());
        } else if let Some(credit_card_id) = draft.credit_card_id {
            sql.push_str(" AND credit_card_id = ?5");
            parameters.push(credit_card_id.into());
        }

        sql.push_str(" LIMIT 1");

        let id = tx
            .prepare(&sql)?
            .query_row(params_from_iter(parameters.iter()), |row| row.get(0))
            .optional()?;

        Ok(id)
    }
}

/// The canonical text form used for money columns.
///
/// Amounts are rounded to two places and trailing zeros stripped so that the
/// same value always produces the same stored text, which the duplicate
/// heuristic relies on for equality.
pub(crate) fn amount_to_sql(amount: &Decimal) -> String {
    amount.round_dp(2).normalize().to_string()
}

/// Find-or-create operations for each entity type, scoped to one user and
/// one unit of work.
pub(crate) struct ReconciliationRepository<'tx> {
    tx: &'tx SqlTransaction<'tx>,
    user_id: UserID,
    entity_map: BTreeMap<EntityKey, DatabaseID>,
    created: EntityCounts,
}

impl<'tx> ReconciliationRepository<'tx> {
    pub fn new(tx: &'tx SqlTransaction<'tx>, user_id: UserID) -> Self {
        Self {
            tx,
            user_id,
            entity_map: BTreeMap::new(),
            created: EntityCounts::default(),
        }
    }

    /// The ID a natural key resolved to earlier in this run, if any.
    pub fn lookup(&self, key: &EntityKey) -> Option<DatabaseID> {
        self.entity_map.get(key).copied()
    }

    /// How many records of each type this run has created so far.
    pub fn created(&self) -> EntityCounts {
        self.created
    }

    pub fn find_or_create_broker(&mut self, name: &str) -> Result<DatabaseID, Error> {
        let key = EntityKey::Broker(name.to_owned());
        if let Some(id) = self.entity_map.get(&key) {
            return Ok(*id);
        }

        let existing = self
            .tx
            .query_row(
                "SELECT id FROM broker WHERE user_id = ?1 AND name = ?2",
                params![self.user_id, name],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => id,
            None => {
                self.tx.execute(
                    "INSERT INTO broker (user_id, name) VALUES (?1, ?2)",
                    params![self.user_id, name],
                )?;
                self.created.brokers += 1;
                self.tx.last_insert_rowid()
            }
        };

        self.entity_map.insert(key, id);
        Ok(id)
    }

    /// Find or create an account by name.
    ///
    /// A missing broker reference is itself resolved through
    /// [find_or_create_broker](Self::find_or_create_broker), so an account
    /// can bring its own broker into existence.
    pub fn find_or_create_account(&mut self, account: &AccountKey) -> Result<DatabaseID, Error> {
        let key = EntityKey::Account(account.name.clone());
        if let Some(id) = self.entity_map.get(&key) {
            return Ok(*id);
        }

        let broker_id = match &account.broker {
            Some(broker) => Some(self.find_or_create_broker(broker)?),
            None => None,
        };

        let existing = self
            .tx
            .query_row(
                "SELECT id FROM account WHERE user_id = ?1 AND name = ?2",
                params![self.user_id, account.name],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => id,
            None => {
                self.tx.execute(
                    "INSERT INTO account
                        (user_id, name, broker_id, account_type, currency, is_active, display_order)
                     VALUES (?1, ?2, ?3, ?4, ?5, 1, 0)",
                    params![
                        self.user_id,
                        account.name,
                        broker_id,
                        account.account_type.as_deref().unwrap_or(DEFAULT_ACCOUNT_TYPE),
                        account.currency.as_deref().unwrap_or(DEFAULT_CURRENCY),
                    ],
                )?;
                self.created.accounts += 1;
                self.tx.last_insert_rowid()
            }
        };

        self.entity_map.insert(key, id);
        Ok(id)
    }

    /// Find or create a credit card by name.
    ///
    /// Returns `Ok(None)` when the card's account reference cannot be
    /// resolved; the caller reports the skip as a warning.
    pub fn find_or_create_credit_card(
        &mut self,
        card: &CreditCardKey,
    ) -> Result<Option<DatabaseID>, Error> {
        let key = EntityKey::CreditCard(card.name.clone());
        if let Some(id) = self.entity_map.get(&key) {
            return Ok(Some(*id));
        }

        let account_id = card
            .account
            .as_ref()
            .and_then(|name| self.lookup(&EntityKey::Account(name.clone())));

        let Some(account_id) = account_id else {
            return Ok(None);
        };

        let existing = self
            .tx
            .query_row(
                "SELECT id FROM credit_card WHERE user_id = ?1 AND name = ?2",
                params![self.user_id, card.name],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => id,
            None => {
                self.tx.execute(
                    "INSERT INTO credit_card (user_id, name, account_id, credit_limit, due_day)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        self.user_id,
                        card.name,
                        account_id,
                        card.limit.as_ref().map(amount_to_sql),
                        card.due_day,
                    ],
                )?;
                self.created.credit_cards += 1;
                self.tx.last_insert_rowid()
            }
        };

        self.entity_map.insert(key, id);
        Ok(Some(id))
    }

    /// Find or create a category by name under `parent_id`.
    ///
    /// The entity map keys categories by name alone, so transaction rows can
    /// resolve a `category_name` reference without knowing the hierarchy.
    pub fn find_or_create_category(
        &mut self,
        name: &str,
        parent_id: Option<DatabaseID>,
    ) -> Result<DatabaseID, Error> {
        let key = EntityKey::Category(name.to_owned());
        if let Some(id) = self.entity_map.get(&key) {
            return Ok(*id);
        }

        let existing = self
            .tx
            .query_row(
                "SELECT id FROM category
                 WHERE user_id = ?1 AND name = ?2 AND parent_id IS ?3",
                params![self.user_id, name, parent_id],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => id,
            None => {
                self.tx.execute(
                    "INSERT INTO category (user_id, name, parent_id) VALUES (?1, ?2, ?3)",
                    params![self.user_id, name, parent_id],
                )?;
                self.created.categories += 1;
                self.tx.last_insert_rowid()
            }
        };

        self.entity_map.insert(key, id);
        Ok(id)
    }

    pub fn find_or_create_vendor(&mut self, name: &str) -> Result<DatabaseID, Error> {
        let key = EntityKey::Vendor(name.to_owned());
        if let Some(id) = self.entity_map.get(&key) {
            return Ok(*id);
        }

        let existing = self
            .tx
            .query_row(
                "SELECT id FROM vendor WHERE user_id = ?1 AND name = ?2",
                params![self.user_id, name],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => id,
            None => {
                self.tx.execute(
                    "INSERT INTO vendor (user_id, name) VALUES (?1, ?2)",
                    params![self.user_id, name],
                )?;
                self.created.vendors += 1;
                self.tx.last_insert_rowid()
            }
        };

        self.entity_map.insert(key, id);
        Ok(id)
    }

    pub fn find_or_create_subscription(
        &mut self,
        subscription: &SubscriptionKey,
    ) -> Result<DatabaseID, Error> {
        let key = EntityKey::Subscription(subscription.name.clone());
        if let Some(id) = self.entity_map.get(&key) {
            return Ok(*id);
        }

        let vendor_id = match &subscription.vendor {
            Some(vendor) => Some(self.find_or_create_vendor(vendor)?),
            None => None,
        };

        let existing = self
            .tx
            .query_row(
                "SELECT id FROM subscription WHERE user_id = ?1 AND name = ?2",
                params![self.user_id, subscription.name],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => id,
            None => {
                self.tx.execute(
                    "INSERT INTO subscription
                        (user_id, name, vendor_id, amount, billing_cycle, next_due)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        self.user_id,
                        subscription.name,
                        vendor_id,
                        subscription.amount.as_ref().map(amount_to_sql),
                        subscription.cycle,
                        subscription.next_due,
                    ],
                )?;
                self.created.subscriptions += 1;
                self.tx.last_insert_rowid()
            }
        };

        self.entity_map.insert(key, id);
        Ok(id)
    }

    pub fn find_or_create_installment_plan(
        &mut self,
        plan: &InstallmentPlanKey,
    ) -> Result<DatabaseID, Error> {
        let key = EntityKey::InstallmentPlan(plan.name.clone());
        if let Some(id) = self.entity_map.get(&key) {
            return Ok(*id);
        }

        let existing = self
            .tx
            .query_row(
                "SELECT id FROM installment_plan WHERE user_id = ?1 AND name = ?2",
                params![self.user_id, plan.name],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => id,
            None => {
                self.tx.execute(
                    "INSERT INTO installment_plan (user_id, name, total_installments)
                     VALUES (?1, ?2, ?3)",
                    params![self.user_id, plan.name, plan.total],
                )?;
                self.created.installment_plans += 1;
                self.tx.last_insert_rowid()
            }
        };

        self.entity_map.insert(key, id);
        Ok(id)
    }

    /// Stage a transaction unless `matcher` finds an existing duplicate.
    ///
    /// A duplicate is a no-op reported as skipped rather than an error; this
    /// is what makes repeated imports of overlapping exports idempotent.
    pub fn create_transaction(
        &mut self,
        draft: &TransactionDraft,
        matcher: &dyn DuplicateMatcher,
    ) -> Result<TransactionOutcome, Error> {
        if let Some(id) = matcher.find_duplicate(self.tx, self.user_id, draft)? {
            tracing::debug!(
                "skipping duplicate of transaction {id}: {} {} \"{}\"",
                draft.date,
                draft.amount,
                draft.description
            );
            return Ok(TransactionOutcome::Duplicate(id));
        }

        self.tx.execute(
            "INSERT INTO \"transaction\"
                (user_id, date, amount, description, movement_type, currency, notes,
                 is_paid, is_recurring, account_id, credit_card_id, category_id,
                 vendor_id, subscription_id, installment_plan_id, installment_number,
                 from_account_id, to_account_id, is_deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                     ?15, ?16, ?17, ?18, 0)",
            params![
                self.user_id,
                draft.date.to_string(),
                amount_to_sql(&draft.amount),
                draft.description,
                draft.movement.as_str(),
                draft.currency,
                draft.notes,
                draft.is_paid,
                draft.is_recurring,
                draft.account_id,
                draft.credit_card_id,
                draft.category_id,
                draft.vendor_id,
                draft.subscription_id,
                draft.installment_plan_id,
                draft.installment_number,
                draft.from_account_id,
                draft.to_account_id,
            ],
        )?;
        self.created.transactions += 1;

        Ok(TransactionOutcome::Created(self.tx.last_insert_rowid()))
    }
}
