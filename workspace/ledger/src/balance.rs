//! The balance ledger: the sole path through which transaction mutations
//! reach account balances.
//!
//! Every operation runs inside one database transaction. Balance
//! adjustments are SQL-level increments (`balance = balance + Δ`), so two
//! concurrent mutations on one account cannot lose an update, and the
//! invariant `balance == Σ transaction.amount` is re-verified before each
//! commit.

use chrono::NaiveDate;
use model::entities::{account, tag, transaction, transaction_tag};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};
use tracing::{debug, info, instrument, warn};

use crate::alerts::{self, TriggeredAlert};
use crate::error::{LedgerError, Result};

/// Input for a new ledger entry.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub account_id: i32,
    pub date: NaiveDate,
    /// Signed: positive inflow, negative outflow. Zero is rejected.
    pub amount: Decimal,
    pub payee: String,
    pub category_id: Option<i32>,
    pub notes: Option<String>,
    pub tag_ids: Vec<i32>,
    pub is_imported: bool,
    /// Bank-feed identifier for de-duplication; unique per account.
    pub external_id: Option<String>,
}

/// Partial update. `category_id` and `notes` use a double Option so the
/// caller can distinguish "leave alone" from "clear".
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub account_id: Option<i32>,
    pub date: Option<NaiveDate>,
    pub amount: Option<Decimal>,
    pub payee: Option<String>,
    pub category_id: Option<Option<i32>>,
    pub notes: Option<Option<String>>,
}

/// A committed mutation plus any budget alerts it tripped.
#[derive(Debug)]
pub struct MutationOutcome {
    pub transaction: transaction::Model,
    pub triggered_alerts: Vec<TriggeredAlert>,
}

/// Inserts a transaction and increments the owning account's balance by
/// its amount, as one atomic unit. Budget alerts for the affected
/// (category, month) are evaluated inside the same unit of work.
#[instrument(skip(db, input), fields(account_id = input.account_id, amount = %input.amount))]
pub async fn create_transaction(
    db: &DatabaseConnection,
    user_id: i32,
    input: NewTransaction,
) -> Result<MutationOutcome> {
    let txn = db.begin().await?;
    let outcome = create_transaction_in(&txn, user_id, input).await?;
    txn.commit().await?;
    info!(
        transaction_id = outcome.transaction.id,
        alerts = outcome.triggered_alerts.len(),
        "Transaction created"
    );
    Ok(outcome)
}

/// Same as [`create_transaction`] but runs inside a caller-supplied unit
/// of work. The recurrence scheduler uses this to commit a generated
/// transaction and the template's schedule advance together.
pub async fn create_transaction_in<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    input: NewTransaction,
) -> Result<MutationOutcome> {
    if input.amount.is_zero() {
        return Err(LedgerError::Validation(
            "transaction amount must not be zero".to_string(),
        ));
    }

    let account = owned_account(conn, user_id, input.account_id).await?;
    if !account.is_active {
        return Err(LedgerError::Conflict(format!(
            "account {} is archived",
            account.id
        )));
    }
    if let Some(category_id) = input.category_id {
        owned_category(conn, user_id, category_id).await?;
    }

    if let Some(external_id) = input.external_id.as_deref() {
        let duplicate = transaction::Entity::find()
            .filter(transaction::Column::AccountId.eq(input.account_id))
            .filter(transaction::Column::ExternalId.eq(external_id))
            .one(conn)
            .await?;
        if let Some(existing) = duplicate {
            warn!(
                external_id,
                existing_id = existing.id,
                "Duplicate import rejected"
            );
            return Err(LedgerError::Conflict(format!(
                "transaction with external id {external_id} already imported as {}",
                existing.id
            )));
        }
    }

    let inserted = transaction::ActiveModel {
        user_id: Set(user_id),
        account_id: Set(input.account_id),
        date: Set(input.date),
        amount: Set(input.amount),
        payee: Set(input.payee.clone()),
        category_id: Set(input.category_id),
        notes: Set(input.notes.clone()),
        is_imported: Set(input.is_imported),
        external_id: Set(input.external_id.clone()),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    link_tags(conn, user_id, inserted.id, &input.tag_ids).await?;

    apply_balance_delta(conn, input.account_id, input.amount).await?;
    verify_account_invariant(conn, input.account_id).await?;

    let triggered_alerts = match input.category_id {
        Some(category_id) => {
            alerts::check_alerts(conn, user_id, &[category_id], input.date).await?
        }
        None => Vec::new(),
    };

    Ok(MutationOutcome {
        transaction: inserted,
        triggered_alerts,
    })
}

/// Applies a partial update. An amount change adjusts the account balance
/// by the delta; moving the transaction to another account reverses it on
/// the old account and applies the new amount on the new one. Other field
/// changes never touch balances.
#[instrument(skip(db, patch))]
pub async fn update_transaction(
    db: &DatabaseConnection,
    user_id: i32,
    transaction_id: i32,
    patch: TransactionPatch,
) -> Result<MutationOutcome> {
    if let Some(amount) = patch.amount {
        if amount.is_zero() {
            return Err(LedgerError::Validation(
                "transaction amount must not be zero".to_string(),
            ));
        }
    }

    let txn = db.begin().await?;

    let existing = owned_transaction(&txn, user_id, transaction_id).await?;

    let old_account_id = existing.account_id;
    let old_amount = existing.amount;
    let old_category = existing.category_id;
    let old_date = existing.date;

    let new_account_id = patch.account_id.unwrap_or(old_account_id);
    let new_amount = patch.amount.unwrap_or(old_amount);
    let new_category = patch.category_id.unwrap_or(old_category);
    let new_date = patch.date.unwrap_or(old_date);

    if new_account_id != old_account_id {
        let target = owned_account(&txn, user_id, new_account_id).await?;
        if !target.is_active {
            return Err(LedgerError::Conflict(format!(
                "account {} is archived",
                target.id
            )));
        }
    }
    if let Some(Some(category_id)) = patch.category_id {
        owned_category(&txn, user_id, category_id).await?;
    }

    let mut active: transaction::ActiveModel = existing.into();
    if let Some(account_id) = patch.account_id {
        active.account_id = Set(account_id);
    }
    if let Some(date) = patch.date {
        active.date = Set(date);
    }
    if let Some(amount) = patch.amount {
        active.amount = Set(amount);
    }
    if let Some(payee) = patch.payee {
        active.payee = Set(payee);
    }
    if let Some(category_id) = patch.category_id {
        active.category_id = Set(category_id);
    }
    if let Some(notes) = patch.notes {
        active.notes = Set(notes);
    }
    let updated = active.update(&txn).await?;

    if new_account_id != old_account_id {
        apply_balance_delta(&txn, old_account_id, -old_amount).await?;
        apply_balance_delta(&txn, new_account_id, new_amount).await?;
        verify_account_invariant(&txn, old_account_id).await?;
        verify_account_invariant(&txn, new_account_id).await?;
    } else if new_amount != old_amount {
        apply_balance_delta(&txn, old_account_id, new_amount - old_amount).await?;
        verify_account_invariant(&txn, old_account_id).await?;
    }

    // Both the old and new (category, month) tuple may have changed
    // spending totals.
    let mut affected: Vec<(i32, NaiveDate)> = Vec::new();
    if let Some(category_id) = old_category {
        affected.push((category_id, common::month_start(old_date)));
    }
    if let Some(category_id) = new_category {
        let tuple = (category_id, common::month_start(new_date));
        if !affected.contains(&tuple) {
            affected.push(tuple);
        }
    }
    let mut triggered_alerts = Vec::new();
    for (category_id, month) in affected {
        triggered_alerts
            .extend(alerts::check_alerts(&txn, user_id, &[category_id], month).await?);
    }

    txn.commit().await?;
    debug!(transaction_id, "Transaction updated");
    Ok(MutationOutcome {
        transaction: updated,
        triggered_alerts,
    })
}

/// Removes a transaction and reverses its effect on the owning account's
/// balance, atomically.
#[instrument(skip(db))]
pub async fn delete_transaction(
    db: &DatabaseConnection,
    user_id: i32,
    transaction_id: i32,
) -> Result<Vec<TriggeredAlert>> {
    let txn = db.begin().await?;

    let existing = owned_transaction(&txn, user_id, transaction_id).await?;
    let account_id = existing.account_id;
    let amount = existing.amount;
    let category_id = existing.category_id;
    let date = existing.date;

    transaction::Entity::delete_by_id(existing.id).exec(&txn).await?;

    apply_balance_delta(&txn, account_id, -amount).await?;
    verify_account_invariant(&txn, account_id).await?;

    let triggered_alerts = match category_id {
        Some(category_id) => alerts::check_alerts(&txn, user_id, &[category_id], date).await?,
        None => Vec::new(),
    };

    txn.commit().await?;
    info!(transaction_id, "Transaction deleted");
    Ok(triggered_alerts)
}

/// Recomputes Σ amount for the account and compares it against the stored
/// balance. A mismatch is fatal for the surrounding operation.
pub async fn verify_account_invariant<C: ConnectionTrait>(
    conn: &C,
    account_id: i32,
) -> Result<Decimal> {
    let stored = account::Entity::find_by_id(account_id)
        .one(conn)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("account {account_id}")))?
        .balance;

    let total: Option<Option<Decimal>> = transaction::Entity::find()
        .select_only()
        .column_as(transaction::Column::Amount.sum(), "total")
        .filter(transaction::Column::AccountId.eq(account_id))
        .into_tuple()
        .one(conn)
        .await?;
    let computed = total.flatten().unwrap_or(Decimal::ZERO);

    if stored != computed {
        return Err(LedgerError::Invariant(format!(
            "account {account_id} balance {stored} diverges from transaction sum {computed}"
        )));
    }
    Ok(stored)
}

async fn apply_balance_delta<C: ConnectionTrait>(
    conn: &C,
    account_id: i32,
    delta: Decimal,
) -> Result<()> {
    account::Entity::update_many()
        .col_expr(
            account::Column::Balance,
            Expr::col(account::Column::Balance).add(delta),
        )
        .filter(account::Column::Id.eq(account_id))
        .exec(conn)
        .await?;
    Ok(())
}

async fn owned_account<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    account_id: i32,
) -> Result<account::Model> {
    account::Entity::find_by_id(account_id)
        .filter(account::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("account {account_id}")))
}

async fn owned_category<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    category_id: i32,
) -> Result<()> {
    use model::entities::category;
    category::Entity::find_by_id(category_id)
        .filter(category::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("category {category_id}")))?;
    Ok(())
}

async fn owned_transaction<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    transaction_id: i32,
) -> Result<transaction::Model> {
    transaction::Entity::find_by_id(transaction_id)
        .filter(transaction::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("transaction {transaction_id}")))
}

async fn link_tags<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    transaction_id: i32,
    tag_ids: &[i32],
) -> Result<()> {
    for tag_id in tag_ids {
        tag::Entity::find_by_id(*tag_id)
            .filter(tag::Column::UserId.eq(user_id))
            .one(conn)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("tag {tag_id}")))?;
        transaction_tag::ActiveModel {
            transaction_id: Set(transaction_id),
            tag_id: Set(*tag_id),
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use chrono::NaiveDate;
    use model::entities::{budget, budget_alert_threshold};
    use sea_orm::ActiveModelTrait;

    fn entry(account_id: i32, amount: Decimal, payee: &str) -> NewTransaction {
        NewTransaction {
            account_id,
            date: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            amount,
            payee: payee.to_string(),
            category_id: None,
            notes: None,
            tag_ids: Vec::new(),
            is_imported: false,
            external_id: None,
        }
    }

    async fn balance_of(db: &DatabaseConnection, account_id: i32) -> Decimal {
        account::Entity::find_by_id(account_id)
            .one(db)
            .await
            .unwrap()
            .unwrap()
            .balance
    }

    #[tokio::test]
    async fn balance_tracks_create_update_delete() {
        let (db, fixture) = testing::setup().await;
        let account = fixture.account_id;

        // Opening balance of 1000.00 is itself a ledger entry.
        create_transaction(
            &db,
            fixture.user_id,
            entry(account, Decimal::new(100000, 2), "Opening balance"),
        )
        .await
        .unwrap();
        assert_eq!(balance_of(&db, account).await, Decimal::new(100000, 2));

        let income = create_transaction(
            &db,
            fixture.user_id,
            entry(account, Decimal::new(50000, 2), "Employer"),
        )
        .await
        .unwrap();
        assert_eq!(balance_of(&db, account).await, Decimal::new(150000, 2));

        let expense = create_transaction(
            &db,
            fixture.user_id,
            entry(account, Decimal::new(-20000, 2), "Utility Co"),
        )
        .await
        .unwrap();
        assert_eq!(balance_of(&db, account).await, Decimal::new(130000, 2));

        // +500.00 -> +300.00 lowers the balance by 200.00.
        update_transaction(
            &db,
            fixture.user_id,
            income.transaction.id,
            TransactionPatch {
                amount: Some(Decimal::new(30000, 2)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(balance_of(&db, account).await, Decimal::new(110000, 2));

        // Deleting the expense reverses it.
        delete_transaction(&db, fixture.user_id, expense.transaction.id)
            .await
            .unwrap();
        assert_eq!(balance_of(&db, account).await, Decimal::new(130000, 2));

        verify_account_invariant(&db, account).await.unwrap();
    }

    #[tokio::test]
    async fn zero_amount_is_rejected() {
        let (db, fixture) = testing::setup().await;
        let err = create_transaction(
            &db,
            fixture.user_id,
            entry(fixture.account_id, Decimal::ZERO, "Nothing"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(balance_of(&db, fixture.account_id).await, Decimal::ZERO);
    }

    #[tokio::test]
    async fn foreign_account_is_not_found() {
        let (db, fixture) = testing::setup().await;
        let err = create_transaction(&db, fixture.user_id + 100, entry(fixture.account_id, Decimal::ONE, "X"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn moving_between_accounts_adjusts_both_balances() {
        let (db, fixture) = testing::setup().await;
        let savings = testing::seed_account(&db, fixture.user_id, "Savings").await;

        let tx = create_transaction(
            &db,
            fixture.user_id,
            entry(fixture.account_id, Decimal::new(-7500, 2), "Grocer"),
        )
        .await
        .unwrap();
        assert_eq!(
            balance_of(&db, fixture.account_id).await,
            Decimal::new(-7500, 2)
        );

        // Move and change the amount in the same patch.
        update_transaction(
            &db,
            fixture.user_id,
            tx.transaction.id,
            TransactionPatch {
                account_id: Some(savings),
                amount: Some(Decimal::new(-5000, 2)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(balance_of(&db, fixture.account_id).await, Decimal::ZERO);
        assert_eq!(balance_of(&db, savings).await, Decimal::new(-5000, 2));
        verify_account_invariant(&db, fixture.account_id).await.unwrap();
        verify_account_invariant(&db, savings).await.unwrap();
    }

    #[tokio::test]
    async fn payee_and_notes_edits_leave_balance_alone() {
        let (db, fixture) = testing::setup().await;
        let tx = create_transaction(
            &db,
            fixture.user_id,
            entry(fixture.account_id, Decimal::new(-1000, 2), "Cafe"),
        )
        .await
        .unwrap();

        update_transaction(
            &db,
            fixture.user_id,
            tx.transaction.id,
            TransactionPatch {
                payee: Some("Renamed Cafe".to_string()),
                notes: Some(Some("lunch".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(
            balance_of(&db, fixture.account_id).await,
            Decimal::new(-1000, 2)
        );
    }

    #[tokio::test]
    async fn duplicate_external_id_conflicts() {
        let (db, fixture) = testing::setup().await;
        let mut imported = entry(fixture.account_id, Decimal::new(-4200, 2), "Bank feed");
        imported.is_imported = true;
        imported.external_id = Some("stmt-0017".to_string());

        create_transaction(&db, fixture.user_id, imported.clone())
            .await
            .unwrap();
        let err = create_transaction(&db, fixture.user_id, imported)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
        assert_eq!(
            balance_of(&db, fixture.account_id).await,
            Decimal::new(-4200, 2)
        );
    }

    #[tokio::test]
    async fn categorized_spending_trips_budget_alerts() {
        let (db, fixture) = testing::setup().await;
        let month = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let b = budget::ActiveModel {
            user_id: Set(fixture.user_id),
            category_id: Set(fixture.category_id),
            month: Set(month),
            amount: Set(Decimal::from(100)),
            rollover: Set(false),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        budget_alert_threshold::ActiveModel {
            budget_id: Set(b.id),
            threshold_percent: Set(90),
            sent: Set(false),
            sent_at: Set(None),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let mut spend = entry(fixture.account_id, Decimal::from(-95), "Grocer");
        spend.category_id = Some(fixture.category_id);
        let outcome = create_transaction(&db, fixture.user_id, spend).await.unwrap();

        assert_eq!(outcome.triggered_alerts.len(), 1);
        assert_eq!(outcome.triggered_alerts[0].threshold_percent, 90);
    }
}
