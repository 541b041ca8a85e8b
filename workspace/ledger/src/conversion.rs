//! Whole-dataset currency conversion.
//!
//! Re-denominates every monetary figure a user owns into a new currency
//! as one all-or-nothing database transaction. Transactions use the
//! historical rate for their own date; account balances are then
//! recomputed as the sum of their converted transactions, never
//! rate-multiplied, so they cannot drift from the ledger invariant.
//! Budgets and goals are forward-looking and use the current-date rate.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use model::entities::conversion_run::{self, RunStatus};
use model::entities::{account, budget, goal, transaction, user};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::{error, info, instrument};

use crate::error::{LedgerError, Result};
use crate::rates::RateProvider;

/// Result of a completed conversion, surfaced to the caller and recorded
/// on the audit row.
#[derive(Debug, Clone)]
pub struct ConversionSummary {
    pub run_id: i32,
    pub from_currency: String,
    pub to_currency: String,
    /// The current-date rate applied to budgets and goals.
    pub rate: Decimal,
    pub transactions_converted: usize,
    pub accounts_converted: usize,
    pub budgets_converted: usize,
    pub goals_converted: usize,
    pub duration_ms: i64,
}

/// Cheap polling read; never mutates.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionStatus {
    InProgress {
        from_currency: String,
        to_currency: String,
        started_at: chrono::NaiveDateTime,
    },
    Idle,
}

/// Re-denominates the user's entire dataset into `to_currency`.
///
/// Rejects with `Conflict` while another run is in progress and with
/// `Validation` when the target currency is unknown or already current.
/// The IN_PROGRESS audit row commits before any rewriting starts, so
/// status polling and the exclusivity guard observe it immediately; the
/// rewrite itself is a single database transaction and a failure partway
/// (typically a rate-source outage) leaves the pre-conversion state
/// intact with the run marked FAILED.
#[instrument(skip(db, rates))]
pub async fn convert(
    db: &DatabaseConnection,
    rates: &dyn RateProvider,
    user_id: i32,
    to_currency: &str,
    today: NaiveDate,
) -> Result<ConversionSummary> {
    let to_currency = to_currency.to_uppercase();
    if !common::is_valid_currency(&to_currency) {
        return Err(LedgerError::Validation(format!(
            "unsupported currency code {to_currency}"
        )));
    }

    let user = user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("user {user_id}")))?;
    let from_currency = user.currency_code.clone();
    if from_currency == to_currency {
        return Err(LedgerError::Validation(format!(
            "dataset is already denominated in {to_currency}"
        )));
    }

    let run = begin_run(db, user_id, &from_currency, &to_currency).await?;
    info!(
        run_id = run.id,
        %from_currency,
        %to_currency,
        "Currency conversion started"
    );

    match rewrite_dataset(db, rates, &user, &to_currency, today).await {
        Ok(outcome) => {
            let completed_at = Utc::now().naive_utc();
            let duration_ms = (completed_at - run.started_at).num_milliseconds();

            let mut active: conversion_run::ActiveModel = run.clone().into();
            active.status = Set(RunStatus::Completed);
            active.transactions_converted = Set(outcome.transactions as i32);
            active.accounts_converted = Set(outcome.accounts as i32);
            active.budgets_converted = Set(outcome.budgets as i32);
            active.goals_converted = Set(outcome.goals as i32);
            active.rate = Set(Some(outcome.today_rate));
            active.completed_at = Set(Some(completed_at));
            active.update(db).await?;

            info!(
                run_id = run.id,
                transactions = outcome.transactions,
                accounts = outcome.accounts,
                budgets = outcome.budgets,
                goals = outcome.goals,
                duration_ms,
                "Currency conversion completed"
            );
            Ok(ConversionSummary {
                run_id: run.id,
                from_currency,
                to_currency,
                rate: outcome.today_rate,
                transactions_converted: outcome.transactions,
                accounts_converted: outcome.accounts,
                budgets_converted: outcome.budgets,
                goals_converted: outcome.goals,
                duration_ms,
            })
        }
        Err(e) => {
            error!(run_id = run.id, error = %e, "Currency conversion failed; no data was modified");
            let mut active: conversion_run::ActiveModel = run.into();
            active.status = Set(RunStatus::Failed);
            active.error_message = Set(Some(e.to_string()));
            active.completed_at = Set(Some(Utc::now().naive_utc()));
            active.update(db).await?;
            Err(e)
        }
    }
}

/// The exclusivity guard and the IN_PROGRESS marker insert run inside one
/// database transaction, so two near-simultaneous conversion requests
/// serialize on the datastore and the loser observes the winner's marker.
async fn begin_run(
    db: &DatabaseConnection,
    user_id: i32,
    from_currency: &str,
    to_currency: &str,
) -> Result<conversion_run::Model> {
    let txn = db.begin().await?;

    let in_progress = conversion_run::Entity::find()
        .filter(conversion_run::Column::UserId.eq(user_id))
        .filter(conversion_run::Column::Status.eq(RunStatus::InProgress))
        .one(&txn)
        .await?;
    if let Some(existing) = in_progress {
        return Err(LedgerError::Conflict(format!(
            "conversion run {} ({} -> {}) is already in progress",
            existing.id, existing.from_currency, existing.to_currency
        )));
    }

    let run = conversion_run::ActiveModel {
        user_id: Set(user_id),
        from_currency: Set(from_currency.to_string()),
        to_currency: Set(to_currency.to_string()),
        status: Set(RunStatus::InProgress),
        transactions_converted: Set(0),
        accounts_converted: Set(0),
        budgets_converted: Set(0),
        goals_converted: Set(0),
        rate: Set(None),
        started_at: Set(Utc::now().naive_utc()),
        completed_at: Set(None),
        error_message: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;
    Ok(run)
}

struct RewriteOutcome {
    transactions: usize,
    accounts: usize,
    budgets: usize,
    goals: usize,
    today_rate: Decimal,
}

async fn rewrite_dataset(
    db: &DatabaseConnection,
    rates: &dyn RateProvider,
    user: &user::Model,
    to_currency: &str,
    today: NaiveDate,
) -> Result<RewriteOutcome> {
    let from = user.currency_code.as_str();
    let txn = db.begin().await?;

    // Rates are cached per date within the run; a dataset with years of
    // daily transactions still fetches each date once.
    let mut rate_cache: HashMap<NaiveDate, Decimal> = HashMap::new();

    let txs = transaction::Entity::find()
        .filter(transaction::Column::UserId.eq(user.id))
        .all(&txn)
        .await?;
    let mut account_sums: HashMap<i32, Decimal> = HashMap::new();
    let mut transactions = 0;
    for tx in txs {
        let rate = match rate_cache.get(&tx.date) {
            Some(rate) => *rate,
            None => {
                let fetched = rates.rate(tx.date, from, to_currency).await?;
                rate_cache.insert(tx.date, fetched);
                fetched
            }
        };
        let converted = common::round_for_currency(tx.amount * rate, to_currency);
        let account_id = tx.account_id;

        let mut active: transaction::ActiveModel = tx.into();
        active.amount = Set(converted);
        active.update(&txn).await?;

        *account_sums.entry(account_id).or_insert(Decimal::ZERO) += converted;
        transactions += 1;
    }

    // Balances are recomputed from the converted transactions, never
    // multiplied by a single rate: different transactions used different
    // historical rates.
    let accounts_list = account::Entity::find()
        .filter(account::Column::UserId.eq(user.id))
        .all(&txn)
        .await?;
    let mut accounts = 0;
    for acc in accounts_list {
        let new_balance = account_sums.get(&acc.id).copied().unwrap_or(Decimal::ZERO);
        let mut active: account::ActiveModel = acc.into();
        active.balance = Set(new_balance);
        active.currency_code = Set(to_currency.to_string());
        active.update(&txn).await?;
        accounts += 1;
    }

    // Forward-looking figures take a single current-date rate.
    let today_rate = match rate_cache.get(&today) {
        Some(rate) => *rate,
        None => rates.rate(today, from, to_currency).await?,
    };

    let budgets_list = budget::Entity::find()
        .filter(budget::Column::UserId.eq(user.id))
        .all(&txn)
        .await?;
    let mut budgets = 0;
    for b in budgets_list {
        let converted = common::round_for_currency(b.amount * today_rate, to_currency);
        let mut active: budget::ActiveModel = b.into();
        active.amount = Set(converted);
        active.update(&txn).await?;
        budgets += 1;
    }

    let goals_list = goal::Entity::find()
        .filter(goal::Column::UserId.eq(user.id))
        .all(&txn)
        .await?;
    let mut goals = 0;
    for g in goals_list {
        let target = common::round_for_currency(g.target_amount * today_rate, to_currency);
        let current = common::round_for_currency(g.current_amount * today_rate, to_currency);
        let mut active: goal::ActiveModel = g.into();
        active.target_amount = Set(target);
        active.current_amount = Set(current);
        active.update(&txn).await?;
        goals += 1;
    }

    let mut active: user::ActiveModel = user.clone().into();
    active.currency_code = Set(to_currency.to_string());
    active.update(&txn).await?;

    txn.commit().await?;
    Ok(RewriteOutcome {
        transactions,
        accounts,
        budgets,
        goals,
        today_rate,
    })
}

/// Polling read for the conversion screen.
pub async fn get_status(db: &DatabaseConnection, user_id: i32) -> Result<ConversionStatus> {
    let in_progress = conversion_run::Entity::find()
        .filter(conversion_run::Column::UserId.eq(user_id))
        .filter(conversion_run::Column::Status.eq(RunStatus::InProgress))
        .order_by_desc(conversion_run::Column::StartedAt)
        .one(db)
        .await?;
    Ok(match in_progress {
        Some(run) => ConversionStatus::InProgress {
            from_currency: run.from_currency,
            to_currency: run.to_currency,
            started_at: run.started_at,
        },
        None => ConversionStatus::Idle,
    })
}

/// The last 10 runs, most recent first, including failures.
pub async fn get_history(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Vec<conversion_run::Model>> {
    Ok(conversion_run::Entity::find()
        .filter(conversion_run::Column::UserId.eq(user_id))
        .order_by_desc(conversion_run::Column::StartedAt)
        .order_by_desc(conversion_run::Column::Id)
        .limit(10)
        .all(db)
        .await?)
}
