//! Budget-threshold alert evaluation.
//!
//! `check_alerts` is deliberately a free function over any
//! [`ConnectionTrait`]: the balance ledger composes it into its own open
//! database transaction so alerts commit atomically with the mutation
//! that caused them, and tests drive it directly.

use chrono::{NaiveDate, Utc};
use model::entities::{budget, budget_alert_threshold, transaction};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use tracing::{debug, info, instrument};

use crate::error::Result;

/// One threshold crossing, returned to the caller for notification
/// delivery. The corresponding row is already marked sent.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredAlert {
    pub budget_id: i32,
    pub category_id: i32,
    pub month: NaiveDate,
    pub threshold_percent: i32,
    pub budget_amount: Decimal,
    pub spent: Decimal,
    pub percentage: Decimal,
}

/// Absolute spent total for a (user, category) in the month containing
/// `month`: the sum of outflow transactions, sign-flipped.
pub async fn spent_in_month<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    category_id: i32,
    month: NaiveDate,
) -> Result<Decimal> {
    let (start, end) = common::month_bounds(month);
    let total: Option<Option<Decimal>> = transaction::Entity::find()
        .select_only()
        .column_as(transaction::Column::Amount.sum(), "total")
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::CategoryId.eq(category_id))
        .filter(transaction::Column::Amount.lt(Decimal::ZERO))
        .filter(transaction::Column::Date.between(start, end))
        .into_tuple()
        .one(conn)
        .await?;
    Ok(total.flatten().unwrap_or(Decimal::ZERO).abs())
}

/// Evaluates every budget matching `(user, category ∈ category_ids,
/// month)` and fires any unsent thresholds the spent percentage has
/// reached. Fired thresholds are marked sent in the same pass and never
/// re-fire until [`reset_alerts`].
///
/// Several thresholds may fire in one call when spending jumps past more
/// than one of them between two checks.
#[instrument(skip(conn))]
pub async fn check_alerts<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    category_ids: &[i32],
    month: NaiveDate,
) -> Result<Vec<TriggeredAlert>> {
    if category_ids.is_empty() {
        return Ok(Vec::new());
    }
    let month = common::month_start(month);

    let budgets = budget::Entity::find()
        .filter(budget::Column::UserId.eq(user_id))
        .filter(budget::Column::CategoryId.is_in(category_ids.iter().copied()))
        .filter(budget::Column::Month.eq(month))
        .all(conn)
        .await?;

    let mut triggered = Vec::new();
    for b in budgets {
        let spent = spent_in_month(conn, user_id, b.category_id, month).await?;
        // A zero-amount budget never alerts.
        let percentage = if b.amount > Decimal::ZERO {
            spent / b.amount * Decimal::from(100)
        } else {
            Decimal::ZERO
        };
        debug!(
            budget_id = b.id,
            category_id = b.category_id,
            %spent,
            %percentage,
            "Evaluated budget spending"
        );

        let pending = budget_alert_threshold::Entity::find()
            .filter(budget_alert_threshold::Column::BudgetId.eq(b.id))
            .filter(budget_alert_threshold::Column::Sent.eq(false))
            .order_by_asc(budget_alert_threshold::Column::ThresholdPercent)
            .all(conn)
            .await?;

        for row in pending {
            if percentage < Decimal::from(row.threshold_percent) {
                continue;
            }
            let mut active: budget_alert_threshold::ActiveModel = row.clone().into();
            active.sent = Set(true);
            active.sent_at = Set(Some(Utc::now().naive_utc()));
            active.update(conn).await?;

            info!(
                budget_id = b.id,
                threshold = row.threshold_percent,
                %percentage,
                "Budget alert threshold crossed"
            );
            triggered.push(TriggeredAlert {
                budget_id: b.id,
                category_id: b.category_id,
                month,
                threshold_percent: row.threshold_percent,
                budget_amount: b.amount,
                spent,
                percentage,
            });
        }
    }

    Ok(triggered)
}

/// Puts every threshold of a budget back to unsent. Called when the
/// budget amount changes or a new month begins, so the same percentages
/// can alert again under the new baseline.
#[instrument(skip(conn))]
pub async fn reset_alerts<C: ConnectionTrait>(conn: &C, budget_id: i32) -> Result<u64> {
    let res = budget_alert_threshold::Entity::update_many()
        .col_expr(
            budget_alert_threshold::Column::Sent,
            sea_orm::sea_query::Expr::value(false),
        )
        .col_expr(
            budget_alert_threshold::Column::SentAt,
            sea_orm::sea_query::Expr::value(sea_orm::Value::ChronoDateTime(None)),
        )
        .filter(budget_alert_threshold::Column::BudgetId.eq(budget_id))
        .exec(conn)
        .await?;
    debug!(budget_id, rows = res.rows_affected, "Reset alert thresholds");
    Ok(res.rows_affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use chrono::NaiveDate;
    use model::entities::{budget, budget_alert_threshold, transaction};
    use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

    async fn seed_outflow(
        db: &DatabaseConnection,
        fixture: &testing::Fixture,
        amount: Decimal,
        date: NaiveDate,
    ) {
        transaction::ActiveModel {
            user_id: Set(fixture.user_id),
            account_id: Set(fixture.account_id),
            date: Set(date),
            amount: Set(amount),
            payee: Set("Shop".to_string()),
            category_id: Set(Some(fixture.category_id)),
            notes: Set(None),
            is_imported: Set(false),
            external_id: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to seed transaction");
    }

    async fn seed_budget(
        db: &DatabaseConnection,
        fixture: &testing::Fixture,
        amount: Decimal,
        thresholds: &[i32],
    ) -> i32 {
        let month = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let b = budget::ActiveModel {
            user_id: Set(fixture.user_id),
            category_id: Set(fixture.category_id),
            month: Set(month),
            amount: Set(amount),
            rollover: Set(false),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to seed budget");
        for t in thresholds {
            budget_alert_threshold::ActiveModel {
                budget_id: Set(b.id),
                threshold_percent: Set(*t),
                sent: Set(false),
                sent_at: Set(None),
                ..Default::default()
            }
            .insert(db)
            .await
            .expect("Failed to seed threshold");
        }
        b.id
    }

    #[tokio::test]
    async fn threshold_fires_once_per_crossing() {
        let (db, fixture) = testing::setup().await;
        let month = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        seed_budget(&db, &fixture, Decimal::from(1000), &[75]).await;

        // 700 spent: 70%, below the threshold.
        seed_outflow(
            &db,
            &fixture,
            Decimal::from(-700),
            NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
        )
        .await;
        let fired = check_alerts(&db, fixture.user_id, &[fixture.category_id], month)
            .await
            .unwrap();
        assert!(fired.is_empty());

        // 800 spent: 80%, threshold 75 fires.
        seed_outflow(
            &db,
            &fixture,
            Decimal::from(-100),
            NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
        )
        .await;
        let fired = check_alerts(&db, fixture.user_id, &[fixture.category_id], month)
            .await
            .unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].threshold_percent, 75);
        assert_eq!(fired[0].spent, Decimal::from(800));

        // Re-checking with unchanged spending fires nothing further.
        let fired = check_alerts(&db, fixture.user_id, &[fixture.category_id], month)
            .await
            .unwrap();
        assert!(fired.is_empty());
    }

    #[tokio::test]
    async fn multiple_thresholds_fire_in_one_pass() {
        let (db, fixture) = testing::setup().await;
        let month = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        seed_budget(&db, &fixture, Decimal::from(1000), &[75, 90, 100]).await;

        // Spending jumps straight past 90% and 100%.
        seed_outflow(
            &db,
            &fixture,
            Decimal::from(-1050),
            NaiveDate::from_ymd_opt(2024, 5, 4).unwrap(),
        )
        .await;
        let fired = check_alerts(&db, fixture.user_id, &[fixture.category_id], month)
            .await
            .unwrap();
        let percents: Vec<i32> = fired.iter().map(|a| a.threshold_percent).collect();
        assert_eq!(percents, vec![75, 90, 100]);
    }

    #[tokio::test]
    async fn zero_amount_budget_never_alerts() {
        let (db, fixture) = testing::setup().await;
        let month = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        seed_budget(&db, &fixture, Decimal::ZERO, &[75]).await;
        seed_outflow(
            &db,
            &fixture,
            Decimal::from(-500),
            NaiveDate::from_ymd_opt(2024, 5, 9).unwrap(),
        )
        .await;

        let fired = check_alerts(&db, fixture.user_id, &[fixture.category_id], month)
            .await
            .unwrap();
        assert!(fired.is_empty());
    }

    #[tokio::test]
    async fn inflows_do_not_count_as_spending() {
        let (db, fixture) = testing::setup().await;
        let month = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        seed_budget(&db, &fixture, Decimal::from(100), &[100]).await;

        // A refund larger than the budget must not trigger anything.
        seed_outflow(
            &db,
            &fixture,
            Decimal::from(250),
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
        )
        .await;
        let fired = check_alerts(&db, fixture.user_id, &[fixture.category_id], month)
            .await
            .unwrap();
        assert!(fired.is_empty());
    }

    #[tokio::test]
    async fn reset_allows_thresholds_to_fire_again() {
        let (db, fixture) = testing::setup().await;
        let month = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let budget_id = seed_budget(&db, &fixture, Decimal::from(1000), &[75]).await;
        seed_outflow(
            &db,
            &fixture,
            Decimal::from(-800),
            NaiveDate::from_ymd_opt(2024, 5, 5).unwrap(),
        )
        .await;

        let fired = check_alerts(&db, fixture.user_id, &[fixture.category_id], month)
            .await
            .unwrap();
        assert_eq!(fired.len(), 1);

        let reset = reset_alerts(&db, budget_id).await.unwrap();
        assert_eq!(reset, 1);

        let fired = check_alerts(&db, fixture.user_id, &[fixture.category_id], month)
            .await
            .unwrap();
        assert_eq!(fired.len(), 1, "threshold fires again after a reset");
    }
}
