//! Recurring-transaction scheduling: next-occurrence date math, the
//! due-generation pass, and the template state machine.
//!
//! Occurrence dates are computed strictly after an anchor (the last
//! generated date, or the start date for a fresh template), so a monthly
//! template starting January 31 first materializes on the last day of
//! February. The due-generation pass is idempotent for a fixed `as_of`:
//! `next_scheduled_date` only advances inside the same committed unit of
//! work as the generated transaction.

use chrono::{Datelike, Duration, NaiveDate};
use model::entities::recurring_template::{
    self, Frequency, TemplateStatus, LAST_DAY_OF_MONTH,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use tracing::{debug, error, info, instrument};

use crate::balance::{self, NewTransaction};
use crate::error::{LedgerError, Result};

/// The schedule parameters of a template, separated from the entity so
/// date math can run before a row exists.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    pub frequency: Frequency,
    /// Repeat every N periods; values below 1 are treated as 1.
    pub interval: i32,
    pub day_of_month: Option<i16>,
    pub day_of_week: Option<i16>,
}

impl From<&recurring_template::Model> for Schedule {
    fn from(t: &recurring_template::Model) -> Self {
        Self {
            frequency: t.frequency,
            interval: t.interval,
            day_of_month: t.day_of_month,
            day_of_week: t.day_of_week,
        }
    }
}

/// Outcome of one due-generation pass.
#[derive(Debug, Default)]
pub struct GenerationReport {
    /// Transactions materialized in this pass.
    pub generated: usize,
    /// Templates that transitioned to Completed.
    pub completed: usize,
    /// Per-template failures, isolated from their siblings.
    pub failed: Vec<(i32, String)>,
}

/// Computes the next occurrence strictly after `after`.
///
/// For Monthly/Yearly with an explicit day-of-month, the requested day is
/// clamped to the target month's length (31 in February resolves to
/// February's last day); the `LAST_DAY_OF_MONTH` sentinel always resolves
/// to the month's final calendar day. For Weekly/Biweekly with an explicit
/// day-of-week, an anchor already on that weekday steps a whole period,
/// while a misaligned anchor first advances to the next matching weekday.
pub fn next_occurrence(schedule: &Schedule, after: NaiveDate) -> NaiveDate {
    let interval = schedule.interval.max(1);
    match schedule.frequency {
        Frequency::Daily => after + Duration::days(interval as i64),
        Frequency::Weekly => next_weekly(after, schedule.day_of_week, interval, 1),
        Frequency::Biweekly => next_weekly(after, schedule.day_of_week, interval, 2),
        Frequency::Monthly => next_monthly(after, schedule.day_of_month, interval),
        Frequency::Yearly => {
            let base = common::add_months(after, 12 * interval);
            match schedule.day_of_month {
                Some(dom) => resolve_day_of_month(base.year(), base.month(), dom),
                None => base,
            }
        }
    }
}

fn next_weekly(after: NaiveDate, day_of_week: Option<i16>, interval: i32, weeks: i32) -> NaiveDate {
    let step = Duration::weeks((interval * weeks) as i64);
    match day_of_week {
        None => after + step,
        Some(target) => {
            let current = after.weekday().num_days_from_monday() as i16;
            let ahead = (target - current).rem_euclid(7) as i64;
            if ahead == 0 {
                after + step
            } else {
                // Re-align to the preferred weekday.
                after + Duration::days(ahead)
            }
        }
    }
}

fn next_monthly(after: NaiveDate, day_of_month: Option<i16>, interval: i32) -> NaiveDate {
    match day_of_month {
        None => common::add_months(after, interval),
        Some(dom) => {
            // The preferred day later in the anchor's own month comes
            // first; otherwise step `interval` months.
            let in_month = resolve_day_of_month(after.year(), after.month(), dom);
            if in_month > after {
                in_month
            } else {
                let base = common::add_months(common::month_start(after), interval);
                resolve_day_of_month(base.year(), base.month(), dom)
            }
        }
    }
}

fn resolve_day_of_month(year: i32, month: u32, dom: i16) -> NaiveDate {
    let last = common::last_day_of_month(year, month);
    if dom == LAST_DAY_OF_MONTH {
        return last;
    }
    let day = (dom.max(1) as u32).min(last.day());
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(last)
}

/// The first date a fresh template will generate on: the next occurrence
/// strictly after its start date, or None when that already exceeds the
/// end date.
pub fn first_scheduled_date(
    schedule: &Schedule,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
) -> Option<NaiveDate> {
    let next = next_occurrence(schedule, start_date);
    match end_date {
        Some(end) if next > end => None,
        _ => Some(next),
    }
}

/// Materializes a transaction for every ACTIVE template whose
/// `next_scheduled_date <= as_of`, catching up multiple missed
/// occurrences per template. Each occurrence commits atomically with the
/// template's schedule advance; a failure in one template is logged and
/// does not abort its siblings.
#[instrument(skip(db))]
pub async fn run_due_generation(
    db: &DatabaseConnection,
    as_of: NaiveDate,
) -> Result<GenerationReport> {
    let due = recurring_template::Entity::find()
        .filter(recurring_template::Column::Status.eq(TemplateStatus::Active))
        .filter(recurring_template::Column::NextScheduledDate.lte(as_of))
        .all(db)
        .await?;
    debug!(templates = due.len(), %as_of, "Due-generation pass starting");

    let mut report = GenerationReport::default();
    for template in due {
        match generate_for_template(db, &template, as_of).await {
            Ok((generated, completed)) => {
                report.generated += generated;
                if completed {
                    report.completed += 1;
                }
            }
            Err(e) => {
                error!(
                    template_id = template.id,
                    error = %e,
                    "Recurring generation failed; continuing with remaining templates"
                );
                report.failed.push((template.id, e.to_string()));
            }
        }
    }

    info!(
        generated = report.generated,
        completed = report.completed,
        failed = report.failed.len(),
        "Due-generation pass finished"
    );
    Ok(report)
}

/// Catches one template up to `as_of`. Returns how many transactions were
/// generated and whether the template completed.
async fn generate_for_template(
    db: &DatabaseConnection,
    template: &recurring_template::Model,
    as_of: NaiveDate,
) -> Result<(usize, bool)> {
    let schedule = Schedule::from(template);
    let mut current = template.clone();
    let mut generated = 0;

    while current.status == TemplateStatus::Active && current.next_scheduled_date <= as_of {
        let due_date = current.next_scheduled_date;
        let txn = db.begin().await?;

        let outcome = balance::create_transaction_in(
            &txn,
            current.user_id,
            NewTransaction {
                account_id: current.account_id,
                date: due_date,
                amount: current.amount,
                payee: current.payee.clone(),
                category_id: current.category_id,
                notes: None,
                tag_ids: Vec::new(),
                is_imported: false,
                external_id: None,
            },
        )
        .await?;

        let next = next_occurrence(&schedule, due_date);
        let past_end = current.end_date.is_some_and(|end| next > end);

        let mut active: recurring_template::ActiveModel = current.clone().into();
        active.last_generated_date = Set(Some(due_date));
        active.next_scheduled_date = Set(next);
        if past_end {
            active.status = Set(TemplateStatus::Completed);
        }
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        debug!(
            template_id = updated.id,
            transaction_id = outcome.transaction.id,
            %due_date,
            "Generated recurring transaction"
        );
        generated += 1;
        current = updated;
    }

    Ok((generated, current.status == TemplateStatus::Completed))
}

/// ACTIVE -> PAUSED. Generation skips paused templates; their schedule
/// pointer stays put.
#[instrument(skip(db))]
pub async fn pause(
    db: &DatabaseConnection,
    user_id: i32,
    template_id: i32,
) -> Result<recurring_template::Model> {
    transition(db, user_id, template_id, TemplateStatus::Paused, |status| {
        status == TemplateStatus::Active
    })
    .await
}

/// PAUSED -> ACTIVE. Missed occurrences are not regenerated;
/// `next_scheduled_date` stays where it was and catches up on the next
/// due-generation pass.
#[instrument(skip(db))]
pub async fn resume(
    db: &DatabaseConnection,
    user_id: i32,
    template_id: i32,
) -> Result<recurring_template::Model> {
    transition(db, user_id, template_id, TemplateStatus::Active, |status| {
        status == TemplateStatus::Paused
    })
    .await
}

/// Any non-terminal state -> CANCELLED. Irreversible; already-generated
/// transactions are untouched.
#[instrument(skip(db))]
pub async fn cancel(
    db: &DatabaseConnection,
    user_id: i32,
    template_id: i32,
) -> Result<recurring_template::Model> {
    transition(db, user_id, template_id, TemplateStatus::Cancelled, |status| {
        !status.is_terminal()
    })
    .await
}

async fn transition(
    db: &DatabaseConnection,
    user_id: i32,
    template_id: i32,
    to: TemplateStatus,
    allowed_from: impl Fn(TemplateStatus) -> bool,
) -> Result<recurring_template::Model> {
    let template = recurring_template::Entity::find_by_id(template_id)
        .filter(recurring_template::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or_else(|| LedgerError::NotFound(format!("recurring template {template_id}")))?;

    if !allowed_from(template.status) {
        return Err(LedgerError::Conflict(format!(
            "recurring template {template_id} cannot move from {:?} to {to:?}",
            template.status
        )));
    }

    let mut active: recurring_template::ActiveModel = template.into();
    active.status = Set(to);
    Ok(active.update(db).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use model::entities::{account, transaction};
    use rust_decimal::Decimal;
    use sea_orm::QueryOrder;

    fn monthly_last_day() -> Schedule {
        Schedule {
            frequency: Frequency::Monthly,
            interval: 1,
            day_of_month: Some(LAST_DAY_OF_MONTH),
            day_of_week: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monthly_last_day_tracks_true_month_ends() {
        let schedule = monthly_last_day();
        // Scenario: starting January 31 in a leap year.
        let next = next_occurrence(&schedule, date(2024, 1, 31));
        assert_eq!(next, date(2024, 2, 29));
        let next = next_occurrence(&schedule, next);
        assert_eq!(next, date(2024, 3, 31));
        let next = next_occurrence(&schedule, next);
        assert_eq!(next, date(2024, 4, 30));
        // Non-leap February.
        assert_eq!(
            next_occurrence(&schedule, date(2023, 1, 31)),
            date(2023, 2, 28)
        );
    }

    #[test]
    fn monthly_day_clamps_to_short_months() {
        let schedule = Schedule {
            frequency: Frequency::Monthly,
            interval: 1,
            day_of_month: Some(31),
            day_of_week: None,
        };
        assert_eq!(
            next_occurrence(&schedule, date(2023, 1, 31)),
            date(2023, 2, 28)
        );
        assert_eq!(
            next_occurrence(&schedule, date(2023, 4, 30)),
            date(2023, 5, 31)
        );
    }

    #[test]
    fn monthly_prefers_requested_day_within_anchor_month() {
        let schedule = Schedule {
            frequency: Frequency::Monthly,
            interval: 1,
            day_of_month: Some(15),
            day_of_week: None,
        };
        // Anchored on the 1st, the 15th of the same month comes first.
        assert_eq!(
            next_occurrence(&schedule, date(2024, 3, 1)),
            date(2024, 3, 15)
        );
        assert_eq!(
            next_occurrence(&schedule, date(2024, 3, 15)),
            date(2024, 4, 15)
        );
    }

    #[test]
    fn monthly_honors_interval() {
        let schedule = Schedule {
            frequency: Frequency::Monthly,
            interval: 3,
            day_of_month: None,
            day_of_week: None,
        };
        assert_eq!(
            next_occurrence(&schedule, date(2024, 1, 15)),
            date(2024, 4, 15)
        );
    }

    #[test]
    fn weekly_aligns_to_preferred_weekday() {
        let schedule = Schedule {
            frequency: Frequency::Weekly,
            interval: 1,
            day_of_month: None,
            day_of_week: Some(4), // Friday
        };
        // 2024-05-06 is a Monday; next Friday is May 10.
        assert_eq!(
            next_occurrence(&schedule, date(2024, 5, 6)),
            date(2024, 5, 10)
        );
        // Already on Friday: step a full week.
        assert_eq!(
            next_occurrence(&schedule, date(2024, 5, 10)),
            date(2024, 5, 17)
        );
    }

    #[test]
    fn biweekly_steps_two_weeks() {
        let schedule = Schedule {
            frequency: Frequency::Biweekly,
            interval: 1,
            day_of_month: None,
            day_of_week: None,
        };
        assert_eq!(
            next_occurrence(&schedule, date(2024, 5, 6)),
            date(2024, 5, 20)
        );
    }

    #[test]
    fn daily_and_yearly_step_whole_periods() {
        let daily = Schedule {
            frequency: Frequency::Daily,
            interval: 10,
            day_of_month: None,
            day_of_week: None,
        };
        assert_eq!(
            next_occurrence(&daily, date(2024, 12, 28)),
            date(2025, 1, 7)
        );

        let yearly = Schedule {
            frequency: Frequency::Yearly,
            interval: 1,
            day_of_month: None,
            day_of_week: None,
        };
        // Feb 29 anchors clamp in non-leap years.
        assert_eq!(
            next_occurrence(&yearly, date(2024, 2, 29)),
            date(2025, 2, 28)
        );
    }

    #[test]
    fn first_scheduled_date_respects_end_date() {
        let schedule = monthly_last_day();
        assert_eq!(
            first_scheduled_date(&schedule, date(2024, 1, 31), None),
            Some(date(2024, 2, 29))
        );
        assert_eq!(
            first_scheduled_date(&schedule, date(2024, 1, 31), Some(date(2024, 2, 15))),
            None
        );
    }

    async fn seed_template(
        db: &sea_orm::DatabaseConnection,
        fixture: &testing::Fixture,
        amount: Decimal,
        next: NaiveDate,
        end: Option<NaiveDate>,
    ) -> recurring_template::Model {
        recurring_template::ActiveModel {
            user_id: Set(fixture.user_id),
            account_id: Set(fixture.account_id),
            amount: Set(amount),
            payee: Set("Landlord".to_string()),
            category_id: Set(None),
            frequency: Set(Frequency::Monthly),
            interval: Set(1),
            start_date: Set(date(2024, 1, 31)),
            end_date: Set(end),
            day_of_month: Set(Some(LAST_DAY_OF_MONTH)),
            day_of_week: Set(None),
            status: Set(TemplateStatus::Active),
            next_scheduled_date: Set(next),
            last_generated_date: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to seed template")
    }

    #[tokio::test]
    async fn due_generation_catches_up_and_is_idempotent() {
        let (db, fixture) = testing::setup().await;
        // Due on Feb 29 and Mar 31; as_of Apr 1 catches up both.
        seed_template(&db, &fixture, Decimal::new(-120000, 2), date(2024, 2, 29), None).await;

        let as_of = date(2024, 4, 1);
        let report = run_due_generation(&db, as_of).await.unwrap();
        assert_eq!(report.generated, 2);
        assert!(report.failed.is_empty());

        let txs = transaction::Entity::find()
            .order_by_asc(transaction::Column::Date)
            .all(&db)
            .await
            .unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].date, date(2024, 2, 29));
        assert_eq!(txs[1].date, date(2024, 3, 31));

        let balance = account::Entity::find_by_id(fixture.account_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap()
            .balance;
        assert_eq!(balance, Decimal::new(-240000, 2));

        // Second pass with the same as_of generates nothing further.
        let report = run_due_generation(&db, as_of).await.unwrap();
        assert_eq!(report.generated, 0);
        let count = transaction::Entity::find().all(&db).await.unwrap().len();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn generation_completes_templates_past_end_date() {
        let (db, fixture) = testing::setup().await;
        let template = seed_template(
            &db,
            &fixture,
            Decimal::new(-5000, 2),
            date(2024, 2, 29),
            Some(date(2024, 3, 15)),
        )
        .await;

        let report = run_due_generation(&db, date(2024, 3, 1)).await.unwrap();
        assert_eq!(report.generated, 1);
        assert_eq!(report.completed, 1);

        let reloaded = recurring_template::Entity::find_by_id(template.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.status, TemplateStatus::Completed);
        assert_eq!(reloaded.last_generated_date, Some(date(2024, 2, 29)));
    }

    #[tokio::test]
    async fn failing_template_does_not_abort_siblings() {
        let (db, fixture) = testing::setup().await;
        // Zero amount fails validation inside generation.
        let broken =
            seed_template(&db, &fixture, Decimal::ZERO, date(2024, 2, 29), None).await;
        seed_template(&db, &fixture, Decimal::new(-5000, 2), date(2024, 2, 29), None).await;

        let report = run_due_generation(&db, date(2024, 3, 1)).await.unwrap();
        assert_eq!(report.generated, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, broken.id);

        let txs = transaction::Entity::find().all(&db).await.unwrap();
        assert_eq!(txs.len(), 1);
    }

    #[tokio::test]
    async fn paused_templates_do_not_generate_and_resume_catches_up() {
        let (db, fixture) = testing::setup().await;
        let template =
            seed_template(&db, &fixture, Decimal::new(-5000, 2), date(2024, 2, 29), None).await;

        pause(&db, fixture.user_id, template.id).await.unwrap();
        let report = run_due_generation(&db, date(2024, 3, 1)).await.unwrap();
        assert_eq!(report.generated, 0);

        resume(&db, fixture.user_id, template.id).await.unwrap();
        let report = run_due_generation(&db, date(2024, 3, 1)).await.unwrap();
        assert_eq!(report.generated, 1);
    }

    #[tokio::test]
    async fn state_machine_rejects_illegal_transitions() {
        let (db, fixture) = testing::setup().await;
        let template =
            seed_template(&db, &fixture, Decimal::new(-5000, 2), date(2024, 2, 29), None).await;

        // Resume only applies to paused templates.
        let err = resume(&db, fixture.user_id, template.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));

        cancel(&db, fixture.user_id, template.id).await.unwrap();
        let err = pause(&db, fixture.user_id, template.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
        let err = cancel(&db, fixture.user_id, template.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));

        // Cancelled templates never generate.
        let report = run_due_generation(&db, date(2024, 3, 1)).await.unwrap();
        assert_eq!(report.generated, 0);
    }
}
