use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;

use super::{account, category};

/// Sentinel for `day_of_month` meaning "the last calendar day of the
/// month", whatever its length.
pub const LAST_DAY_OF_MONTH: i16 = -1;

/// How often a template recurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
pub enum Frequency {
    #[sea_orm(string_value = "Daily")]
    Daily,
    #[sea_orm(string_value = "Weekly")]
    Weekly,
    #[sea_orm(string_value = "Biweekly")]
    Biweekly,
    #[sea_orm(string_value = "Monthly")]
    Monthly,
    #[sea_orm(string_value = "Yearly")]
    Yearly,
}

/// Lifecycle of a template. `Completed` and `Cancelled` are terminal;
/// only `Active` templates generate transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
pub enum TemplateStatus {
    #[sea_orm(string_value = "Active")]
    Active,
    #[sea_orm(string_value = "Paused")]
    Paused,
    #[sea_orm(string_value = "Completed")]
    Completed,
    #[sea_orm(string_value = "Cancelled")]
    Cancelled,
}

impl TemplateStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// A rule that materializes a concrete transaction on a schedule
/// (rent, salary, subscriptions). Cancellation is logical: templates with
/// generated history are never physically deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "recurring_templates")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub account_id: i32,
    /// Amount of each occurrence. Positive for income, negative for expense.
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    pub payee: String,
    pub category_id: Option<i32>,
    pub frequency: Frequency,
    /// Repeat every N periods (every 2 weeks, every 3 months, ...).
    pub interval: i32,
    pub start_date: NaiveDate,
    /// Last date an occurrence may fall on. None repeats indefinitely.
    pub end_date: Option<NaiveDate>,
    /// Preferred day for Monthly/Yearly, clamped to the month's length.
    /// `LAST_DAY_OF_MONTH` always resolves to the month's final day.
    pub day_of_month: Option<i16>,
    /// Preferred weekday for Weekly/Biweekly. 0 = Monday ... 6 = Sunday.
    pub day_of_week: Option<i16>,
    pub status: TemplateStatus,
    /// The occurrence the next due-generation pass will materialize.
    pub next_scheduled_date: NaiveDate,
    pub last_generated_date: Option<NaiveDate>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "account::Entity",
        from = "Column::AccountId",
        to = "account::Column::Id",
        on_delete = "Restrict"
    )]
    Account,
    #[sea_orm(
        belongs_to = "category::Entity",
        from = "Column::CategoryId",
        to = "category::Column::Id",
        on_delete = "SetNull"
    )]
    Category,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
