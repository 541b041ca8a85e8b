use chrono::NaiveDateTime;
use sea_orm::entity::prelude::*;

/// One notification threshold for a budget (75%, 90%, 100%, ...).
/// `sent` flips true at most once per month until the budget's alerts
/// are reset.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "budget_alert_thresholds")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub budget_id: i32,
    /// Percentage of the budget amount at which this alert fires.
    pub threshold_percent: i32,
    #[sea_orm(default_value = "false")]
    pub sent: bool,
    pub sent_at: Option<NaiveDateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::budget::Entity",
        from = "Column::BudgetId",
        to = "super::budget::Column::Id",
        on_delete = "Cascade"
    )]
    Budget,
}

impl Related<super::budget::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budget.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
