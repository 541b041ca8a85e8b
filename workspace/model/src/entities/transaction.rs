use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;

use super::{account, category, tag};

/// A single ledger entry. Positive amounts are inflows, negative are
/// outflows. Rows reach this table only through the ledger engine, which
/// keeps the owning account's balance in step.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub account_id: i32,
    pub date: NaiveDate,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    pub payee: String,
    pub category_id: Option<i32>,
    pub notes: Option<String>,
    /// True when the row came from a file import or bank feed.
    #[sea_orm(default_value = "false")]
    pub is_imported: bool,
    /// Identifier from the originating bank feed, used to de-duplicate
    /// repeated imports. Unique per account when present.
    pub external_id: Option<String>,
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
    #[sea_orm(has_many = "super::transaction_tag::Entity")]
    TransactionTag,
}

impl Related<account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl Related<category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<tag::Entity> for Entity {
    fn to() -> RelationDef {
        super::transaction_tag::Relation::Tag.def()
    }
    fn via() -> Option<RelationDef> {
        Some(super::transaction_tag::Relation::Transaction.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
