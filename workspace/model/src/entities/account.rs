use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;

use super::user;

/// The kind of account
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum AccountKind {
    #[sea_orm(string_value = "Checking")]
    Checking,
    #[sea_orm(string_value = "Savings")]
    Savings,
    #[sea_orm(string_value = "Credit")]
    Credit,
    #[sea_orm(string_value = "Investment")]
    Investment,
    #[sea_orm(string_value = "Cash")]
    Cash,
}

/// A financial account: bank account, credit card, or cash wallet.
///
/// `balance` is maintained exclusively by the ledger engine and always
/// equals the sum of the account's transactions.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    /// Bank or institution the account lives at, if any.
    pub institution: Option<String>,
    pub kind: AccountKind,
    /// ISO 4217 currency code, e.g., "USD", "EUR". Matches the owning
    /// user's currency; rewritten by currency conversion.
    pub currency_code: String,
    /// Signed running balance. Mutated only through the ledger engine.
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub balance: Decimal,
    /// Accounts referenced by transactions are archived, never deleted.
    #[sea_orm(default_value = "true")]
    pub is_active: bool,
    /// Manually maintained vs. linked to a bank feed.
    #[sea_orm(default_value = "true")]
    pub is_manual: bool,
    pub last_synced_at: Option<NaiveDateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "user::Entity",
        from = "Column::UserId",
        to = "user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transaction,
    #[sea_orm(has_many = "super::recurring_template::Entity")]
    RecurringTemplate,
}

impl Related<user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
