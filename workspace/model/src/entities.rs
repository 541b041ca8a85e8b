//! This file serves as the root for all SeaORM entity modules.
//! The data model for the personal-finance ledger lives here: accounts,
//! transactions, budgets, goals, recurring templates, and the audit rows
//! for currency conversion runs.

pub mod account;
pub mod budget;
pub mod budget_alert_threshold;
pub mod category;
pub mod conversion_run;
pub mod goal;
pub mod recurring_template;
pub mod tag;
pub mod transaction;
pub mod transaction_tag;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::account::Entity as Account;
    pub use super::budget::Entity as Budget;
    pub use super::budget_alert_threshold::Entity as BudgetAlertThreshold;
    pub use super::category::Entity as Category;
    pub use super::conversion_run::Entity as ConversionRun;
    pub use super::goal::Entity as Goal;
    pub use super::recurring_template::Entity as RecurringTemplate;
    pub use super::tag::Entity as Tag;
    pub use super::transaction::Entity as Transaction;
    pub use super::transaction_tag::Entity as TransactionTag;
    pub use super::user::Entity as User;
}
