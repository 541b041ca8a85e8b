pub mod accounts;
pub mod budgets;
pub mod categories;
pub mod conversion;
pub mod goals;
pub mod health;
pub mod recurring;
pub mod tags;
pub mod transactions;
pub mod users;
