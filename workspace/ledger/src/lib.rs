//! The ledger consistency engine.
//!
//! Four tightly-coupled responsibilities over one monetary dataset:
//!
//! - [`balance`] keeps every account's stored balance equal to the sum of
//!   its transactions, for every mutation path.
//! - [`recurrence`] materializes transactions from recurring templates on
//!   a timer tick.
//! - [`conversion`] re-denominates a user's entire dataset into a new
//!   currency, atomically, using per-date historical rates from
//!   [`rates`].
//! - [`alerts`] fires budget-threshold alerts exactly once per crossing.
//!
//! Every operation takes an explicit connection handle and opens its own
//! database transaction; nothing here holds global state.

pub mod alerts;
pub mod balance;
pub mod conversion;
pub mod error;
pub mod rates;
pub mod recurrence;

#[cfg(test)]
pub mod testing;

pub use error::{LedgerError, Result};
