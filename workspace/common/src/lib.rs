//! Shared date and money helpers used by the ledger engine and the API
//! layer. Everything here is pure; no database access.

pub mod dates;
pub mod money;

pub use dates::{add_months, last_day_of_month, month_bounds, month_start, parse_month};
pub use money::{is_valid_currency, round_for_currency};
