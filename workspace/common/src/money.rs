use rust_decimal::Decimal;
use rusty_money::iso;

/// Whether `code` names a known ISO-4217 currency ("USD", "EUR", ...).
pub fn is_valid_currency(code: &str) -> bool {
    iso::find(code).is_some()
}

/// Rounds a monetary amount to the currency's minor-unit exponent
/// (2 for USD/EUR, 0 for JPY). Unknown codes round to 2 decimal places.
pub fn round_for_currency(amount: Decimal, code: &str) -> Decimal {
    let exponent = iso::find(code).map(|c| c.exponent).unwrap_or(2);
    amount.round_dp(exponent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromStr;

    #[test]
    fn recognizes_iso_codes() {
        assert!(is_valid_currency("USD"));
        assert!(is_valid_currency("EUR"));
        assert!(is_valid_currency("JPY"));
        assert!(!is_valid_currency("XXQ"));
        assert!(!is_valid_currency(""));
    }

    #[test]
    fn rounds_to_currency_exponent() {
        let amount = Decimal::from_str("10.4567").unwrap();
        assert_eq!(round_for_currency(amount, "USD").to_string(), "10.46");
        assert_eq!(round_for_currency(amount, "JPY").to_string(), "10");
    }
}
