use chrono::{Datelike, Duration, NaiveDate};

/// Returns the last calendar day of the given month.
pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_y, next_m) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    // The 1st of the following month always exists.
    NaiveDate::from_ymd_opt(next_y, next_m, 1)
        .map(|d| d - Duration::days(1))
        .unwrap_or(NaiveDate::MAX)
}

/// Adds `months` calendar months to `date`, clamping the day to the length
/// of the target month (Jan 31 + 1 month = Feb 28/29).
pub fn add_months(date: NaiveDate, months: i32) -> NaiveDate {
    let zero_based = date.year() * 12 + date.month() as i32 - 1 + months;
    let year = zero_based.div_euclid(12);
    let month = (zero_based.rem_euclid(12) + 1) as u32;
    let last = last_day_of_month(year, month);
    let day = date.day().min(last.day());
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(last)
}

/// First day of the month containing `date`.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap_or(date)
}

/// Inclusive first and last day of the month containing `date`.
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    (month_start(date), last_day_of_month(date.year(), date.month()))
}

/// Parses a `YYYY-MM` month key into the first day of that month.
pub fn parse_month(s: &str) -> Option<NaiveDate> {
    let (y, m) = s.split_once('-')?;
    let year: i32 = y.parse().ok()?;
    let month: u32 = m.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_day_handles_february_and_leap_years() {
        assert_eq!(
            last_day_of_month(2023, 2),
            NaiveDate::from_ymd_opt(2023, 2, 28).unwrap()
        );
        assert_eq!(
            last_day_of_month(2024, 2),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(
            last_day_of_month(2024, 12),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
        );
    }

    #[test]
    fn add_months_clamps_to_month_length() {
        let jan31 = NaiveDate::from_ymd_opt(2023, 1, 31).unwrap();
        assert_eq!(
            add_months(jan31, 1),
            NaiveDate::from_ymd_opt(2023, 2, 28).unwrap()
        );
        assert_eq!(
            add_months(jan31, 2),
            NaiveDate::from_ymd_opt(2023, 3, 31).unwrap()
        );
        assert_eq!(
            add_months(jan31, 13),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }

    #[test]
    fn add_months_crosses_year_boundaries_backwards() {
        let mar15 = NaiveDate::from_ymd_opt(2023, 3, 15).unwrap();
        assert_eq!(
            add_months(mar15, -3),
            NaiveDate::from_ymd_opt(2022, 12, 15).unwrap()
        );
    }

    #[test]
    fn month_bounds_cover_whole_month() {
        let mid = NaiveDate::from_ymd_opt(2024, 2, 14).unwrap();
        let (start, end) = month_bounds(mid);
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn parse_month_accepts_only_valid_keys() {
        assert_eq!(
            parse_month("2024-03"),
            NaiveDate::from_ymd_opt(2024, 3, 1)
        );
        assert_eq!(parse_month("2024-13"), None);
        assert_eq!(parse_month("banana"), None);
    }
}
