use chrono::{Datelike, Local, NaiveDate};

/// Completed years between `dob` and `today`; 0 for dates of birth after `today`.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> u32 {
    let mut years = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn birthday_today_counts_the_full_year() {
        assert_eq!(age_on(date(1980, 10, 18), date(2026, 10, 18)), 46);
    }

    #[test]
    fn birthday_tomorrow_is_one_year_less() {
        assert_eq!(age_on(date(1980, 10, 19), date(2026, 10, 18)), 45);
    }

    #[test]
    fn earlier_month_later_day_is_already_counted() {
        assert_eq!(age_on(date(1990, 3, 30), date(2026, 10, 1)), 36);
    }

    #[test]
    fn across_new_year() {
        assert_eq!(age_on(date(2000, 12, 31), date(2026, 1, 1)), 25);
        assert_eq!(age_on(date(2000, 1, 1), date(2025, 12, 31)), 25);
    }

    #[test]
    fn leap_day_birthdays() {
        assert_eq!(age_on(date(2004, 2, 29), date(2026, 2, 28)), 21);
        assert_eq!(age_on(date(2004, 2, 29), date(2026, 3, 1)), 22);
    }

    #[test]
    fn future_dates_saturate_at_zero() {
        assert_eq!(age_on(date(2030, 1, 1), date(2026, 10, 18)), 0);
    }
}
