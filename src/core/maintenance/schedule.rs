// When the long-period jobs run next. All times are UTC.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

fn at_hour(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or_default();
    Utc.from_utc_datetime(&date.and_time(time))
}

/// First day of the month after `now`, at `hour`.
pub fn next_monthly(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_else(|| now.date_naive());
    at_hour(first, hour)
}

/// The next time the clock reads `hour`:00 strictly after `now`.
pub fn next_daily(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let today = at_hour(now.date_naive(), hour);
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// How long to sleep until `target`. Zero if it already passed.
pub fn until(now: DateTime<Utc>, target: DateTime<Utc>) -> std::time::Duration {
    (target - now).to_std().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn monthly_rolls_into_next_month() {
        assert_eq!(next_monthly(utc(2024, 3, 15, 10, 0), 0), utc(2024, 4, 1, 0, 0));
        assert_eq!(next_monthly(utc(2024, 12, 31, 23, 59), 4), utc(2025, 1, 1, 4, 0));
    }

    #[test]
    fn monthly_on_the_first_still_waits_a_month() {
        assert_eq!(next_monthly(utc(2024, 5, 1, 0, 0), 0), utc(2024, 6, 1, 0, 0));
    }

    #[test]
    fn daily_picks_today_or_tomorrow() {
        assert_eq!(next_daily(utc(2024, 3, 15, 1, 0), 4), utc(2024, 3, 15, 4, 0));
        assert_eq!(next_daily(utc(2024, 3, 15, 4, 0), 4), utc(2024, 3, 16, 4, 0));
        assert_eq!(next_daily(utc(2024, 2, 29, 23, 30), 0), utc(2024, 3, 1, 0, 0));
    }

    #[test]
    fn until_never_goes_negative() {
        let now = utc(2024, 3, 15, 10, 0);
        assert_eq!(until(now, now - Duration::hours(1)), std::time::Duration::ZERO);
        assert_eq!(
            until(now, now + Duration::minutes(5)),
            std::time::Duration::from_secs(300)
        );
    }
}
