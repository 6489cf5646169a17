//! UTC calendar helpers shared by the daily limiter, the liked gallery and
//! the scheduled jobs.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

/// `YYYY-MM-DD` for the UTC day containing `now`.
pub fn utc_day_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

pub fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
}

/// `[yesterday 00:00, today 00:00)` in UTC.
pub fn previous_utc_day(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = start_of_day(now.date_naive());
    (today - Duration::days(1), today)
}

pub fn next_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    start_of_day(now.date_naive()) + Duration::days(1)
}

pub fn until_next_utc_midnight(now: DateTime<Utc>) -> std::time::Duration {
    (next_utc_midnight(now) - now)
        .to_std()
        .unwrap_or(std::time::Duration::ZERO)
}
