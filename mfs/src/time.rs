//! Creation timestamps: stored as Unix seconds, listed as `Mon dd HH:MM` (UTC).

use std::time::{SystemTime, UNIX_EPOCH};

const SECS_PER_DAY: i64 = 86_400;
const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub fn now() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_secs() as i64,
        Err(before) => -(before.duration().as_secs() as i64),
    }
}

/// (year, month index 0..12, day 1..=31) of a day count since 1970-01-01,
/// proleptic Gregorian. Works in 400-year eras of 146097 days.
fn civil_from_days(days: i64) -> (i64, usize, i64) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    // months counted from March
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 2 } else { mp - 10 };
    let year = yoe + era * 400 + if month < 2 { 1 } else { 0 };
    (year, month as usize, day)
}

pub fn format_timestamp(secs: i64) -> String {
    let days = secs.div_euclid(SECS_PER_DAY);
    let secs_of_day = secs.rem_euclid(SECS_PER_DAY);
    let (_, month, day) = civil_from_days(days);
    format!(
        "{} {:02} {:02}:{:02}",
        MONTH_NAMES[month],
        day,
        secs_of_day / 3600,
        (secs_of_day % 3600) / 60
    )
}
