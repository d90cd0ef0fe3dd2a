//! Calendar arithmetic for DATE and TIMESTAMP encodings.
//!
//! DATE values are days since 1970-01-01. Short timestamps are microseconds
//! since the epoch; long timestamps add picoseconds within the microsecond.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::types::data_type::{MAX_SHORT_TIMESTAMP_PRECISION, MAX_TIMESTAMP_PRECISION};

pub const MICROS_PER_SECOND: i64 = 1_000_000;
pub const MICROS_PER_DAY: i64 = 86_400 * MICROS_PER_SECOND;
pub const PICOS_PER_MICRO: u32 = 1_000_000;

const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

pub fn date_from_epoch_days(days: i64) -> Option<NaiveDate> {
    let days = i32::try_from(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?).ok()?;
    NaiveDate::from_num_days_from_ce_opt(days)
}

pub fn epoch_days(date: NaiveDate) -> i64 {
    date.num_days_from_ce() as i64 - UNIX_EPOCH_DAYS_FROM_CE
}

pub fn epoch_micros(timestamp: NaiveDateTime) -> Option<i64> {
    let days = epoch_days(timestamp.date());
    let time = timestamp.time();
    let micros_of_day = time.num_seconds_from_midnight() as i64 * MICROS_PER_SECOND
        + (time.nanosecond() / 1_000) as i64;
    days.checked_mul(MICROS_PER_DAY)?.checked_add(micros_of_day)
}

pub fn year_of_epoch_days(days: i64) -> Option<i32> {
    date_from_epoch_days(days).map(|date| date.year())
}

pub fn year_of_epoch_micros(micros: i64) -> Option<i32> {
    year_of_epoch_days(micros.div_euclid(MICROS_PER_DAY))
}

/// Epoch day of January 1st of `year`
pub fn year_start_epoch_days(year: i32) -> Option<i64> {
    NaiveDate::from_ymd_opt(year, 1, 1).map(epoch_days)
}

/// Epoch micros of midnight, January 1st of `year`
pub fn year_start_epoch_micros(year: i32) -> Option<i64> {
    year_start_epoch_days(year)?.checked_mul(MICROS_PER_DAY)
}

/// Size of one unit of `precision` expressed in units of `max_precision`
pub fn rescale_factor(precision: u8, max_precision: u8) -> i64 {
    10_i64.pow(max_precision.saturating_sub(precision) as u32)
}

/// Round epoch micros to `precision` fractional digits, half up
pub fn round_micros(micros: i64, precision: u8) -> Option<i64> {
    if precision >= MAX_SHORT_TIMESTAMP_PRECISION {
        return Some(micros);
    }
    let factor = rescale_factor(precision, MAX_SHORT_TIMESTAMP_PRECISION);
    micros
        .checked_add(factor / 2)?
        .div_euclid(factor)
        .checked_mul(factor)
}

pub fn parse_date(text: &str) -> Option<i64> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .ok()
        .map(epoch_days)
}

/// Parse `YYYY-MM-DD HH:MM:SS[.fff]` into epoch micros and picos of micro
pub fn parse_timestamp(text: &str) -> Option<(i64, u32)> {
    let text = text.trim();
    let parsed = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
        .ok()?;
    let picos = (parsed.nanosecond() % 1_000) * 1_000;
    Some((epoch_micros(parsed)?, picos))
}

pub fn format_date(days: i64) -> String {
    match date_from_epoch_days(days) {
        Some(date) => date.format("%Y-%m-%d").to_string(),
        None => format!("{} days", days),
    }
}

/// Render a timestamp with exactly `precision` fractional digits
pub fn format_timestamp(epoch_micros: i64, picos_of_micro: u32, precision: u8) -> String {
    let days = epoch_micros.div_euclid(MICROS_PER_DAY);
    let micros_of_day = epoch_micros.rem_euclid(MICROS_PER_DAY);
    let seconds = micros_of_day / MICROS_PER_SECOND;
    let micros_of_second = micros_of_day % MICROS_PER_SECOND;
    let mut text = format!(
        "{} {:02}:{:02}:{:02}",
        format_date(days),
        seconds / 3_600,
        seconds / 60 % 60,
        seconds % 60
    );
    if precision > 0 {
        let picos_of_second =
            micros_of_second as u64 * PICOS_PER_MICRO as u64 + picos_of_micro as u64;
        let digits = format!("{:012}", picos_of_second);
        let precision = precision.min(MAX_TIMESTAMP_PRECISION) as usize;
        text.push('.');
        text.push_str(&digits[..precision]);
    }
    text
}
