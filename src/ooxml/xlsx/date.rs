//! Excel date serials.
//!
//! A serial is the number of days since the workbook's epoch, the
//! fraction being the time of day. The 1900 system counts 1900-01-01 as
//! day 1 and keeps Lotus' fictitious 1900-02-29 (day 60), so every date
//! from March 1900 on is one day further than a plain day count. The 1904
//! system counts from 1904-01-01 as day 0.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

const SECONDS_PER_DAY: f64 = 86_400.0;

fn epoch(date1904: bool) -> NaiveDateTime {
    let date = if date1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 31)
    };
    date.unwrap_or_default().and_hms_opt(0, 0, 0).unwrap_or_default()
}

fn leap_bug_start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1900, 3, 1)
        .unwrap_or_default()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_default()
}

/// Convert a date-time to an Excel serial.
///
/// Returns `None` for instants on or before the epoch, which Excel cannot
/// represent as a date.
pub fn to_excel_serial(value: NaiveDateTime, date1904: bool) -> Option<f64> {
    let diff = value - epoch(date1904);
    let micros = diff.num_microseconds()?;
    let mut serial = micros as f64 / 1_000_000.0 / SECONDS_PER_DAY;
    if !date1904 && value >= leap_bug_start() {
        serial += 1.0;
    }
    (serial > 0.0).then_some(serial)
}

/// Convert an Excel serial back to a date-time, rounded to the millisecond.
pub fn from_excel_serial(serial: f64, date1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let mut days = serial;
    if !date1904 && serial >= 61.0 {
        days -= 1.0;
    }
    let millis = (days * SECONDS_PER_DAY * 1000.0).round() as i64;
    epoch(date1904).checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}

/// Length of a duration in days, at single precision like Excel's own
/// time arithmetic.
pub fn duration_to_days(value: TimeDelta) -> f32 {
    let seconds = value.num_milliseconds() as f64 / 1000.0;
    (seconds / SECONDS_PER_DAY) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_1900_serials() {
        assert_eq!(to_excel_serial(at(1900, 1, 1, 0, 0), false), Some(1.0));
        assert_eq!(to_excel_serial(at(1900, 2, 28, 0, 0), false), Some(59.0));
        assert_eq!(to_excel_serial(at(1900, 3, 1, 0, 0), false), Some(61.0));
        assert_eq!(to_excel_serial(at(2011, 1, 1, 12, 0), false), Some(40544.5));
        assert_eq!(to_excel_serial(at(1899, 12, 31, 0, 0), false), None);
    }

    #[test]
    fn test_1904_serials() {
        assert_eq!(to_excel_serial(at(1904, 1, 2, 0, 0), true), Some(1.0));
        assert_eq!(to_excel_serial(at(2011, 1, 1, 0, 0), true), Some(39082.0));
        assert_eq!(to_excel_serial(at(1904, 1, 1, 0, 0), true), None);
    }

    #[test]
    fn serials_convert_back() {
        for date1904 in [false, true] {
            let value = at(2023, 7, 14, 18, 30);
            let serial = to_excel_serial(value, date1904).unwrap();
            assert_eq!(from_excel_serial(serial, date1904), Some(value));
        }
    }

    #[test]
    fn test_duration_to_days() {
        assert_eq!(duration_to_days(TimeDelta::hours(36)), 1.5);
        assert_eq!(duration_to_days(TimeDelta::minutes(-720)), -0.5);
    }
}
