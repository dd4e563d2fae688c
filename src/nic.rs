//! Sri Lankan NIC parsing.
//!
//! Both NIC formats encode the birth year and a 3-digit day-of-year field;
//! values above 500 mark the holder as female (the issuing scheme adds a
//! fixed offset of 500 to the day for women). The day-of-year always assumes
//! a 366-day year, so month/day are resolved against the reference leap year
//! 2000 regardless of the actual birth year.

use chrono::{Datelike, NaiveDate};

use crate::types::Gender;

/// female marker offset added to the day-of-year field
const FEMALE_OFFSET: u32 = 500;

/// reference leap year used to resolve day-of-year into month/day
const REFERENCE_YEAR: i32 = 2000;

/// true iff `s` is a well-formed NIC: 9 digits followed by V/X (either
/// case), or 12 digits
pub fn is_valid_nic(s: &str) -> bool {
    let bytes = s.as_bytes();
    match bytes.len() {
        10 => {
            bytes[..9].iter().all(u8::is_ascii_digit)
                && matches!(bytes[9], b'V' | b'X' | b'v' | b'x')
        }
        12 => bytes.iter().all(u8::is_ascii_digit),
        _ => false,
    }
}

/// split a pre-uppercased NIC into (birth year, raw day-of-year field);
/// returns None unless the format is exact
fn parse_fields(s: &str) -> Option<(i32, u32)> {
    let bytes = s.as_bytes();
    match bytes.len() {
        10 => {
            if !bytes[..9].iter().all(u8::is_ascii_digit)
                || !matches!(bytes[9], b'V' | b'X')
            {
                return None;
            }
            let year: i32 = s[..2].parse().ok()?;
            let day: u32 = s[2..5].parse().ok()?;
            Some((1900 + year, day))
        }
        12 => {
            if !bytes.iter().all(u8::is_ascii_digit) {
                return None;
            }
            let year: i32 = s[..4].parse().ok()?;
            let day: u32 = s[4..7].parse().ok()?;
            Some((year, day))
        }
        _ => None,
    }
}

/// gender from the day-of-year field; expects uppercase input, None on
/// malformed NICs
pub fn extract_gender_from_nic(s: &str) -> Option<Gender> {
    let (_, day) = parse_fields(s)?;
    if day > FEMALE_OFFSET {
        Some(Gender::Female)
    } else {
        Some(Gender::Male)
    }
}

/// birthday as an ISO `YYYY-MM-DD` string; expects uppercase input, None on
/// malformed NICs or a day field outside 1..=366 after the female offset
pub fn extract_birthday_from_nic(s: &str) -> Option<String> {
    let (year, raw_day) = parse_fields(s)?;
    let day = if raw_day > FEMALE_OFFSET {
        raw_day - FEMALE_OFFSET
    } else {
        raw_day
    };
    // month/day come from the reference leap year; the result is formatted
    // directly so Feb 29 survives even for non-leap birth years
    let reference = NaiveDate::from_yo_opt(REFERENCE_YEAR, day)?;
    Some(format!(
        "{:04}-{:02}-{:02}",
        year,
        reference.month(),
        reference.day()
    ))
}
