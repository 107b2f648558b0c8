//! Categorical and ordinal value normalization
//!
//! One pure function per column family, mapping a raw cell to an integer
//! code. Missing cells are `None` and map to `-1` wherever the column is
//! ordinal. Values outside the mapping tables are rejected with
//! [`Error::DataFormat`] instead of leaking through as strings.

use crate::{Error, Result};

/// Category level standing in for a missing value after normalization
pub const NOT_SPECIFIED: &str = "not_specified";

/// Code for a missing ordinal value
pub const MISSING_CODE: i32 = -1;

/// Sentinel for "10000 or more employees"
pub const COMPANY_SIZE_MAX: i32 = 10000;

/// Sentinel for the malformed `10/49` bucket
pub const COMPANY_SIZE_SLASH_BUCKET: i32 = 10;

/// Code for "more than 20 years" of experience
pub const EXPERIENCE_MAX: i32 = 21;

/// Code for "more than 4 years" since the last job change
pub const LAST_NEW_JOB_MAX: i32 = 4;

const EDUCATION_LEVELS: [(&str, i32); 5] = [
    ("Primary School", 0),
    ("High School", 1),
    ("Graduate", 2),
    ("Masters", 3),
    ("Phd", 4),
];

/// True if the raw cell carries no value
///
/// Empty cells, `NaN` and the `not_specified` sentinel all count as missing.
pub fn is_missing(value: Option<&str>) -> bool {
    present(value).is_none()
}

/// Trimmed value, or `None` when the cell is missing
pub fn present(value: Option<&str>) -> Option<&str> {
    let value = value?.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("nan") || value == NOT_SPECIFIED {
        None
    } else {
        Some(value)
    }
}

/// `"city_<n>"` to `n`
///
/// A bare integer is accepted as an already-normalized code.
pub fn city(value: &str) -> Result<i32> {
    let value = value.trim();
    let digits = value.strip_prefix("city_").unwrap_or(value);
    digits
        .parse::<i32>()
        .map_err(|_| Error::DataFormat(format!("city must look like city_<n>, got {:?}", value)))
}

/// Years of experience: missing -1, `<1` 0, `>20` 21, otherwise the integer
pub fn experience(value: Option<&str>) -> Result<i32> {
    let code = match present(value) {
        None => MISSING_CODE,
        Some("<1") => 0,
        Some(">20") => EXPERIENCE_MAX,
        Some(raw) => parse_int("experience", raw)?,
    };
    check_range("experience", code, MISSING_CODE, EXPERIENCE_MAX)
}

/// Company size bucket to its lower bound
///
/// Integers pass through, so normalizing twice is a no-op.
pub fn company_size(value: Option<&str>) -> Result<i32> {
    let Some(raw) = present(value) else {
        return Ok(MISSING_CODE);
    };

    let code = if let Ok(code) = raw.parse::<i32>() {
        code
    } else if raw.contains('+') {
        COMPANY_SIZE_MAX
    } else if raw.contains('/') {
        COMPANY_SIZE_SLASH_BUCKET
    } else if raw.starts_with('<') {
        0
    } else if let Some((lower, _)) = raw.split_once('-') {
        parse_int("company_size", lower)?
    } else {
        return Err(Error::DataFormat(format!(
            "company_size {:?} is not a known bucket",
            raw
        )));
    };

    check_range("company_size", code, MISSING_CODE, COMPANY_SIZE_MAX)
}

/// Education level on the ordered scale Primary School (0) .. Phd (4)
pub fn education_level(value: Option<&str>) -> Result<i32> {
    let Some(raw) = present(value) else {
        return Ok(MISSING_CODE);
    };

    if let Some((_, code)) = EDUCATION_LEVELS.iter().find(|(name, _)| *name == raw) {
        return Ok(*code);
    }

    match raw.parse::<i32>() {
        Ok(code) => check_range("education_level", code, MISSING_CODE, 4),
        Err(_) => Err(Error::DataFormat(format!(
            "education_level {:?} is not a known level",
            raw
        ))),
    }
}

/// Years since the last job change: missing -1, `never` 0, `>4` 4
pub fn last_new_job(value: Option<&str>) -> Result<i32> {
    let code = match present(value) {
        None => MISSING_CODE,
        Some(raw) if raw.contains('>') => LAST_NEW_JOB_MAX,
        Some("never") => 0,
        Some(raw) => parse_int("last_new_job", raw)?,
    };
    check_range("last_new_job", code, MISSING_CODE, LAST_NEW_JOB_MAX)
}

fn parse_int(column: &str, raw: &str) -> Result<i32> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| Error::DataFormat(format!("{} {:?} is not an integer", column, raw)))
}

fn check_range(column: &str, code: i32, min: i32, max: i32) -> Result<i32> {
    if (min..=max).contains(&code) {
        Ok(code)
    } else {
        Err(Error::DataFormat(format!(
            "{} code {} outside {}..={}",
            column, code, min, max
        )))
    }
}
