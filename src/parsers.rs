//! Parsers for the value formats RouterOS uses in API replies

use crate::error::{ExporterError, Result};

const SECONDS_PER_UNIT: [(&str, f64); 6] = [
    ("w", 604_800.0),
    ("d", 86_400.0),
    ("h", 3_600.0),
    ("m", 60.0),
    ("s", 1.0),
    ("ms", 0.001),
];

/// Parse a RouterOS duration such as `3d3h42m53s` into seconds.
///
/// Units must appear in descending order (`w`, `d`, `h`, `m`, `s`, `ms`), each
/// at most once. A unit without digits counts as zero and an empty string is
/// zero seconds; digits without a trailing unit are rejected.
pub fn parse_duration(duration: &str) -> Result<f64> {
    let mut rest = duration;
    let mut next_unit = 0;
    let mut total_ms: u64 = 0;

    while !rest.is_empty() {
        let digits_len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let (digits, tail) = rest.split_at(digits_len);

        let unit_index = SECONDS_PER_UNIT
            .iter()
            .enumerate()
            .skip(next_unit)
            // "ms" must win over "m" followed by a stray "s"
            .filter(|(_, (unit, _))| tail.starts_with(unit))
            .max_by_key(|(_, (unit, _))| unit.len())
            .map(|(index, _)| index)
            .ok_or_else(|| {
                ExporterError::Parse(format!("unexpected duration format: {:?}", duration))
            })?;

        let (unit, seconds) = SECONDS_PER_UNIT[unit_index];
        if !digits.is_empty() {
            let value: u64 = digits.parse().map_err(|e| {
                ExporterError::Parse(format!("invalid duration value {:?}: {}", digits, e))
            })?;
            total_ms = value
                .checked_mul((seconds * 1000.0) as u64)
                .and_then(|ms| total_ms.checked_add(ms))
                .ok_or_else(|| {
                    ExporterError::Parse(format!("duration out of range: {:?}", duration))
                })?;
        }

        next_unit = unit_index + 1;
        rest = &tail[unit.len()..];
    }

    Ok(total_ms as f64 / 1000.0)
}

/// Parse a `tx,rx` style pair of numbers. Extra fields are ignored.
pub fn parse_comma_separated(metric: &str) -> Result<(f64, f64)> {
    let mut parts = metric.split(',');
    let (first, second) = match (parts.next(), parts.next()) {
        (Some(first), Some(second)) => (first, second),
        _ => {
            return Err(ExporterError::Parse(format!(
                "unexpected parts count after split: {:?}",
                metric
            )));
        }
    };

    let parse = |value: &str| {
        value
            .parse::<f64>()
            .map_err(|e| ExporterError::Parse(format!("invalid number {:?}: {}", value, e)))
    };

    Ok((parse(first)?, parse(second)?))
}

/// Parse the leading rate of a wireless rate string such as
/// `433.3Mbps-80MHz/1S/SGI`, in Mbps.
pub fn parse_wireless_rate(rate: &str) -> Result<f64> {
    let index = rate
        .find("Mbps")
        .ok_or_else(|| ExporterError::Parse(format!("unexpected wireless rate: {:?}", rate)))?;

    let prefix = &rate[..index];
    let start = prefix
        .rfind(|c: char| !(c.is_ascii_digit() || c == '.'))
        .map_or(0, |i| i + 1);
    let number = &prefix[start..];

    if number.is_empty() {
        return Err(ExporterError::Parse(format!(
            "unexpected wireless rate: {:?}",
            rate
        )));
    }

    number
        .parse::<f64>()
        .map_err(|e| ExporterError::Parse(format!("invalid wireless rate {:?}: {}", number, e)))
}
