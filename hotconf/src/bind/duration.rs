//! Duration literal parsing (`300ms`, `1.5h`, `2h45m`).

use std::time::Duration;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;
const NANOS_PER_MINUTE: u128 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: u128 = 60 * NANOS_PER_MINUTE;

/// Parse a duration literal.
///
/// A literal is a sequence of decimal numbers, each with an optional
/// fraction and a mandatory unit suffix: `ns`, `us` (or `µs`/`μs`), `ms`, `s`,
/// `m`, `h`. A leading `+` is accepted; `0` on its own needs no unit.
/// Negative durations cannot be represented and are rejected.
///
/// # Errors
///
/// Returns a human-readable reason when the literal is malformed or
/// overflows.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use hotconf::parse_duration;
///
/// assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
/// assert_eq!(parse_duration("1h30m"), Ok(Duration::from_secs(5400)));
/// assert_eq!(parse_duration("1.5s"), Ok(Duration::from_millis(1500)));
/// assert!(parse_duration("5").is_err());
/// ```
pub fn parse_duration(literal: &str) -> Result<Duration, String> {
    let body = literal.strip_prefix('+').unwrap_or(literal);
    if body.starts_with('-') {
        return Err(String::from("negative durations are not supported"));
    }
    if body == "0" {
        return Ok(Duration::ZERO);
    }
    if body.is_empty() {
        return Err(String::from("empty duration"));
    }

    let mut total: u128 = 0;
    let mut rest = body;
    while !rest.is_empty() {
        let (whole, fraction, after_number) = split_number(rest)?;
        let (unit, after_unit) = split_unit(after_number)?;
        let scale = unit_scale(unit).ok_or_else(|| format!("unknown unit '{unit}'"))?;
        total = whole
            .checked_mul(scale)
            .and_then(|nanos| nanos.checked_add(fraction_nanos(fraction, scale)))
            .and_then(|nanos| total.checked_add(nanos))
            .ok_or_else(|| String::from("duration overflows"))?;
        rest = after_unit;
    }

    let whole_secs = total.checked_div(NANOS_PER_SECOND).unwrap_or_default();
    let sub_nanos = total.checked_rem(NANOS_PER_SECOND).unwrap_or_default();
    let secs = u64::try_from(whole_secs).map_err(|_| String::from("duration overflows"))?;
    let nanos = u32::try_from(sub_nanos).map_err(|_| String::from("duration overflows"))?;
    Ok(Duration::new(secs, nanos))
}

/// Split a leading `digits[.digits]` number, returning the integer part, the
/// fractional digits and the remaining input.
fn split_number(input: &str) -> Result<(u128, &str, &str), String> {
    let int_end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (int_digits, after_int) = input.split_at(int_end);
    let (fraction, rest) = match after_int.strip_prefix('.') {
        Some(after_dot) => {
            let frac_end = after_dot
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(after_dot.len());
            after_dot.split_at(frac_end)
        }
        None => ("", after_int),
    };
    if int_digits.is_empty() && fraction.is_empty() {
        return Err(format!("expected a number at '{input}'"));
    }
    let whole = if int_digits.is_empty() {
        0
    } else {
        int_digits
            .parse::<u128>()
            .map_err(|_| String::from("duration overflows"))?
    };
    Ok((whole, fraction, rest))
}

fn split_unit(input: &str) -> Result<(&str, &str), String> {
    let end = input
        .find(|c: char| c.is_ascii_digit() || c == '.')
        .unwrap_or(input.len());
    let (unit, rest) = input.split_at(end);
    if unit.is_empty() {
        return Err(String::from("missing unit in duration"));
    }
    Ok((unit, rest))
}

fn unit_scale(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SECOND),
        "m" => Some(NANOS_PER_MINUTE),
        "h" => Some(NANOS_PER_HOUR),
        _ => None,
    }
}

/// Convert fractional digits of a unit into nanoseconds, truncating below
/// one nanosecond.
fn fraction_nanos(digits: &str, scale: u128) -> u128 {
    let mut numerator: u128 = 0;
    let mut denominator: u128 = 1;
    for digit in digits.chars().filter_map(|c| c.to_digit(10)) {
        // Digits beyond nanosecond precision for the coarsest unit add nothing.
        if denominator >= NANOS_PER_HOUR {
            break;
        }
        numerator = numerator * 10 + u128::from(digit);
        denominator *= 10;
    }
    (numerator * scale)
        .checked_div(denominator)
        .unwrap_or_default()
}
