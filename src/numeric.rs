//! Amount parsing and formatting.
//!
//! Statement documents write amounts the Italian way: `.` groups thousands and
//! `,` introduces decimals (`1.234.567,89`). XBRL facts instead carry plain
//! decimal strings plus a `decimals` attribute. Both are handled here.

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

pub const MAX_FORMAT_DECIMALS: u32 = 6;

lazy_static! {
    /// A signed Italian-formatted amount token.
    pub static ref AMOUNT_RE: Regex = Regex::new(r"-?\d{1,3}(?:\.\d{3})*(?:,\d+)?").unwrap();

    /// Amount token that may carry spaces between the sign and the digits ("-  100.487").
    pub static ref SPACED_AMOUNT_RE: Regex = Regex::new(r"-?\s*\d{1,3}(?:\.\d{3})*(?:,\d+)?").unwrap();

    static ref DASH_NUMBER_RE: Regex =
        Regex::new(r"-\s+\d{1,3}(?:\.\d{3})*(?:,\d+)?\s*$").unwrap();

    static ref TRAILING_DASH_RE: Regex = Regex::new(r"(^|\s)-\s*$").unwrap();
}

/// Parses an XBRL fact value together with its `decimals` attribute.
///
/// Returns `None` for blank or non-numeric text. `INF`/`INFINITY` (any case)
/// and unparsable attributes yield no decimals hint; negative hints clamp to 0.
pub fn parse_xbrl_numeric(raw_value: &str, decimals_attr: Option<&str>) -> Option<(Decimal, Option<u32>)> {
    let sanitized = raw_value.trim();
    if sanitized.is_empty() {
        return None;
    }

    let value = Decimal::from_str(sanitized)
        .or_else(|_| Decimal::from_scientific(sanitized))
        .ok()?;

    let hint = decimals_attr.and_then(|attr| {
        let upper = attr.trim().to_uppercase();
        if upper.is_empty() || upper == "INF" || upper == "INFINITY" {
            return None;
        }
        upper.parse::<i64>().ok().map(|d| d.max(0) as u32)
    });

    Some((value, hint))
}

/// Renders an amount with Italian separators, capped at [`MAX_FORMAT_DECIMALS`].
pub fn format_amount_for_bilancio(value: Decimal, decimals: Option<u32>) -> String {
    format_amount_with_cap(value, decimals, MAX_FORMAT_DECIMALS)
}

pub fn format_amount_with_cap(value: Decimal, decimals: Option<u32>, cap: u32) -> String {
    let sign = if value.is_sign_negative() && !value.is_zero() { "-" } else { "" };
    let absolute = value.abs();

    let decimals = decimals.unwrap_or_else(|| absolute.scale()).min(cap);
    let quantized = absolute.round_dp_with_strategy(decimals, RoundingStrategy::MidpointNearestEven);
    let as_string = quantized.to_string();

    let (integer_part, fractional_part) = match as_string.split_once('.') {
        Some((int, frac)) => (int.to_string(), frac.trim_end_matches('0').to_string()),
        None => (as_string.clone(), String::new()),
    };

    let integer_part = if integer_part.is_empty() { "0".to_string() } else { integer_part };
    let grouped = group_thousands(&integer_part);

    if fractional_part.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{},{}", sign, grouped, fractional_part)
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

/// Parses an Italian-formatted amount into an exact decimal.
///
/// A lone `-` is the empty-cell placeholder and reads as zero.
pub fn parse_italian_decimal(token: &str) -> Option<Decimal> {
    let compact: String = token.chars().filter(|c| !c.is_whitespace()).collect();
    if compact == "-" {
        return Some(Decimal::ZERO);
    }
    let normalized = compact.replace('.', "").replace(',', ".");
    Decimal::from_str(&normalized).ok()
}

pub fn parse_italian_amount(token: &str) -> Option<f64> {
    parse_italian_decimal(token).and_then(|d| d.to_f64())
}

/// All amount tokens of `line`, in order.
pub fn amount_tokens(line: &str) -> Vec<String> {
    AMOUNT_RE.find_iter(line).map(|m| m.as_str().to_string()).collect()
}

/// First strictly positive amount on the line (the current-year column).
pub fn first_positive_amount(line: &str) -> Option<f64> {
    amount_tokens(line)
        .iter()
        .filter_map(|tok| parse_italian_amount(tok))
        .find(|v| *v > 0.0)
}

fn digits_of(token: &str) -> String {
    token.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub fn is_zero_token(token: &str) -> bool {
    let digits = digits_of(token);
    !digits.is_empty() && digits.chars().all(|c| c == '0')
}

/// Whether a token looks like a reportable amount rather than an index like "(4)".
pub fn is_amount_token(token: &str) -> bool {
    if is_zero_token(token) {
        return true;
    }
    token.contains('.') || token.contains(',') || digits_of(token).len() >= 3
}

/// "label ... - NNN": the dash marks an empty current-year column.
pub fn ends_with_dash_number(line: &str) -> bool {
    DASH_NUMBER_RE.is_match(line)
}

/// A line whose value column holds only a dash.
pub fn ends_with_dash_placeholder(line: &str) -> bool {
    TRAILING_DASH_RE.is_match(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_xbrl_numeric() {
        let (value, decimals) = parse_xbrl_numeric("123.45", Some("2")).unwrap();
        assert_eq!(value, Decimal::from_str("123.45").unwrap());
        assert_eq!(decimals, Some(2));

        assert!(parse_xbrl_numeric("   ", Some("2")).is_none());
        assert!(parse_xbrl_numeric("", Some("2")).is_none());
        assert!(parse_xbrl_numeric("abc", Some("2")).is_none());
    }

    #[test]
    fn test_parse_xbrl_numeric_infinite_precision() {
        for attr in ["INF", "INFINITY", "inf"] {
            let (value, decimals) = parse_xbrl_numeric("10", Some(attr)).unwrap();
            assert_eq!(value, Decimal::from(10));
            assert_eq!(decimals, None);
        }
        let (_, decimals) = parse_xbrl_numeric("10", Some("-3")).unwrap();
        assert_eq!(decimals, Some(0));
    }

    #[test]
    fn test_format_amount_for_bilancio() {
        assert_eq!(
            format_amount_for_bilancio(Decimal::from_str("1234.5").unwrap(), Some(1)),
            "1.234,5"
        );
        assert_eq!(
            format_amount_for_bilancio(Decimal::from_str("-1000.00").unwrap(), None),
            "-1.000"
        );
        assert_eq!(format_amount_for_bilancio(Decimal::from(1000), Some(0)), "1.000");
        assert_eq!(format_amount_for_bilancio(Decimal::from(0), None), "0");
        assert_eq!(
            format_amount_for_bilancio(Decimal::from_str("1234567.891").unwrap(), None),
            "1.234.567,891"
        );
    }

    #[test]
    fn test_italian_round_trip() {
        for s in ["1.234,5", "12", "-1.000", "987.654.321", "0,25"] {
            let parsed = parse_italian_decimal(s).unwrap();
            assert_eq!(format_amount_for_bilancio(parsed, None), s);
        }
    }

    #[test]
    fn test_dash_placeholder_reads_zero() {
        assert_eq!(parse_italian_amount("-"), Some(0.0));
        assert_eq!(parse_italian_amount("- 100.487"), Some(-100487.0));
    }

    #[test]
    fn test_amount_filters() {
        assert!(is_amount_token("753"));
        assert!(is_amount_token("0"));
        assert!(is_amount_token("1,5"));
        assert!(!is_amount_token("4"));
        assert!(!is_amount_token("98"));
    }

    #[test]
    fn test_dash_patterns() {
        assert!(ends_with_dash_number("Altri costi   -   745"));
        assert!(!ends_with_dash_number("Altri costi 745"));
        assert!(ends_with_dash_placeholder("Altri costi -"));
        assert!(!ends_with_dash_placeholder("Altri-costi"));
    }

    #[test]
    fn test_first_positive_amount() {
        assert_eq!(first_positive_amount("Totale 0 12.500 11.000"), Some(12500.0));
        assert_eq!(first_positive_amount("Totale"), None);
    }
}
