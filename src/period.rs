//! Reporting-period detection and upload validation.

use crate::error::{BilancioError, Result};
use crate::pdf::extract_text_from_pdf;
use crate::schema::{file_extension, ReportingPeriod, UploadMode};
use crate::xlsx::{extract_balance_year, header_text};
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;
use std::fs;
use std::path::Path;

const MIN_YEAR: i32 = 1900;
const MAX_YEAR: i32 = 2100;
/// XBRL contexts sit at the top of the instance document.
const XBRL_HEADER_LINES: usize = 101;
const XLSX_FALLBACK_ROWS: u32 = 10;

const MONTH_NAMES: [(&str, u32); 24] = [
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
    ("gennaio", 1),
    ("febbraio", 2),
    ("marzo", 3),
    ("aprile", 4),
    ("maggio", 5),
    ("giugno", 6),
    ("luglio", 7),
    ("agosto", 8),
    ("settembre", 9),
    ("ottobre", 10),
    ("novembre", 11),
    ("dicembre", 12),
];

lazy_static! {
    static ref NUMERIC_DATE_RE: Regex = Regex::new(r"(\d{1,2})[/\-.](\d{1,2})[/\-.](\d{4})").unwrap();
    static ref MONTH_NAME_RE: Regex = Regex::new(
        r"(?i)(gennaio|febbraio|marzo|aprile|maggio|giugno|luglio|agosto|settembre|ottobre|novembre|dicembre|january|february|march|april|may|june|july|august|september|october|november|december)\s+(\d{4})"
    )
    .unwrap();
    static ref LABELLED_YEAR_RE: Regex = Regex::new(r"(?i)(?:esercizio|bilancio|al)\D{0,15}(20\d{2}|19\d{2})").unwrap();
    static ref BARE_YEAR_RE: Regex = Regex::new(r"\b(20\d{2}|19\d{2})\b").unwrap();
    static ref ISO_DATE_RE: Regex = Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})").unwrap();
    static ref XLSX_DATE_RE: Regex = Regex::new(r"^(\d{4})-(\d{2})-\d{2}").unwrap();
    static ref CONTEXT_OPEN_RE: Regex = Regex::new(r"(?i)<(?:[\w-]+:)?context[\s>]").unwrap();
    static ref CONTEXT_CLOSE_RE: Regex = Regex::new(r"(?i)</(?:[\w-]+:)?context>").unwrap();
}

fn year_in_range(year: i32) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&year)
}

fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    MONTH_NAMES
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|(_, number)| *number)
}

/// Lower-case Italian name of a month number.
pub fn italian_month_name(month: u32) -> Option<&'static str> {
    MONTH_NAMES[12..]
        .iter()
        .find(|(_, number)| *number == month)
        .map(|(name, _)| *name)
}

/// Guesses the reporting period from free text.
///
/// Tried in order: a numeric `D/M/YYYY` date, a month name followed by a
/// year, a year shortly after "esercizio", "bilancio" or "al", and finally
/// the first bare 19xx/20xx year. The last two leave the month unknown.
pub fn extract_period_from_text(text: &str) -> ReportingPeriod {
    if text.is_empty() {
        return ReportingPeriod::default();
    }

    for caps in NUMERIC_DATE_RE.captures_iter(text) {
        let month = caps[2].parse::<u32>().ok();
        let year = caps[3].parse::<i32>().ok();
        if let (Some(month), Some(year)) = (month, year) {
            if (1..=12).contains(&month) && year_in_range(year) {
                return ReportingPeriod::new(Some(year), Some(month));
            }
        }
    }

    for caps in MONTH_NAME_RE.captures_iter(text) {
        let month = month_number(&caps[1]);
        let year = caps[2].parse::<i32>().ok();
        if let (Some(month), Some(year)) = (month, year) {
            if year_in_range(year) {
                return ReportingPeriod::new(Some(year), Some(month));
            }
        }
    }

    if let Some(year) = LABELLED_YEAR_RE
        .captures(text)
        .and_then(|caps| caps[1].parse::<i32>().ok())
    {
        return ReportingPeriod::new(Some(year), None);
    }

    BARE_YEAR_RE
        .captures(text)
        .and_then(|caps| caps[1].parse::<i32>().ok())
        .map(|year| ReportingPeriod::new(Some(year), None))
        .unwrap_or_default()
}

/// The `<context>` blocks found in the first lines of an XBRL instance.
fn xbrl_context_blocks(content: &str) -> String {
    let mut blocks = String::new();
    let mut inside = false;
    for line in content.lines().take(XBRL_HEADER_LINES) {
        if CONTEXT_OPEN_RE.is_match(line) {
            inside = true;
        }
        if inside {
            blocks.push_str(line);
            blocks.push('\n');
            if CONTEXT_CLOSE_RE.is_match(line) {
                inside = false;
            }
        }
    }
    blocks
}

/// Latest period among the ISO dates of the XBRL contexts.
fn period_from_xbrl_contexts(content: &str) -> ReportingPeriod {
    let blocks = xbrl_context_blocks(content);
    let latest = ISO_DATE_RE
        .captures_iter(&blocks)
        .filter_map(|caps| {
            let year = caps[1].parse::<i32>().ok()?;
            let month = caps[2].parse::<u32>().ok()?;
            ((1..=12).contains(&month) && year_in_range(year)).then_some((year, month))
        })
        .max();

    match latest {
        Some((year, month)) => ReportingPeriod::new(Some(year), Some(month)),
        None => extract_period_from_text(&blocks),
    }
}

fn period_from_balance_year(value: &str) -> Option<ReportingPeriod> {
    if let Some(caps) = XLSX_DATE_RE.captures(value) {
        let year = caps[1].parse::<i32>().ok()?;
        let month = caps[2].parse::<u32>().ok()?;
        return Some(ReportingPeriod::new(Some(year), Some(month)));
    }
    if value.len() == 4 && value.chars().all(|c| c.is_ascii_digit()) {
        return Some(ReportingPeriod::new(value.parse().ok(), None));
    }
    None
}

fn try_extract_period(path: &Path) -> Result<ReportingPeriod> {
    match file_extension(path).as_str() {
        "xbrl" | "xml" => {
            let bytes = fs::read(path)?;
            Ok(period_from_xbrl_contexts(&String::from_utf8_lossy(&bytes)))
        }
        "pdf" => Ok(extract_period_from_text(&extract_text_from_pdf(path)?)),
        "xlsx" => {
            if let Some(period) = extract_balance_year(path).as_deref().and_then(period_from_balance_year) {
                return Ok(period);
            }
            Ok(extract_period_from_text(&header_text(path, XLSX_FALLBACK_ROWS)?))
        }
        other => {
            warn!("period detection does not support .{} files", other);
            Ok(ReportingPeriod::default())
        }
    }
}

/// Reads the reporting period from a document. Unreadable documents yield an
/// empty period.
pub fn extract_period_from_file<P: AsRef<Path>>(path: P) -> ReportingPeriod {
    let path = path.as_ref();
    match try_extract_period(path) {
        Ok(period) => {
            debug!("{}: detected period {:?}/{:?}", path.display(), period.year, period.month);
            period
        }
        Err(e) => {
            warn!("Unable to extract the reporting period from {}: {}", path.display(), e);
            ReportingPeriod::default()
        }
    }
}

/// Compares the period found in a document with the declared one.
///
/// The year is checked only when the document revealed one; the month only
/// when both sides know it.
pub fn validate_period(detected: ReportingPeriod, payload_year: i32, payload_month: Option<u32>, display: &str) -> Result<()> {
    if let Some(year) = detected.year {
        if year != payload_year {
            return Err(BilancioError::PeriodMismatch(format!(
                "Year mismatch. {} reports {} while payload contains {}.",
                display, year, payload_year
            )));
        }
    }

    if let (Some(month), Some(payload_month)) = (detected.month, payload_month) {
        if month != payload_month {
            return Err(BilancioError::PeriodMismatch(format!(
                "Month mismatch. {} reports {} while payload contains {}.",
                display, month, payload_month
            )));
        }
    }

    Ok(())
}

/// Range checks on a declared period.
pub fn validate_payload_period(year: i32, month: Option<u32>) -> Result<()> {
    if !year_in_range(year) {
        return Err(BilancioError::InvalidPeriod(
            "Invalid year. Must be between 1900 and 2100".to_string(),
        ));
    }
    if let Some(month) = month {
        if !(1..=12).contains(&month) {
            return Err(BilancioError::InvalidPeriod(
                "Invalid month. Must be between 1 and 12".to_string(),
            ));
        }
    }
    Ok(())
}

/// Checks that an uploaded file's extension fits the declared mode.
pub fn validate_upload_mode(mode: &str, extension: &str) -> Result<UploadMode> {
    let upload_mode = UploadMode::parse(mode)?;
    let extension = extension.to_lowercase();
    if upload_mode.accepted_extensions().contains(&extension.as_str()) {
        Ok(upload_mode)
    } else {
        Err(BilancioError::ModeMismatch {
            display: upload_mode.display_name(),
            extension: extension.to_uppercase(),
        })
    }
}
