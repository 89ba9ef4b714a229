use crate::error::{BilancioError, Result};
use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use std::path::Path;

lazy_static! {
    static ref NOTES_RE: Regex =
        Regex::new(r"(?i)nota integrativa|note integrative|spiegazioni|altre informazioni").unwrap();
    static ref CASH_FLOW_RE: Regex =
        Regex::new(r"(?i)RENDICONTO FINANZIARIO|FLUSSO REDDITUALE CON METODO INDIRETTO|METODO INDIRETTO").unwrap();
}

/// Keeps the statement pages of a filing.
///
/// The cover page is dropped. Extraction ends at the first notes page, or at
/// the cash-flow statement, of which only the lines before its heading survive.
pub fn filter_statement_pages<S: AsRef<str>>(pages: &[S]) -> String {
    let mut kept: Vec<String> = Vec::new();

    for (number, page) in pages.iter().enumerate().skip(1) {
        let page = page.as_ref();
        if page.trim().is_empty() {
            continue;
        }
        if NOTES_RE.is_match(page) {
            debug!("pdf: notes begin on page {}", number + 1);
            break;
        }
        if CASH_FLOW_RE.is_match(page) {
            debug!("pdf: cash-flow statement on page {}", number + 1);
            let before: Vec<&str> = page.lines().take_while(|line| !CASH_FLOW_RE.is_match(line)).collect();
            kept.push(before.join("\n"));
            break;
        }
        kept.push(page.to_string());
    }

    kept.join("\n")
}

pub fn extract_text_from_pdf<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let pages = pdf_extract::extract_text_by_pages(path)
        .map_err(|e| BilancioError::PdfRead(format!("{}: {}", path.display(), e)))?;
    let text = filter_statement_pages(&pages);
    info!(
        "pdf {}: {} pages read, {} statement lines kept",
        path.display(),
        pages.len(),
        text.lines().count()
    );
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cover_page_is_skipped() {
        let pages = ["Bilancio al 31/12/2023", "STATO PATRIMONIALE\nTotale attivo 100"];
        assert_eq!(filter_statement_pages(&pages), "STATO PATRIMONIALE\nTotale attivo 100");
    }

    #[test]
    fn test_notes_page_stops_extraction() {
        let pages = [
            "cover",
            "CONTO ECONOMICO\nRicavi 10",
            "Nota integrativa al bilancio",
            "Debiti 99",
        ];
        assert_eq!(filter_statement_pages(&pages), "CONTO ECONOMICO\nRicavi 10");
    }

    #[test]
    fn test_cash_flow_keeps_preceding_lines() {
        let pages = [
            "cover",
            "Utile (perdita) dell'esercizio 500\nRENDICONTO FINANZIARIO\nFlusso 1",
            "Totale 42",
        ];
        assert_eq!(filter_statement_pages(&pages), "Utile (perdita) dell'esercizio 500");
    }

    #[test]
    fn test_empty_pages_are_ignored() {
        let pages = ["cover", "   ", "Totale 1"];
        assert_eq!(filter_statement_pages(&pages), "Totale 1");
    }
}
