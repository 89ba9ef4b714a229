//! # Bilancio Extraction
//!
//! Recovers Italian statutory balance sheets ("bilanci") from PDF, XLSX and
//! XBRL documents into a caller-supplied JSON template.
//!
//! ## Core Concepts
//!
//! - **Template**: a nested JSON object whose leaves are amounts. Extraction
//!   only ever overwrites existing leaves; it never adds keys.
//! - **Section context**: the dotted path of the statement section a line
//!   belongs to, inferred from the headings seen so far.
//! - **Matching**: each statement label is resolved to a template path from
//!   its wording, its section context and the paths already filled.
//! - **Reconciliation**: two known misplacements are corrected after the
//!   template has been filled.
//!
//! ## Example
//!
//! ```rust,ignore
//! use bilancio_extraction::*;
//!
//! let pipeline = BilancioPipeline::from_template_file("template.json")?;
//! let balance = pipeline.extract_xbrl("bilancio_2023.xbrl")?;
//! println!("{}", serde_json::to_string_pretty(&balance)?);
//! ```

pub mod error;
pub mod labels;
pub mod matcher;
pub mod numeric;
pub mod pdf;
pub mod period;
pub mod reconcile;
pub mod repository;
pub mod schema;
pub mod sections;
pub mod template;
pub mod updater;
pub mod xbrl;
pub mod xlsx;

pub use error::{BilancioError, Result};
pub use labels::{
    clean_name, find_best_match, infer_section_path, normalize_label_tokens, prettify_label_from_tokens, split_camel_case,
    tokenize_camel_case,
};
pub use matcher::HierarchicalMatcher;
pub use numeric::{format_amount_for_bilancio, parse_italian_amount, parse_xbrl_numeric};
pub use pdf::{extract_text_from_pdf, filter_statement_pages};
pub use period::{
    extract_period_from_file, extract_period_from_text, validate_payload_period, validate_period,
    validate_upload_mode,
};
pub use reconcile::{fix_altri_swap, fix_altri_swap_with, fix_crediti_mismatches, AltriPlacement, MagnitudeHeuristic};
pub use repository::{
    BalanceFilter, BalanceRecord, BalanceRepository, BalanceUploadService, InMemoryBalanceRepository,
    NewBalanceRecord, UploadRequest,
};
pub use schema::*;
pub use sections::{FinancialSubsection, SectionTracker};
pub use template::{build_hierarchical_index, extract_keys, load_existing_json, HierarchicalIndex};
pub use updater::{update_bilancio_json, update_bilancio_json_with_config, UpdateReport};
pub use xbrl::{
    extract_text_from_xbrl, extract_text_from_xbrl_with_config, extract_xbrl_observations,
    extract_xbrl_observations_with_config, xbrl_text_from_str, xbrl_text_from_str_with_config,
};
pub use xlsx::{
    detect_excel_format, extract_balance_year, extract_bilancio_abbreviato_from_xlsx, extract_bilancio_from_xlsx,
};

use log::{debug, info};
use serde_json::Value;
use std::path::Path;

/// Extraction settings plus a baseline template. Every run fills a fresh
/// copy of the baseline, so one pipeline can serve any number of documents.
#[derive(Debug, Clone)]
pub struct BilancioPipeline {
    config: ExtractionConfig,
    template: Value,
}

impl BilancioPipeline {
    pub fn new(template: Value) -> Self {
        Self::with_config(template, ExtractionConfig::default())
    }

    pub fn with_config(template: Value, config: ExtractionConfig) -> Self {
        Self { config, template }
    }

    pub fn from_template_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(load_existing_json(path)?))
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn template(&self) -> &Value {
        &self.template
    }

    /// Fills a copy of the template from statement text and applies the
    /// reconciliation fixes.
    pub fn fill_from_text(&self, text: &str, source: FileType) -> (Value, UpdateReport) {
        let mut balance = self.template.clone();
        let is_xbrl = source == FileType::Xbrl;

        let report = update_bilancio_json_with_config(&mut balance, text, is_xbrl, source, self.config.clone());

        let moved = fix_crediti_mismatches(&mut balance);
        let heuristic = MagnitudeHeuristic::new(self.config.altri_magnitude_threshold);
        let swapped = fix_altri_swap_with(&mut balance, is_xbrl, &heuristic);
        debug!("reconciliation: {} receivables moved, altri changed: {}", moved, swapped);

        (balance, report)
    }

    pub fn extract_pdf<P: AsRef<Path>>(&self, path: P) -> Result<Value> {
        let path = path.as_ref();
        info!("Extracting balance from PDF {}", path.display());
        let text = extract_text_from_pdf(path)?;
        let (balance, report) = self.fill_from_text(&text, FileType::Pdf);
        info!("{}: {} values written", path.display(), report.values_written);
        Ok(balance)
    }

    pub fn extract_xbrl<P: AsRef<Path>>(&self, path: P) -> Result<Value> {
        let path = path.as_ref();
        info!("Extracting balance from XBRL {}", path.display());
        let text = extract_text_from_xbrl_with_config(path, &self.config)?;
        let (balance, report) = self.fill_from_text(&text, FileType::Xbrl);
        info!("{}: {} values written", path.display(), report.values_written);
        Ok(balance)
    }

    /// Workbooks carry their own layout, so the template is not used.
    pub fn extract_xlsx<P: AsRef<Path>>(&self, path: P) -> Result<Value> {
        extract_balance_from_xlsx(path)
    }
}

pub fn extract_balance_from_pdf<P: AsRef<Path>, T: AsRef<Path>>(pdf_path: P, template_path: T) -> Result<Value> {
    BilancioPipeline::from_template_file(template_path)?.extract_pdf(pdf_path)
}

pub fn extract_balance_from_xbrl<P: AsRef<Path>, T: AsRef<Path>>(xbrl_path: P, template_path: T) -> Result<Value> {
    BilancioPipeline::from_template_file(template_path)?.extract_xbrl(xbrl_path)
}

/// Picks the full or abbreviated cell layout for a workbook.
pub fn extract_balance_from_xlsx<P: AsRef<Path>>(path: P) -> Result<Value> {
    let path = path.as_ref();
    match detect_excel_format(path) {
        ExcelFormat::Full => {
            info!("{}: full workbook layout", path.display());
            extract_bilancio_from_xlsx(path)
        }
        ExcelFormat::Abbreviated => {
            info!("{}: abbreviated workbook layout", path.display());
            extract_bilancio_abbreviato_from_xlsx(path)
        }
        ExcelFormat::Unknown => Err(BilancioError::UnknownExcelFormat(path.display().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template() -> Value {
        json!({
            "Stato_patrimoniale": {
                "Attivo": {
                    "Attivo_circolante": {
                        "Disponibilita_liquide": {
                            "Depositi_bancari_e_postali": 0.0,
                            "Totale_disponibilita_liquide": 0.0
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn test_pipeline_leaves_baseline_untouched() {
        let pipeline = BilancioPipeline::new(template());
        let text = "STATO PATRIMONIALE\nATTIVO\nTotale disponibilita liquide 8.000 6.000";

        let (first, report) = pipeline.fill_from_text(text, FileType::Pdf);
        assert_eq!(report.values_written, 1);
        assert_eq!(
            first["Stato_patrimoniale"]["Attivo"]["Attivo_circolante"]["Disponibilita_liquide"]
                ["Totale_disponibilita_liquide"],
            json!(8000.0)
        );
        assert_eq!(pipeline.template(), &template());

        let (second, _) = pipeline.fill_from_text(text, FileType::Pdf);
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_workbook_is_rejected() {
        let missing = Path::new("does-not-exist.xlsx");
        assert!(matches!(
            extract_balance_from_xlsx(missing),
            Err(BilancioError::UnknownExcelFormat(_))
        ));
    }
}
