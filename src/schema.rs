use crate::error::{BilancioError, Result};
use crate::numeric::MAX_FORMAT_DECIMALS;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum UploadMode {
    #[schemars(description = "Only PDF documents are accepted")]
    Pdf,

    #[schemars(description = "Only XLSX workbooks are accepted")]
    Xlsx,

    #[schemars(description = "Legacy alias of xlsx; still only XLSX workbooks are accepted")]
    Xls,

    #[schemars(description = "XBRL instance documents (.xbrl or .xml)")]
    Xbrl,

    #[schemars(description = "Alias of xbrl")]
    Xml,

    #[schemars(description = "Any supported document type")]
    Manual,
}

impl UploadMode {
    /// Case-insensitive parse of a declared upload mode.
    pub fn parse(mode: &str) -> Result<Self> {
        match mode.to_lowercase().as_str() {
            "pdf" => Ok(UploadMode::Pdf),
            "xlsx" => Ok(UploadMode::Xlsx),
            "xls" => Ok(UploadMode::Xls),
            "xbrl" => Ok(UploadMode::Xbrl),
            "xml" => Ok(UploadMode::Xml),
            "manual" => Ok(UploadMode::Manual),
            _ => Err(BilancioError::InvalidMode(mode.to_string())),
        }
    }

    pub fn accepted_extensions(&self) -> &'static [&'static str] {
        match self {
            UploadMode::Pdf => &["pdf"],
            UploadMode::Xlsx | UploadMode::Xls => &["xlsx"],
            UploadMode::Xbrl | UploadMode::Xml => &["xbrl", "xml"],
            UploadMode::Manual => &["pdf", "xlsx", "xbrl", "xml"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UploadMode::Pdf => "pdf",
            UploadMode::Xlsx => "xlsx",
            UploadMode::Xls => "xls",
            UploadMode::Xbrl => "xbrl",
            UploadMode::Xml => "xml",
            UploadMode::Manual => "manual",
        }
    }

    /// Name shown to users in mismatch messages.
    pub fn display_name(&self) -> String {
        match self {
            UploadMode::Pdf | UploadMode::Xlsx | UploadMode::Xbrl | UploadMode::Xml => {
                self.as_str().to_uppercase()
            }
            _ => self.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Xlsx,
    Xbrl,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Xlsx => "xlsx",
            FileType::Xbrl => "xbrl",
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "pdf" => Some(FileType::Pdf),
            "xlsx" => Some(FileType::Xlsx),
            "xbrl" | "xml" => Some(FileType::Xbrl),
            _ => None,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower-cased extension of `path`, empty when there is none.
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExcelFormat {
    #[schemars(description = "Full civil-code layout (crediti verso soci, detailed receivables)")]
    Full,

    #[schemars(description = "Abbreviated layout (art. 2435-bis)")]
    Abbreviated,

    #[schemars(description = "Layout could not be classified; the upload must be rejected")]
    Unknown,
}

/// One extracted statement line: the label, the rendered text line and the
/// current-period value when one was recovered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub label: String,
    pub line: String,
    pub value: Option<Decimal>,
}

impl Observation {
    pub fn heading(label: &str) -> Self {
        Self {
            label: label.to_string(),
            line: label.to_string(),
            value: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReportingPeriod {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl ReportingPeriod {
    pub fn new(year: Option<i32>, month: Option<u32>) -> Self {
        Self { year, month }
    }

    pub fn is_empty(&self) -> bool {
        self.year.is_none() && self.month.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct ExtractionConfig {
    #[schemars(description = "Similarity cutoff for generic (non-total) fuzzy key matching")]
    pub fuzzy_cutoff: f64,

    #[schemars(description = "Similarity cutoff used when the label is a total")]
    pub totale_cutoff: f64,

    #[schemars(description = "Relaxed cutoff for 'Totale crediti verso soci' labels")]
    pub soci_cutoff: f64,

    #[schemars(
        description = "Magnitude separating the small financial 'Altri' income value from the large interest expense value"
    )]
    pub altri_magnitude_threshold: f64,

    #[schemars(description = "Maximum number of decimals rendered for XBRL amounts")]
    pub max_format_decimals: u32,

    #[schemars(description = "Number of preceding lines kept for disambiguation")]
    pub context_window: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            fuzzy_cutoff: 0.7,
            totale_cutoff: 0.5,
            soci_cutoff: 0.4,
            altri_magnitude_threshold: 10_000.0,
            max_format_decimals: MAX_FORMAT_DECIMALS,
            context_window: 5,
        }
    }
}

impl ExtractionConfig {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ExtractionConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_mode_extensions() {
        assert_eq!(UploadMode::parse("XLS").unwrap().accepted_extensions(), &["xlsx"]);
        assert_eq!(
            UploadMode::parse("xml").unwrap().accepted_extensions(),
            &["xbrl", "xml"]
        );
        assert_eq!(UploadMode::parse("manual").unwrap().accepted_extensions().len(), 4);
        assert!(matches!(
            UploadMode::parse("csv"),
            Err(BilancioError::InvalidMode(_))
        ));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(UploadMode::Xbrl.display_name(), "XBRL");
        assert_eq!(UploadMode::Manual.display_name(), "manual");
        assert_eq!(UploadMode::Xls.display_name(), "xls");
    }

    #[test]
    fn test_config_defaults_deserialize() {
        let config: ExtractionConfig = serde_json::from_str(r#"{"fuzzy_cutoff": 0.8}"#).unwrap();
        assert_eq!(config.fuzzy_cutoff, 0.8);
        assert_eq!(config.altri_magnitude_threshold, 10_000.0);
        assert_eq!(config.context_window, 5);
    }

    #[test]
    fn test_file_type_from_extension() {
        assert_eq!(FileType::from_extension("XML"), Some(FileType::Xbrl));
        assert_eq!(FileType::from_extension("docx"), None);
        assert_eq!(file_extension(Path::new("/tmp/a.PDF")), "pdf");
    }
}
