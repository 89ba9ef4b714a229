use thiserror::Error;

#[derive(Error, Debug)]
pub enum BilancioError {
    #[error("Impossibile analizzare il file XBRL: {0}")]
    XbrlParse(String),

    #[error("Unable to read PDF document: {0}")]
    PdfRead(String),

    #[error("Unable to read workbook: {0}")]
    Workbook(#[from] calamine::Error),

    #[error("Could not determine matching extractor for this XLSX file: {0}")]
    UnknownExcelFormat(String),

    #[error("Invalid mode: {0}. Valid modes are: pdf, xlsx, xbrl, xml, manual")]
    InvalidMode(String),

    #[error("Mode is set to \"{display}\" but uploaded file is {extension}. Please upload a {display} file or change the mode.")]
    ModeMismatch { display: String, extension: String },

    #[error("Only PDF, XLSX, and XBRL/XML files are allowed (got: {0})")]
    UnsupportedFile(String),

    #[error("{0}")]
    InvalidPeriod(String),

    #[error("{0}")]
    PeriodMismatch(String),

    #[error("A balance already exists for company {company_id} ({year}/{month:?}, {balance_type})")]
    DuplicateBalance {
        company_id: u64,
        year: i32,
        month: Option<u32>,
        balance_type: String,
    },

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BilancioError>;
