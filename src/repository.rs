//! Balance persistence seam and the upload flow built on it.
//!
//! Storage is reached through [`BalanceRepository`], whose operations report
//! failures in their result structs the way the backing store does, rather
//! than panicking or returning `Err`. [`BalanceUploadService`] turns those into
//! [`BilancioError`]s.

use crate::error::{BilancioError, Result};
use crate::period::{
    extract_period_from_file, italian_month_name, validate_payload_period, validate_period, validate_upload_mode,
};
use crate::schema::{file_extension, FileType};
use crate::BilancioPipeline;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// A stored balance sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub id: u64,
    pub company_id: u64,
    pub year: i32,
    pub month: Option<u32>,
    pub balance_type: String,
    pub mode: String,
    pub file: String,
    pub note: Option<String>,
    pub balance: Value,
    #[serde(default)]
    pub is_deleted: bool,
}

/// Fields of a record about to be created; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBalanceRecord {
    pub company_id: u64,
    pub year: i32,
    pub month: Option<u32>,
    pub balance_type: String,
    pub mode: String,
    pub file: String,
    pub note: Option<String>,
    pub balance: Value,
}

/// Selects the records of one company period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceFilter {
    pub company_id: u64,
    pub year: i32,
    pub month: Option<u32>,
}

impl BalanceFilter {
    pub fn new(company_id: u64, year: i32, month: Option<u32>) -> Self {
        Self {
            company_id,
            year,
            month,
        }
    }

    pub fn matches(&self, record: &BalanceRecord) -> bool {
        record.company_id == self.company_id && record.year == self.year && record.month == self.month
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateResult {
    pub record: Option<BalanceRecord>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FindResult {
    pub records: Vec<BalanceRecord>,
    pub total: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FindOneResult {
    pub record: Option<BalanceRecord>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteResult {
    pub deleted: usize,
    pub error: Option<String>,
}

fn repository_error(error: Option<String>) -> Result<()> {
    match error {
        Some(message) => Err(BilancioError::Repository(message)),
        None => Ok(()),
    }
}

impl CreateResult {
    pub fn into_result(self) -> Result<BalanceRecord> {
        repository_error(self.error)?;
        self.record
            .ok_or_else(|| BilancioError::Repository("create returned no record".to_string()))
    }
}

impl FindResult {
    pub fn into_result(self) -> Result<(Vec<BalanceRecord>, usize)> {
        repository_error(self.error)?;
        Ok((self.records, self.total))
    }
}

impl FindOneResult {
    pub fn into_result(self) -> Result<Option<BalanceRecord>> {
        repository_error(self.error)?;
        Ok(self.record)
    }
}

impl DeleteResult {
    pub fn into_result(self) -> Result<usize> {
        repository_error(self.error)?;
        Ok(self.deleted)
    }
}

pub trait BalanceRepository {
    fn create(&mut self, record: NewBalanceRecord) -> CreateResult;

    /// All records of the period, soft-deleted ones included, oldest first.
    fn find(&self, filter: &BalanceFilter) -> FindResult;

    /// The newest record of the period.
    fn find_one(&self, filter: &BalanceFilter) -> FindOneResult;

    /// Removes every record of the period for good.
    fn delete(&mut self, filter: &BalanceFilter) -> DeleteResult;
}

/// Keeps records in memory, numbering them from 1.
#[derive(Debug, Clone)]
pub struct InMemoryBalanceRepository {
    records: Vec<BalanceRecord>,
    next_id: u64,
}

impl Default for InMemoryBalanceRepository {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            next_id: 1,
        }
    }
}

impl InMemoryBalanceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[BalanceRecord] {
        &self.records
    }

    /// Flags a record as deleted without removing it.
    pub fn soft_delete(&mut self, id: u64) -> bool {
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.is_deleted = true;
                true
            }
            None => false,
        }
    }
}

impl BalanceRepository for InMemoryBalanceRepository {
    fn create(&mut self, record: NewBalanceRecord) -> CreateResult {
        let stored = BalanceRecord {
            id: self.next_id,
            company_id: record.company_id,
            year: record.year,
            month: record.month,
            balance_type: record.balance_type,
            mode: record.mode,
            file: record.file,
            note: record.note,
            balance: record.balance,
            is_deleted: false,
        };
        self.next_id += 1;
        self.records.push(stored.clone());
        CreateResult {
            record: Some(stored),
            error: None,
        }
    }

    fn find(&self, filter: &BalanceFilter) -> FindResult {
        let records: Vec<BalanceRecord> = self.records.iter().filter(|r| filter.matches(r)).cloned().collect();
        FindResult {
            total: records.len(),
            records,
            error: None,
        }
    }

    fn find_one(&self, filter: &BalanceFilter) -> FindOneResult {
        FindOneResult {
            record: self.records.iter().rev().find(|r| filter.matches(r)).cloned(),
            error: None,
        }
    }

    fn delete(&mut self, filter: &BalanceFilter) -> DeleteResult {
        let before = self.records.len();
        self.records.retain(|r| !filter.matches(r));
        DeleteResult {
            deleted: before - self.records.len(),
            error: None,
        }
    }
}

/// An uploaded balance-sheet document with its declared metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadRequest {
    pub company_id: u64,
    pub year: i32,
    pub month: Option<u32>,
    pub balance_type: String,
    pub mode: String,
    pub note: Option<String>,
    #[serde(default)]
    pub overwrite: bool,
    pub file_path: PathBuf,
}

/// Validates uploads, runs extraction and stores the result.
pub struct BalanceUploadService<R: BalanceRepository> {
    repository: R,
    pipeline: BilancioPipeline,
}

impl<R: BalanceRepository> BalanceUploadService<R> {
    pub fn new(repository: R, pipeline: BilancioPipeline) -> Self {
        Self { repository, pipeline }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn repository_mut(&mut self) -> &mut R {
        &mut self.repository
    }

    pub fn into_repository(self) -> R {
        self.repository
    }

    pub fn upload(&mut self, request: &UploadRequest) -> Result<BalanceRecord> {
        let extension = file_extension(&request.file_path);
        let file_type =
            FileType::from_extension(&extension).ok_or_else(|| BilancioError::UnsupportedFile(extension.clone()))?;
        let mode = validate_upload_mode(&request.mode, &extension)?;
        validate_payload_period(request.year, request.month)?;

        info!(
            "upload for company {}: {} ({} mode, {}/{:?})",
            request.company_id,
            request.file_path.display(),
            mode.as_str(),
            request.year,
            request.month
        );

        let balance = self.extract(file_type, request)?;

        let detected = extract_period_from_file(&request.file_path);
        validate_period(detected, request.year, request.month, &extension.to_uppercase())?;

        let filter = BalanceFilter::new(request.company_id, request.year, request.month);
        if let Some(existing) = self.repository.find_one(&filter).into_result()? {
            if !existing.is_deleted {
                if !request.overwrite {
                    return Err(BilancioError::DuplicateBalance {
                        company_id: request.company_id,
                        year: request.year,
                        month: request.month,
                        balance_type: existing.balance_type,
                    });
                }
                let deleted = self.repository.delete(&filter).into_result()?;
                warn!(
                    "overwrite: removed {} balance(s) of company {} for {}/{:?}",
                    deleted, request.company_id, request.year, request.month
                );
            }
        }

        let record = NewBalanceRecord {
            company_id: request.company_id,
            year: request.year,
            month: request.month,
            balance_type: request.balance_type.clone(),
            mode: mode.as_str().to_string(),
            file: file_label(&request.balance_type, request.year, request.month),
            note: request.note.clone(),
            balance,
        };
        let stored = self.repository.create(record).into_result()?;
        debug!("stored balance {} ({})", stored.id, stored.file);
        Ok(stored)
    }

    fn extract(&self, file_type: FileType, request: &UploadRequest) -> Result<Value> {
        let path = &request.file_path;
        match file_type {
            FileType::Pdf => self.pipeline.extract_pdf(path),
            FileType::Xbrl => self.pipeline.extract_xbrl(path),
            FileType::Xlsx => self.pipeline.extract_xlsx(path),
        }
    }
}

/// Record title such as "Consuntivo 2023 dicembre".
fn file_label(balance_type: &str, year: i32, month: Option<u32>) -> String {
    let month_name = month.and_then(italian_month_name).unwrap_or("");
    format!("{} {} {}", balance_type, year, month_name).trim_end().to_string()
}
