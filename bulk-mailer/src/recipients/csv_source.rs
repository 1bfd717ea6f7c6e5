//! CSV recipient source
//!
//! The whole file is read and checked before the campaign starts, so an
//! unreadable or malformed list aborts the run before anything is sent.

use super::{ColumnMapping, RecipientRecord, DEFAULT_EMAIL_COLUMN};
use crate::error::{MailerError, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Reads recipients from a CSV file with a header row
pub struct CsvRecipientSource {
    path: PathBuf,
    email_column: String,
    mappings: Vec<ColumnMapping>,
}

impl CsvRecipientSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            email_column: DEFAULT_EMAIL_COLUMN.to_string(),
            mappings: Vec::new(),
        }
    }

    pub fn with_email_column(mut self, column: impl Into<String>) -> Self {
        self.email_column = column.into();
        self
    }

    /// Expose `column` under an extra variable name for every row
    pub fn with_mappings(mut self, mappings: Vec<ColumnMapping>) -> Self {
        self.mappings = mappings;
        self
    }

    /// Load every row in file order
    pub fn load(&self) -> Result<Vec<RecipientRecord>> {
        let file = std::fs::File::open(&self.path).map_err(|e| {
            MailerError::RecipientSource(format!(
                "Cannot open {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let records = self.read_from(file)?;
        debug!(
            "Loaded {} recipients from {}",
            records.len(),
            self.path.display()
        );
        Ok(records)
    }

    /// Parse recipients from any reader
    pub fn read_from<R: Read>(&self, reader: R) -> Result<Vec<RecipientRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        if !headers.iter().any(|h| h == &self.email_column) {
            return Err(MailerError::RecipientSource(format!(
                "Email column '{}' not found in header ({})",
                self.email_column,
                headers.join(", ")
            )));
        }

        for mapping in &self.mappings {
            if !headers.contains(&mapping.column) {
                warn!(
                    "Column '{}' for template variable '{}' is not in the CSV header",
                    mapping.column, mapping.variable
                );
            }
        }

        let mut records = Vec::new();
        for (index, row) in reader.records().enumerate() {
            let row = row?;

            // Short rows simply lack the trailing columns.
            let mut fields: HashMap<String, String> = headers
                .iter()
                .zip(row.iter())
                .map(|(header, value)| (header.clone(), value.to_string()))
                .collect();

            for mapping in &self.mappings {
                if let Some(value) = fields.get(&mapping.column).cloned() {
                    fields.insert(mapping.variable.clone(), value);
                }
            }

            let email = fields
                .get(&self.email_column)
                .map(|e| e.trim().to_string())
                .unwrap_or_default();

            records.push(RecipientRecord::new(index + 1, email, fields));
        }

        Ok(records)
    }
}
