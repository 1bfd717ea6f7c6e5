//! Recipient records and the CSV source that supplies them

pub mod csv_source;

pub use csv_source::CsvRecipientSource;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Default name of the column holding addresses
pub const DEFAULT_EMAIL_COLUMN: &str = "email";

/// One CSV row: the recipient address plus every other column by header name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientRecord {
    /// 1-based data row (the header is not counted)
    pub row: usize,
    /// Trimmed content of the email column, empty when the cell is missing
    pub email: String,
    /// Template variables available for this recipient
    pub fields: HashMap<String, String>,
}

impl RecipientRecord {
    pub fn new(row: usize, email: impl Into<String>, fields: HashMap<String, String>) -> Self {
        Self {
            row,
            email: email.into(),
            fields,
        }
    }

    /// Identity used in logs and results
    pub fn identity(&self) -> String {
        if self.email.is_empty() {
            format!("<row {}>", self.row)
        } else {
            self.email.clone()
        }
    }
}

/// `var_name:csv_column` alias from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub variable: String,
    pub column: String,
}

impl FromStr for ColumnMapping {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((variable, column)) if !variable.is_empty() && !column.is_empty() => Ok(Self {
                variable: variable.to_string(),
                column: column.to_string(),
            }),
            _ => Err(format!(
                "invalid template variable mapping '{}', use var_name:csv_column",
                s
            )),
        }
    }
}

impl fmt::Display for ColumnMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.variable, self.column)
    }
}
