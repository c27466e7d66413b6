//! Up-front validation of the event log. Runs once over the whole table and
//! reports every problem together.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AttributionError, AttributionResult};
use crate::table::{Column, EventTable};
use crate::types::Touchpoint;

/// Columns every event log must carry.
pub const REQUIRED_COLUMNS: [Column; 3] = [Column::Timestamp, Column::Channel, Column::EventType];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    MissingRequiredColumn,
    MissingValue,
    InvalidTimestamp,
    InvalidNumber,
    NegativeValue,
}

/// A single problem found in the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub field: String,
    /// Zero-based row index; `None` for table-level problems.
    pub row: Option<usize>,
    pub code: IssueCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ValidationIssue {
    pub fn missing_column(column: Column) -> Self {
        Self {
            field: column.name().to_string(),
            row: None,
            code: IssueCode::MissingRequiredColumn,
            message: format!("required column '{}' is missing", column.name()),
            value: None,
        }
    }

    pub fn missing_value(column: Column, row: usize) -> Self {
        Self::row(
            column,
            row,
            IssueCode::MissingValue,
            format!("'{}' must not be empty", column.name()),
            None,
        )
    }

    pub fn row(
        column: Column,
        row: usize,
        code: IssueCode,
        message: String,
        value: Option<&str>,
    ) -> Self {
        Self {
            field: column.name().to_string(),
            row: Some(row),
            code,
            message,
            value: value.map(str::to_string),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(f, "{} (row {row}): {}", self.field, self.message),
            None => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

/// Collect every problem in the table. Row-level checks only run when all
/// required columns exist, otherwise each row would repeat the column issue.
pub fn validate_table(table: &EventTable) -> Vec<ValidationIssue> {
    let mut issues: Vec<ValidationIssue> = REQUIRED_COLUMNS
        .into_iter()
        .filter(|&c| !table.has_column(c))
        .map(ValidationIssue::missing_column)
        .collect();

    if issues.is_empty() {
        for (index, row) in table.rows().iter().enumerate() {
            if let Err(row_issues) = Touchpoint::from_row(row, index) {
                issues.extend(row_issues);
            }
        }
    }

    debug!(rows = table.len(), issues = issues.len(), "Validated event table");
    issues
}

/// Fail with the whole batch of issues when the table is malformed.
pub fn ensure_valid(table: &EventTable) -> AttributionResult<()> {
    let issues = validate_table(table);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(AttributionError::Validation(issues))
    }
}
