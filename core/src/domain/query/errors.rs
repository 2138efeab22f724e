use serde::Serialize;
use thiserror::Error;

/// A single reason a list query was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationIssue {
    #[error("{path} must be an integer, got '{value}'")]
    NotAnInteger { path: String, value: String },

    #[error("page must be between 1 and {max}, got {value}")]
    PageOutOfRange { value: i64, max: i64 },

    #[error("pageSize must be between 1 and {max}, got {value}")]
    PageSizeOutOfRange { value: i64, max: i64 },

    #[error("sort[{index}].order must be 'asc' or 'desc', got '{order}'")]
    InvalidSortOrder { index: usize, order: String },

    #[error("sort[{index}].field '{field}' is not sortable")]
    SortFieldNotAllowed { index: usize, field: String },

    #[error("filters[{field}][$between] needs two comma-separated bounds, got '{value}'")]
    MalformedRange { field: String, value: String },
}

impl ValidationIssue {
    /// Location of the offending input, in wire notation.
    pub fn path(&self) -> String {
        match self {
            ValidationIssue::NotAnInteger { path, .. } => path.clone(),
            ValidationIssue::PageOutOfRange { .. } => "page".to_string(),
            ValidationIssue::PageSizeOutOfRange { .. } => "pageSize".to_string(),
            ValidationIssue::InvalidSortOrder { index, .. } => format!("sort[{index}].order"),
            ValidationIssue::SortFieldNotAllowed { index, .. } => format!("sort[{index}].field"),
            ValidationIssue::MalformedRange { field, .. } => format!("filters[{field}][$between]"),
        }
    }
}

/// Structural rejection of a list query. Carries every issue found, not
/// just the first.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("invalid list query: {}", summarize(.issues))]
pub struct SchemaValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl SchemaValidationError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
