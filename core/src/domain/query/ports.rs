use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declared storage type of a filterable column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    #[default]
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    Uuid,
}

impl ColumnType {
    /// Coerces a client-supplied string into the column's type.
    ///
    /// Dates accept RFC 3339 timestamps or a bare `YYYY-MM-DD`, read as
    /// midnight UTC.
    pub fn coerce(&self, raw: &str) -> Option<TypedValue> {
        let trimmed = raw.trim();
        match self {
            ColumnType::Text => Some(TypedValue::Text(raw.to_string())),
            ColumnType::Integer => trimmed.parse().ok().map(TypedValue::Integer),
            ColumnType::Float => trimmed
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(TypedValue::Float),
            ColumnType::Boolean => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(TypedValue::Boolean(true)),
                "false" | "0" => Some(TypedValue::Boolean(false)),
                _ => None,
            },
            ColumnType::Date => parse_date(trimmed).map(TypedValue::Date),
            ColumnType::Uuid => Uuid::parse_str(trimmed).ok().map(TypedValue::Uuid),
        }
    }
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc())
}

/// Operand handed to a condition builder, already coerced to the column type
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    Uuid(Uuid),
}

/// Backend column handle plus the type its filter values are coerced to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAccessor<H> {
    pub handle: H,
    pub declared_type: ColumnType,
}

/// Resolves a public field name to a backend column.
#[cfg_attr(test, mockall::automock(type Handle = String;))]
pub trait AccessorResolver: Send + Sync {
    type Handle: Clone;

    fn resolve(&self, field: &str) -> Option<ColumnAccessor<Self::Handle>>;
}

/// Storage-specific construction of search conditions over an opaque
/// column handle. Implemented once per backend.
pub trait ConditionBuilder {
    type Handle;
    type Condition;

    fn eq(&self, column: &Self::Handle, value: TypedValue) -> Self::Condition;
    fn ne(&self, column: &Self::Handle, value: TypedValue) -> Self::Condition;
    fn lt(&self, column: &Self::Handle, value: TypedValue) -> Self::Condition;
    fn lte(&self, column: &Self::Handle, value: TypedValue) -> Self::Condition;
    fn gt(&self, column: &Self::Handle, value: TypedValue) -> Self::Condition;
    fn gte(&self, column: &Self::Handle, value: TypedValue) -> Self::Condition;

    fn in_set(&self, column: &Self::Handle, values: Vec<TypedValue>) -> Self::Condition;
    fn not_in_set(&self, column: &Self::Handle, values: Vec<TypedValue>) -> Self::Condition;

    /// Case-sensitive match; `pattern` already carries its `%` wildcards.
    fn like(&self, column: &Self::Handle, pattern: String) -> Self::Condition;
    fn not_like(&self, column: &Self::Handle, pattern: String) -> Self::Condition;
    fn ilike(&self, column: &Self::Handle, pattern: String) -> Self::Condition;
    fn not_ilike(&self, column: &Self::Handle, pattern: String) -> Self::Condition;

    fn is_null(&self, column: &Self::Handle) -> Self::Condition;
    fn is_not_null(&self, column: &Self::Handle) -> Self::Condition;

    /// Logical AND of every condition.
    fn all(&self, conditions: Vec<Self::Condition>) -> Self::Condition;
}

/// Map-backed [`AccessorResolver`]
#[derive(Debug, Clone)]
pub struct ColumnMap<H> {
    columns: HashMap<String, ColumnAccessor<H>>,
}

impl<H> Default for ColumnMap<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> ColumnMap<H> {
    pub fn new() -> Self {
        Self {
            columns: HashMap::new(),
        }
    }

    pub fn insert(mut self, field: impl Into<String>, handle: H, declared_type: ColumnType) -> Self {
        self.columns.insert(
            field.into(),
            ColumnAccessor {
                handle,
                declared_type,
            },
        );
        self
    }
}

impl<H> AccessorResolver for ColumnMap<H>
where
    H: Clone + Send + Sync,
{
    type Handle = H;

    fn resolve(&self, field: &str) -> Option<ColumnAccessor<H>> {
        self.columns.get(field).cloned()
    }
}
