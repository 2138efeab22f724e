use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;
/// Highest page whose row offset still fits in an `i64` at any legal page size.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

/// Filter operator, written on the wire as `filters[field][$op]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterOperator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Contains,
    NotContains,
    ContainsInsensitive,
    NotContainsInsensitive,
    StartsWith,
    EndsWith,
    IsNull,
    IsNotNull,
    Between,
    And,
    Or,
    Not,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 20] = [
        FilterOperator::Eq,
        FilterOperator::Ne,
        FilterOperator::Lt,
        FilterOperator::Lte,
        FilterOperator::Gt,
        FilterOperator::Gte,
        FilterOperator::In,
        FilterOperator::NotIn,
        FilterOperator::Contains,
        FilterOperator::NotContains,
        FilterOperator::ContainsInsensitive,
        FilterOperator::NotContainsInsensitive,
        FilterOperator::StartsWith,
        FilterOperator::EndsWith,
        FilterOperator::IsNull,
        FilterOperator::IsNotNull,
        FilterOperator::Between,
        FilterOperator::And,
        FilterOperator::Or,
        FilterOperator::Not,
    ];

    /// Wire token, including the leading `$`.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "$eq",
            FilterOperator::Ne => "$ne",
            FilterOperator::Lt => "$lt",
            FilterOperator::Lte => "$lte",
            FilterOperator::Gt => "$gt",
            FilterOperator::Gte => "$gte",
            FilterOperator::In => "$in",
            FilterOperator::NotIn => "$notIn",
            FilterOperator::Contains => "$contains",
            FilterOperator::NotContains => "$notContains",
            FilterOperator::ContainsInsensitive => "$containsInsensitive",
            FilterOperator::NotContainsInsensitive => "$notContainsInsensitive",
            FilterOperator::StartsWith => "$startsWith",
            FilterOperator::EndsWith => "$endsWith",
            FilterOperator::IsNull => "$isNull",
            FilterOperator::IsNotNull => "$isNotNull",
            FilterOperator::Between => "$between",
            FilterOperator::And => "$and",
            FilterOperator::Or => "$or",
            FilterOperator::Not => "$not",
        }
    }

    /// `$between` is desugared before compilation and the logical
    /// combinators are reserved, so none of them reach a condition builder.
    pub fn is_compilable(&self) -> bool {
        !matches!(
            self,
            FilterOperator::Between | FilterOperator::And | FilterOperator::Or | FilterOperator::Not
        )
    }

    pub fn takes_list(&self) -> bool {
        matches!(self, FilterOperator::In | FilterOperator::NotIn)
    }
}

impl FromStr for FilterOperator {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterOperator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw operand of a filter, as received from the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Single(String),
    List(Vec<String>),
}

impl FilterValue {
    pub fn as_single(&self) -> Option<&str> {
        match self {
            FilterValue::Single(value) => Some(value),
            FilterValue::List(_) => None,
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Single(value) => f.write_str(value),
            FilterValue::List(values) => f.write_str(&values.join(",")),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Single(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Single(value)
    }
}

impl<S: Into<String>> From<Vec<S>> for FilterValue {
    fn from(values: Vec<S>) -> Self {
        FilterValue::List(values.into_iter().map(Into::into).collect())
    }
}

/// Filter on a single field: either a bare value (shorthand for `$eq`) or
/// a map of operator token to operand.
///
/// Operator keys are kept as wire tokens so an unknown operator can travel
/// to the compiler and be skipped there on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldFilter {
    Value(FilterValue),
    Operators(BTreeMap<String, FilterValue>),
}

impl FieldFilter {
    pub fn value(value: impl Into<FilterValue>) -> Self {
        FieldFilter::Value(value.into())
    }

    pub fn operators<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FilterValue>,
    {
        FieldFilter::Operators(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// `(operator token, operand)` pairs; a bare value reads as `$eq`.
    pub fn entries(&self) -> Vec<(&str, &FilterValue)> {
        match self {
            FieldFilter::Value(value) => vec![(FilterOperator::Eq.as_str(), value)],
            FieldFilter::Operators(operators) => operators
                .iter()
                .map(|(op, value)| (op.as_str(), value))
                .collect(),
        }
    }
}

/// Field name to filter. Key order carries no meaning.
pub type Filters = BTreeMap<String, FieldFilter>;

/// Splits a `$between` operand into its lower and upper bound.
///
/// Accepts `"low,high"` or a two-element list. Anything else, including an
/// empty bound, yields `None`.
pub fn range_bounds(value: &FilterValue) -> Option<(String, String)> {
    let parts: Vec<&str> = match value {
        FilterValue::Single(raw) => raw.split(',').map(str::trim).collect(),
        FilterValue::List(items) => items.iter().map(|s| s.trim()).collect(),
    };

    match parts.as_slice() {
        [low, high] if !low.is_empty() && !high.is_empty() => {
            Some((low.to_string(), high.to_string()))
        }
        _ => None,
    }
}

/// Rewrites a well-formed `$between` entry into `$gte` + `$lte`.
///
/// Returns the offending operand when the entry is malformed; it is then
/// left in place untouched.
pub(crate) fn desugar_between(
    operators: &mut BTreeMap<String, FilterValue>,
) -> Result<(), FilterValue> {
    let between = FilterOperator::Between.as_str();
    let Some(value) = operators.get(between) else {
        return Ok(());
    };

    let Some((low, high)) = range_bounds(value) else {
        return Err(value.clone());
    };

    operators.remove(between);
    operators.insert(FilterOperator::Gte.as_str().to_string(), low.into());
    operators.insert(FilterOperator::Lte.as_str().to_string(), high.into());
    Ok(())
}

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl FromStr for SortDirection {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(()),
        }
    }
}

/// Sort specification for a single field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub order: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortDirection::Desc,
        }
    }
}

/// Page window requested by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[validate(range(min = 1, max = MAX_PAGE))]
    pub page: i64,
    #[validate(range(min = 1, max = MAX_PAGE_SIZE))]
    pub page_size: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self { page, page_size }
    }

    /// Forces both values into their legal range.
    pub fn clamped(self) -> Self {
        Self {
            page: self.page.clamp(1, MAX_PAGE),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        let clamped = self.clamped();
        let offset = (clamped.page - 1).saturating_mul(clamped.page_size);
        u64::try_from(offset).unwrap_or(0)
    }

    pub fn limit(&self) -> u64 {
        u64::try_from(self.clamped().page_size).unwrap_or(DEFAULT_PAGE_SIZE as u64)
    }
}

/// Pagination echoed back by the storage layer together with totals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResult {
    pub page: i64,
    pub page_size: i64,
    pub page_count: i64,
    pub total: i64,
}

impl PaginationResult {
    pub fn new(pagination: Pagination, total: i64) -> Self {
        let pagination = pagination.clamped();
        let total = total.max(0);
        let page_count =
            total / pagination.page_size + i64::from(total % pagination.page_size != 0);

        Self {
            page: pagination.page,
            page_size: pagination.page_size,
            page_count,
            total,
        }
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.page_size)
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.page_count
    }
}

/// One sort item as written by the client, order still unchecked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSort {
    pub field: String,
    pub order: Option<String>,
}

/// Parser output: structured but neither typed nor authorized
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawQuery {
    pub filters: Filters,
    pub sort: Vec<RawSort>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// Complete list request: filters, sort precedence and page window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<Filters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<SortSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

/// Lenient conversion for handing unvalidated input straight to the
/// compiler: sort items with an unknown order and unparsable pagination
/// values are dropped, and pagination is clamped.
impl From<RawQuery> for Query {
    fn from(raw: RawQuery) -> Self {
        let sort: Vec<SortSpec> = raw
            .sort
            .into_iter()
            .filter_map(|item| {
                let order = match item.order.as_deref() {
                    None => SortDirection::Asc,
                    Some(order) => order.parse().ok()?,
                };
                Some(SortSpec {
                    field: item.field,
                    order,
                })
            })
            .collect();

        let page = raw.page.as_deref().and_then(|v| v.trim().parse::<i64>().ok());
        let page_size = raw
            .page_size
            .as_deref()
            .and_then(|v| v.trim().parse::<i64>().ok());

        let pagination = match (page, page_size) {
            (None, None) => None,
            (page, page_size) => Some(
                Pagination::new(
                    page.unwrap_or(DEFAULT_PAGE),
                    page_size.unwrap_or(DEFAULT_PAGE_SIZE),
                )
                .clamped(),
            ),
        };

        Self {
            filters: (!raw.filters.is_empty()).then_some(raw.filters),
            sort: (!sort.is_empty()).then_some(sort),
            pagination,
        }
    }
}
