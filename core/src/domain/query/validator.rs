//! Structural validation and type coercion of parsed list queries.
//!
//! Decides whether a query is well-formed. Whether a filter field is
//! permitted is left to the compiler, which drops what it does not allow.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;
use validator::Validate;

use crate::domain::query::{
    errors::{SchemaValidationError, ValidationIssue},
    policies::AllowListConfig,
    value_objects::{
        DEFAULT_PAGE, DEFAULT_PAGE_SIZE, FieldFilter, Filters, MAX_PAGE, MAX_PAGE_SIZE, Pagination,
        Query, RawQuery, RawSort, SortDirection, SortSpec, desugar_between,
    },
};

/// Optional field restrictions applied while validating
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    /// Filter fields outside this set are pruned, never rejected.
    pub allowed_filter_fields: Option<HashSet<String>>,
    /// Sort fields outside this set are rejected.
    pub allowed_sort_fields: Option<HashSet<String>>,
}

impl ValidationOptions {
    pub fn for_endpoint(config: &AllowListConfig) -> Self {
        Self {
            allowed_filter_fields: Some(config.allowed_filter_fields.clone()),
            allowed_sort_fields: Some(config.allowed_sort_fields.clone()),
        }
    }
}

/// Result of [`safe_validate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Success { data: Query },
    Failure { error: SchemaValidationError },
}

impl ValidationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ValidationOutcome::Success { .. })
    }
}

impl From<ValidationOutcome> for Result<Query, SchemaValidationError> {
    fn from(outcome: ValidationOutcome) -> Self {
        match outcome {
            ValidationOutcome::Success { data } => Ok(data),
            ValidationOutcome::Failure { error } => Err(error),
        }
    }
}

/// Validates and coerces a parsed query, failing with every issue found.
pub fn validate(
    raw: RawQuery,
    options: &ValidationOptions,
) -> Result<Query, SchemaValidationError> {
    let mut issues = Vec::new();

    let pagination = validate_pagination(raw.page.as_deref(), raw.page_size.as_deref(), &mut issues);
    let sort = validate_sort(raw.sort, options, &mut issues);
    let filters = validate_filters(raw.filters, options, &mut issues);

    if !issues.is_empty() {
        return Err(SchemaValidationError::new(issues));
    }

    Ok(Query {
        filters: (!filters.is_empty()).then_some(filters),
        sort: (!sort.is_empty()).then_some(sort),
        pagination,
    })
}

/// Same checks as [`validate`], reported as a value instead of an `Err`.
pub fn safe_validate(raw: RawQuery, options: &ValidationOptions) -> ValidationOutcome {
    match validate(raw, options) {
        Ok(data) => ValidationOutcome::Success { data },
        Err(error) => ValidationOutcome::Failure { error },
    }
}

/// Async form of [`safe_validate`] for async validation pipelines.
pub async fn safe_validate_async(raw: RawQuery, options: &ValidationOptions) -> ValidationOutcome {
    safe_validate(raw, options)
}

fn coerce_integer(
    path: &str,
    value: Option<&str>,
    default: i64,
    issues: &mut Vec<ValidationIssue>,
) -> Option<i64> {
    let Some(value) = value else {
        return Some(default);
    };

    match value.trim().parse::<i64>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            issues.push(ValidationIssue::NotAnInteger {
                path: path.to_string(),
                value: value.to_string(),
            });
            None
        }
    }
}

fn validate_pagination(
    page: Option<&str>,
    page_size: Option<&str>,
    issues: &mut Vec<ValidationIssue>,
) -> Option<Pagination> {
    let page = coerce_integer("page", page, DEFAULT_PAGE, issues);
    let page_size = coerce_integer("pageSize", page_size, DEFAULT_PAGE_SIZE, issues);
    let pagination = Pagination::new(page?, page_size?);

    if let Err(errors) = pagination.validate() {
        let fields = errors.field_errors();
        if fields.contains_key("page") {
            issues.push(ValidationIssue::PageOutOfRange {
                value: pagination.page,
                max: MAX_PAGE,
            });
        }
        if fields.contains_key("page_size") {
            issues.push(ValidationIssue::PageSizeOutOfRange {
                value: pagination.page_size,
                max: MAX_PAGE_SIZE,
            });
        }
        return None;
    }

    Some(pagination)
}

fn validate_sort(
    sort: Vec<RawSort>,
    options: &ValidationOptions,
    issues: &mut Vec<ValidationIssue>,
) -> Vec<SortSpec> {
    let mut specs = Vec::with_capacity(sort.len());

    for (index, item) in sort.into_iter().enumerate() {
        let order = match item.order.as_deref() {
            None => Some(SortDirection::Asc),
            Some(order) => order.parse::<SortDirection>().ok().or_else(|| {
                issues.push(ValidationIssue::InvalidSortOrder {
                    index,
                    order: order.to_string(),
                });
                None
            }),
        };

        if let Some(allowed) = &options.allowed_sort_fields
            && !allowed.contains(&item.field)
        {
            issues.push(ValidationIssue::SortFieldNotAllowed {
                index,
                field: item.field.clone(),
            });
            continue;
        }

        if let Some(order) = order {
            specs.push(SortSpec {
                field: item.field,
                order,
            });
        }
    }

    specs
}

fn validate_filters(
    filters: Filters,
    options: &ValidationOptions,
    issues: &mut Vec<ValidationIssue>,
) -> Filters {
    let mut validated = Filters::new();

    for (field, filter) in filters {
        if let Some(allowed) = &options.allowed_filter_fields
            && !allowed.contains(&field)
        {
            debug!(field = %field, "pruning filter on field outside the allow-list");
            continue;
        }

        let filter = match filter {
            FieldFilter::Operators(mut operators) => {
                if let Err(value) = desugar_between(&mut operators) {
                    issues.push(ValidationIssue::MalformedRange {
                        field: field.clone(),
                        value: value.to_string(),
                    });
                }
                FieldFilter::Operators(operators)
            }
            value => value,
        };

        validated.insert(field, filter);
    }

    validated
}
