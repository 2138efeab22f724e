//! Canonical string form of a [`Query`], the inverse of the parser.
//!
//! Output is deterministic: filters by field then operator, then sort,
//! then pagination. Parsing the output yields the same query, except that
//! a `$between` comes back as its `$gte`/`$lte` pair.

use url::form_urlencoded;

use crate::domain::query::value_objects::{FieldFilter, FilterValue, Pagination, Query};

pub fn serialize(query: &Query) -> String {
    write_query(query, query.pagination)
}

/// Serializes `query` with its pagination replaced, for links to other pages.
pub fn serialize_with_pagination(query: &Query, pagination: Pagination) -> String {
    write_query(query, Some(pagination))
}

fn write_query(query: &Query, pagination: Option<Pagination>) -> String {
    let mut pairs: Vec<(String, String)> = Vec::new();

    for (field, filter) in query.filters.iter().flatten() {
        let field = encode(field);
        match filter {
            FieldFilter::Value(FilterValue::Single(value)) => {
                push_value(&mut pairs, format!("filters[{field}]"), value);
            }
            // A bare list has no wire form; it would not compile either.
            FieldFilter::Value(FilterValue::List(_)) => {}
            FieldFilter::Operators(operators) => {
                for (operator, value) in operators {
                    let key = format!("filters[{field}][{}]", encode_operator(operator));
                    match value {
                        FilterValue::Single(value) => push_value(&mut pairs, key, value),
                        FilterValue::List(items) => {
                            for (index, item) in items.iter().enumerate() {
                                push_value(&mut pairs, format!("{key}[{index}]"), item);
                            }
                        }
                    }
                }
            }
        }
    }

    for (index, spec) in query.sort.iter().flatten().enumerate() {
        pairs.push((
            format!("sort[{index}]"),
            format!("{}:{}", encode(&spec.field), spec.order.as_str()),
        ));
    }

    if let Some(pagination) = pagination {
        pairs.push(("page".to_string(), pagination.page.to_string()));
        pairs.push(("pageSize".to_string(), pagination.page_size.to_string()));
    }

    pairs
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn push_value(pairs: &mut Vec<(String, String)>, key: String, value: &str) {
    // The parser drops empty values, so emitting one would not round-trip.
    if !value.is_empty() {
        pairs.push((key, encode(value)));
    }
}

fn encode(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

/// Keeps the leading `$` of an operator token readable.
fn encode_operator(token: &str) -> String {
    match token.strip_prefix('$') {
        Some(name) => format!("${}", encode(name)),
        None => encode(token),
    }
}
