//! Bracket-notation query string parser.
//!
//! Turns `filters[status][$eq]=OPEN&sort[0]=createdAt:desc&page=2` into a
//! [`RawQuery`]. The parser knows nothing about any endpoint and never
//! fails: keys it does not recognise and empty values are ignored.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use url::form_urlencoded;

use crate::domain::query::value_objects::{
    FieldFilter, FilterValue, Filters, RawQuery, RawSort, desugar_between,
};

static FILTER_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^filters\[([^\[\]]+)\](?:\[([^\[\]]+)\](?:\[(\d+)\])?)?$")
        .expect("filter key pattern is valid")
});

static SORT_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sort\[(\d+)\]$").expect("sort key pattern is valid"));

/// Operand of one `filters[field][op]` key while the string is being read
#[derive(Debug)]
enum Operand {
    Single(String),
    Indexed(BTreeMap<usize, String>),
}

impl From<Operand> for FilterValue {
    fn from(operand: Operand) -> Self {
        match operand {
            Operand::Single(value) => FilterValue::Single(value),
            Operand::Indexed(items) => FilterValue::List(items.into_values().collect()),
        }
    }
}

#[derive(Debug, Default)]
struct FieldEntries {
    shorthand: Option<String>,
    operators: BTreeMap<String, Operand>,
}

#[derive(Debug, Default)]
struct RawQueryBuilder {
    fields: BTreeMap<String, FieldEntries>,
    indexed_sort: BTreeMap<usize, String>,
    sort: Option<String>,
    page: Option<String>,
    page_size: Option<String>,
}

impl RawQueryBuilder {
    fn push(&mut self, key: &str, value: String) {
        match key {
            "page" => self.page = Some(value),
            "pageSize" => self.page_size = Some(value),
            "sort" => self.sort = Some(value),
            _ => {
                if let Some(captures) = FILTER_KEY.captures(key) {
                    let field = captures[1].to_string();
                    let operator = captures.get(2).map(|m| m.as_str().to_string());
                    let index = captures.get(3).and_then(|m| m.as_str().parse().ok());
                    self.push_filter(field, operator, index, value);
                } else if let Some(captures) = SORT_KEY.captures(key)
                    && let Ok(index) = captures[1].parse()
                {
                    self.indexed_sort.insert(index, value);
                }
            }
        }
    }

    fn push_filter(
        &mut self,
        field: String,
        operator: Option<String>,
        index: Option<usize>,
        value: String,
    ) {
        let entries = self.fields.entry(field).or_default();

        let Some(operator) = operator else {
            entries.shorthand = Some(value);
            return;
        };

        match index {
            None => {
                entries.operators.insert(operator, Operand::Single(value));
            }
            Some(index) => match entries.operators.get_mut(&operator) {
                Some(Operand::Indexed(items)) => {
                    items.insert(index, value);
                }
                _ => {
                    entries.operators.insert(
                        operator,
                        Operand::Indexed(BTreeMap::from([(index, value)])),
                    );
                }
            },
        }
    }

    fn finish(self) -> RawQuery {
        let mut filters = Filters::new();

        for (field, entries) in self.fields {
            if entries.operators.is_empty() {
                if let Some(value) = entries.shorthand {
                    filters.insert(field, FieldFilter::Value(value.into()));
                }
                continue;
            }

            let mut operators: BTreeMap<String, FilterValue> = entries
                .operators
                .into_iter()
                .map(|(op, operand)| (op, operand.into()))
                .collect();

            if let Some(value) = entries.shorthand {
                operators.entry("$eq".to_string()).or_insert(value.into());
            }

            // A malformed range stays as `$between` for the validator to reject.
            let _ = desugar_between(&mut operators);

            filters.insert(field, FieldFilter::Operators(operators));
        }

        let sort_items: Vec<String> = if self.indexed_sort.is_empty() {
            self.sort.into_iter().collect()
        } else {
            self.indexed_sort.into_values().collect()
        };

        RawQuery {
            filters,
            sort: sort_items.iter().filter_map(|item| parse_sort_item(item)).collect(),
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// Splits `field:order` on the last `:` so field names may contain colons.
fn parse_sort_item(item: &str) -> Option<RawSort> {
    let (field, order) = match item.rsplit_once(':') {
        Some((field, order)) => (field.trim(), Some(order.trim())),
        None => (item.trim(), None),
    };

    if field.is_empty() {
        return None;
    }

    Some(RawSort {
        field: field.to_string(),
        order: order.filter(|o| !o.is_empty()).map(str::to_string),
    })
}

/// Parses a raw (still percent-encoded) query string. A leading `?` is
/// allowed.
pub fn parse_query_string(query: &str) -> RawQuery {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut builder = RawQueryBuilder::default();

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if value.is_empty() {
            continue;
        }
        builder.push(&key, value.into_owned());
    }

    builder.finish()
}
