use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::query::value_objects::SortSpec;

/// Per-endpoint allow-list: which fields a client may filter and sort on,
/// and the ordering used when the client gives none.
///
/// Built once per endpoint and shared read-only between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowListConfig {
    #[serde(default)]
    pub allowed_filter_fields: HashSet<String>,
    #[serde(default)]
    pub allowed_sort_fields: HashSet<String>,
    #[serde(default)]
    pub default_sort: Vec<SortSpec>,
}

impl AllowListConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_filter_fields
            .extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_sort_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_sort_fields
            .extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_default_sort(mut self, default_sort: Vec<SortSpec>) -> Self {
        self.default_sort = default_sort;
        self
    }

    pub fn can_filter(&self, field: &str) -> bool {
        self.allowed_filter_fields.contains(field)
    }

    pub fn can_sort(&self, field: &str) -> bool {
        self.allowed_sort_fields.contains(field)
    }
}
