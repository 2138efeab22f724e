use listquery_core::domain::query::{Pagination, PaginationResult, Query, serialize_with_pagination};
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

/// Navigation links for a paginated list response
///
/// Every link carries the full canonical query of the request it was built
/// from, with only the page number changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaginationLinks {
    #[serde(rename = "self")]
    pub self_link: String,
    pub first: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    pub last: String,
}

impl PaginationLinks {
    /// `base` is the endpoint URL; any query string it already has is replaced.
    pub fn build(base: &Url, query: &Query, result: &PaginationResult) -> Self {
        let page_size = result.page_size;
        let last_page = result.page_count.max(1);
        let link = |page: i64| page_link(base, query, Pagination::new(page, page_size));

        Self {
            self_link: link(result.page),
            first: link(1),
            prev: result.has_prev().then(|| link((result.page - 1).min(last_page))),
            next: result.has_next().then(|| link(result.page + 1)),
            last: link(last_page),
        }
    }
}

fn page_link(base: &Url, query: &Query, pagination: Pagination) -> String {
    let mut url = base.clone();
    let query_string = serialize_with_pagination(query, pagination);
    url.set_query(Some(&query_string));
    url.to_string()
}

/// One page of a list endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PaginationResult,
    pub links: PaginationLinks,
}

impl<T> Paginated<T> {
    /// Wraps one page of `items` out of `total` matching rows.
    pub fn new(items: Vec<T>, query: &Query, total: i64, base: &Url) -> Self {
        let pagination = PaginationResult::new(query.pagination.unwrap_or_default(), total);
        let links = PaginationLinks::build(base, query, &pagination);

        Self {
            items,
            pagination,
            links,
        }
    }
}
