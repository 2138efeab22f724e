use listquery_core::domain::query::{Pagination, PaginationResult, SortDirection, SortSpec};
use utoipa::OpenApi;

use crate::application::http::{
    pagination_links::PaginationLinks,
    server::api_entities::api_error::{ErrorResponse, IssueResponse},
};

/// Schemas shared by every list endpoint. Services nest this into their own
/// document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "List query API"
    ),
    components(schemas(
        Pagination,
        PaginationResult,
        PaginationLinks,
        SortDirection,
        SortSpec,
        ErrorResponse,
        IssueResponse,
    ))
)]
pub struct ListQueryApiDoc;
