use std::{convert::Infallible, marker::PhantomData};

use axum::{extract::FromRequestParts, http::request::Parts};
use listquery_core::domain::query::{
    AccessorResolver, AllowListConfig, CompiledQuery, ConditionBuilder, Query, QueryCompiler,
    RawQuery, ValidationOptions, ValidationOutcome, parse_query_string, safe_validate,
};
use tracing::debug;

use super::server::api_entities::api_error::ApiError;

/// A listable resource and the fields clients may filter and sort it by.
pub trait ListEndpoint: Send + Sync + 'static {
    fn allow_list() -> &'static AllowListConfig;
}

/// Validated list query for endpoint `E`
///
/// Usage:
/// ```rust,ignore
/// async fn list_tickets(
///     ListQuery(query, _): ListQuery<TicketsEndpoint>,
/// ) -> Result<Response, ApiError> {
///     // query.filters, query.sort, query.pagination
/// }
/// ```
///
/// Rejects with `400` and the list of issues when the query is malformed.
/// Filters on fields outside the endpoint's allow-list are pruned silently.
#[derive(Debug, Clone)]
pub struct ListQuery<E>(pub Query, pub PhantomData<fn() -> E>);

impl<E: ListEndpoint> ListQuery<E> {
    pub fn new(query: Query) -> Self {
        Self(query, PhantomData)
    }

    pub fn into_inner(self) -> Query {
        self.0
    }

    /// Compiles the query against the endpoint's allow-list.
    pub fn compile<R, B>(&self, resolver: &R, builder: &B) -> CompiledQuery<B::Condition, R::Handle>
    where
        R: AccessorResolver,
        B: ConditionBuilder<Handle = R::Handle>,
    {
        QueryCompiler::new(E::allow_list(), resolver, builder).compile(&self.0)
    }
}

impl<S, E> FromRequestParts<S> for ListQuery<E>
where
    S: Send + Sync,
    E: ListEndpoint,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parse_query_string(parts.uri.query().unwrap_or(""));
        let options = ValidationOptions::for_endpoint(E::allow_list());

        match safe_validate(raw, &options) {
            ValidationOutcome::Success { data } => Ok(ListQuery::new(data)),
            ValidationOutcome::Failure { error } => {
                debug!(uri = %parts.uri, error = %error, "rejecting list query");
                Err(ApiError::Validation(error))
            }
        }
    }
}

/// Parsed but unvalidated query, for handlers that validate on their own terms.
#[derive(Debug, Clone)]
pub struct RawListQuery(pub RawQuery);

impl<S> FromRequestParts<S> for RawListQuery
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(RawListQuery(parse_query_string(
            parts.uri.query().unwrap_or(""),
        )))
    }
}
