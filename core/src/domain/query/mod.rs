//! List-query handling: parse, validate, compile, serialize.
//!
//! ```text
//! raw string -> parser -> RawQuery -> validator -> Query -> compiler -> predicate + ordering
//!                                                     \-> serializer -> canonical string
//! ```

pub mod compiler;
pub mod errors;
pub mod parser;
pub mod policies;
pub mod ports;
pub mod serializer;
pub mod validator;
pub mod value_objects;

pub use compiler::{CompiledQuery, OrderTerm, QueryCompiler};
pub use errors::{SchemaValidationError, ValidationIssue};
pub use parser::parse_query_string;
pub use policies::AllowListConfig;
pub use ports::{AccessorResolver, ColumnAccessor, ColumnMap, ColumnType, ConditionBuilder, TypedValue};
pub use serializer::{serialize, serialize_with_pagination};
pub use validator::{ValidationOptions, ValidationOutcome, safe_validate, safe_validate_async, validate};
pub use value_objects::{
    FieldFilter, FilterOperator, FilterValue, Filters, Pagination, PaginationResult, Query,
    RawQuery, RawSort, SortDirection, SortSpec,
};
