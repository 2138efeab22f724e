pub mod pagination_links;
pub mod query_extractor;
pub mod server;
