pub mod api_entities;
pub mod openapi;
