pub mod sea_orm_builder;

pub use sea_orm_builder::{ListQueryExt, SeaOrmConditionBuilder};
