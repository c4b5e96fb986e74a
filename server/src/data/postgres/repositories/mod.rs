//! PostgreSQL repository functions, one module per table

pub mod api_key;
pub mod bucket;
pub mod event;
