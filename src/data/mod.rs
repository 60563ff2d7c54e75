//! Database models and queries.

pub mod kv;
pub mod models;
pub mod service_items;
pub mod vehicles;
