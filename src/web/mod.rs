//! HTTP API for browsing vehicles and driving scans.

pub mod auth;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod scan;
pub mod status;
pub mod vehicles;

pub use routes::*;
