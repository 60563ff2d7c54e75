pub mod app;
pub mod cli;
pub mod config;
pub mod data;
pub mod dealer;
pub mod logging;
pub mod pricing;
pub mod scraper;
pub mod services;
pub mod state;
pub mod utils;
pub mod web;
