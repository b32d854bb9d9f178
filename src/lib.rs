pub mod analytics;
pub mod api;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod market;
pub mod models;
pub mod service;
pub mod store;
#[cfg(test)]
pub mod test_helpers;
