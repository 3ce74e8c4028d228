//! Storage helpers
//!
//! - `json`: JSON files (service configuration)

mod json;

pub use json::JsonStore;
