//! HTTP API
//!
//! - `routes.rs` - router, handlers and the serve loop
//! - `types.rs` - request/response bodies
//! - `error.rs` - error to response mapping

pub mod error;
pub mod routes;
pub mod types;

pub use routes::serve;
