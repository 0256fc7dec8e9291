//! HTTP API
//!
//! Thin axum layer over the task queue. Handlers never touch a browser tab
//! directly; they submit a task and wait for its outcome.

pub mod handlers;
pub mod routes;
pub mod server;
pub mod types;

pub use handlers::AppState;
pub use server::HttpServer;
