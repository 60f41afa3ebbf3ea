//! HTTP gateway
//!
//! Thin front-end adapter: a query endpoint and a file-upload endpoint, both
//! delegating to the coordination client's two calls. Carries no index logic
//! of its own.

pub mod handlers;
pub mod routes;
pub mod server;
pub mod types;

pub use handlers::AppState;
pub use server::GatewayServer;
