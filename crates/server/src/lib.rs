//! HTTP surface for the crypto stats service
//!
//! Serves the latest snapshot and price deviation queries while the
//! ingestion scheduler runs alongside in the same process.

pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use routes::router;
pub use server::{HttpServer, HttpServerBuilder, HttpServerConfig};
pub use state::AppState;
