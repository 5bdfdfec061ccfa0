//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request id, tracing, timeouts)
//!     → middleware/tracking.rs (route attribution, task label)
//!     → handlers.rs (metrics endpoints, demo load endpoints)
//!     → query.rs (lenient query parameter parsing)
//! ```

pub mod handlers;
pub mod middleware;
pub mod query;
pub mod request;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
