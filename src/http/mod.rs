//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup)
//!     → request.rs (assign request ID)
//!     → routing::RequestRouter (select backend, forward)
//!     → response.rs (strip hop-by-hop headers, render errors)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use response::strip_hop_by_hop;
pub use server::{apply_config, AppState, HttpServer};
