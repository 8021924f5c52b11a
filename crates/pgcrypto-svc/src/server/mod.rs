//! Axum HTTP server: routing, middleware and handlers.
//!
//! The router is served over plain TCP; TLS termination belongs to the
//! deployment in front of it.

pub mod handlers;
pub mod middleware;
pub mod payload;
pub mod router;
pub mod state;
