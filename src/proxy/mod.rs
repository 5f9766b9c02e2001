//! Read-only HTTP proxy to the upstream live-vehicle API.
//!
//! Forwards vehicle-location and route-point requests to the third-party
//! transit backend with app-style headers, and serves a documented static
//! fallback when the upstream denies the request.

pub mod models;
pub mod routes;
pub mod upstream;

pub use routes::serve;
