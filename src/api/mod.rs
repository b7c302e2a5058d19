//! API Module
//!
//! HTTP handlers and routing for the cache service.
//!
//! # Endpoints
//! - `PUT /set` - Write a key through both tiers
//! - `GET /get/:key` - Read a key
//! - `DELETE /del/:key` - Delete a key
//! - `POST /flush` - Drop the local tier
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
