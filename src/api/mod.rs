//! API Module
//!
//! HTTP front-end exposing a string-keyed TTL cache.
//!
//! # Endpoints
//! - `PUT /set` - Store a key-value pair
//! - `GET /get/:key` - Retrieve a value by key
//! - `GET /contains/:key` - Check whether a key is present
//! - `DELETE /del/:key` - Delete a key
//! - `GET /values` - Snapshot of all stored values
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
