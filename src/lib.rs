//! # Libris Backend Library
//!
//! A REST backend for a shared book library: users publish books, and every
//! user can like, bookmark and rate any book.
//!
//! ## Architecture
//!
//! - **Axum**: HTTP server and routing
//! - **SQLx**: asynchronous SQLite access
//! - **Tokio**: async runtime
//! - **Serde**: JSON request and response bodies
//!
//! ## Core Components
//!
//! - [`catalog`]: book storage and the like/rating aggregation query
//! - [`relations`]: the per-user like/bookmark/rating upsert
//! - [`policy`]: owner-or-staff write rule
//! - [`middleware`]: bearer-token identity and security headers
//! - [`routes`]: HTTP handlers and the router
//! - [`config`], [`db`], [`error`], [`metrics`], [`state`], [`types`]: plumbing

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod policy;
pub mod relations;
pub mod routes;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;
