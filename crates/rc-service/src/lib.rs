//! Room Controller (RC) Service Library
//!
//! Control plane for real-time media rooms:
//!
//! - Signed, capability-scoped room access tokens (Grant Builder)
//! - Server-side recording via composite or headless-browser capture
//!   (Recording Orchestrator)
//! - Passthrough room and participant management
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> media server (Twirp)
//!                                   grants/
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `grants` - Grant Builder and token signing
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP metrics middleware
//! - `models` - Request/response bodies
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup
//! - `services` - Media server collaborators and the Recording Orchestrator

pub mod config;
pub mod errors;
pub mod grants;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
