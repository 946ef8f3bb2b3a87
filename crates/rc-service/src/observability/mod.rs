//! Observability module for the Room Controller.

pub mod metrics;
