//! Common utilities and types shared across Room Controller components.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for access token claims and verification
pub mod jwt;
