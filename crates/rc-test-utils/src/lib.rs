//! # RC Test Utilities
//!
//! Shared test utilities for the Room Controller (RC) service.
//!
//! This crate provides:
//! - Server test harness (`TestRcServer` for E2E tests)
//! - Token assertions against the test API key/secret
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rc_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestRcServer::spawn().await?;
//!     let client = reqwest::Client::new();
//!
//!     let response = client
//!         .get(format!("{}/health", server.url()))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod server_harness;

// Re-export commonly used items
pub use assertions::*;
pub use server_harness::*;
