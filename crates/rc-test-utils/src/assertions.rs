//! Custom test assertions for expressive tests
//!
//! Verifies tokens issued by a [`TestRcServer`](crate::TestRcServer)
//! with the harness credentials.

use crate::server_harness::{TEST_API_KEY, TEST_API_SECRET};
use common::jwt::{verify_access_token, SignedClaims};

/// Verify a token signed with the harness credentials.
///
/// Panics with the rejection reason if verification fails.
pub fn decode_test_token(token: &str) -> SignedClaims {
    verify_access_token(token, TEST_API_KEY, TEST_API_SECRET)
        .unwrap_or_else(|e| panic!("token did not verify with test credentials: {e:?}"))
}

/// Custom assertions for room access tokens
///
/// # Example
/// ```rust,ignore
/// token
///     .assert_valid_token()
///     .assert_for_identity("alice")
///     .assert_for_room("standup")
///     .assert_expires_in(6 * 60 * 60);
/// ```
pub trait TokenAssertions {
    /// Assert that the token verifies against the test credentials
    fn assert_valid_token(&self) -> &Self;

    /// Assert that the token is for the specified participant identity
    fn assert_for_identity(&self, identity: &str) -> &Self;

    /// Assert that the token grants joining the specified room
    fn assert_for_room(&self, room: &str) -> &Self;

    /// Assert that the token expires about `seconds` from now
    fn assert_expires_in(&self, seconds: i64) -> &Self;

    /// Assert the publish/subscribe/hidden flags
    fn assert_capabilities(&self, can_publish: bool, can_subscribe: bool, hidden: bool) -> &Self;
}

impl TokenAssertions for String {
    fn assert_valid_token(&self) -> &Self {
        let claims = decode_test_token(self);
        assert_eq!(claims.iss, TEST_API_KEY, "token issuer mismatch");
        assert!(claims.exp > claims.nbf, "token expires before it is valid");
        self
    }

    fn assert_for_identity(&self, identity: &str) -> &Self {
        let claims = decode_test_token(self);
        assert_eq!(
            claims.claims.identity, identity,
            "expected identity '{}', got '{}'",
            identity, claims.claims.identity
        );
        self
    }

    fn assert_for_room(&self, room: &str) -> &Self {
        let claims = decode_test_token(self);
        assert!(claims.claims.video.room_join, "token does not grant room join");
        assert_eq!(claims.claims.video.room, room, "token room mismatch");
        self
    }

    fn assert_expires_in(&self, seconds: i64) -> &Self {
        let claims = decode_test_token(self);
        let now = chrono::Utc::now().timestamp();
        let remaining = claims.exp - now;
        assert!(
            (seconds - 5..=seconds).contains(&remaining),
            "expected expiry in ~{} seconds, got {}",
            seconds,
            remaining
        );
        self
    }

    fn assert_capabilities(&self, can_publish: bool, can_subscribe: bool, hidden: bool) -> &Self {
        let video = decode_test_token(self).claims.video;
        assert_eq!(video.can_publish, Some(can_publish), "can_publish mismatch");
        assert_eq!(video.can_subscribe, Some(can_subscribe), "can_subscribe mismatch");
        assert_eq!(video.hidden, Some(hidden), "hidden mismatch");
        self
    }
}
