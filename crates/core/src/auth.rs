// SPDX-FileCopyrightText: © 2026 OpenCLI Daemon Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! WebSocket auth token generation and verification.
//!
//! Mirrors the daemon's original token scheme so existing mobile/desktop
//! clients keep working: a token is `SHA256(device_id:timestamp:secret)`,
//! with a legacy 32-bit rolling hash accepted as a fallback for clients
//! that predate the SHA256 scheme. A timestamp more than
//! [`MAX_TIMESTAMP_DRIFT_MS`] away from the server's clock is rejected
//! regardless of whether the token itself is valid, bounding replay.

use sha2::{Digest, Sha256};

/// Default auth secret used when no daemon config overrides it. Intended
/// for local development only; production deployments must set their own.
pub const DEFAULT_AUTH_SECRET: &str = "opencli-dev-secret";

/// Maximum allowed absolute difference, in milliseconds, between a token's
/// claimed timestamp and the server's clock.
pub const MAX_TIMESTAMP_DRIFT_MS: i64 = 300_000;

/// Computes `SHA256(device_id:timestamp:auth_secret)` as a lowercase hex
/// string.
pub fn generate_sha256_token(device_id: &str, timestamp: i64, auth_secret: &str) -> String {
    let raw = format!("{device_id}:{timestamp}:{auth_secret}");
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(digest)
}

/// Computes the legacy rolling-hash token, kept only for backwards
/// compatibility with clients built before the SHA256 scheme.
fn generate_simple_token(device_id: &str, timestamp: i64, auth_secret: &str) -> String {
    let raw = format!("{device_id}:{timestamp}:{auth_secret}");
    let mut h: u32 = 0;
    for byte in raw.as_bytes() {
        h = h.wrapping_mul(31).wrapping_add(u32::from(*byte));
    }
    format!("{h:x}")
}

/// Verifies an auth token against the current time, accepting either the
/// SHA256 token or the legacy simple-hash token.
///
/// `now_ms` is injected rather than read from the clock internally so tests
/// can exercise the skew boundary deterministically.
pub fn verify_token(
    device_id: &str,
    timestamp: i64,
    token: &str,
    auth_secret: &str,
    now_ms: i64,
) -> bool {
    if (now_ms - timestamp).abs() > MAX_TIMESTAMP_DRIFT_MS {
        return false;
    }

    let sha256_tok = generate_sha256_token(device_id, timestamp, auth_secret);
    if token == sha256_tok {
        return true;
    }

    let simple_tok = generate_simple_token(device_id, timestamp, auth_secret);
    token == simple_tok
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn sha256_token_round_trips() {
        let token = generate_sha256_token("device-1", 1_000_000, SECRET);
        assert!(verify_token("device-1", 1_000_000, &token, SECRET, 1_000_000));
    }

    #[test]
    fn legacy_simple_token_is_still_accepted() {
        let token = generate_simple_token("device-1", 1_000_000, SECRET);
        assert!(verify_token("device-1", 1_000_000, &token, SECRET, 1_000_000));
    }

    #[test]
    fn token_just_inside_skew_window_is_accepted() {
        let token = generate_sha256_token("device-1", 0, SECRET);
        assert!(verify_token("device-1", 0, &token, SECRET, MAX_TIMESTAMP_DRIFT_MS));
        assert!(verify_token("device-1", 0, &token, SECRET, -MAX_TIMESTAMP_DRIFT_MS));
    }

    #[test]
    fn token_just_outside_skew_window_is_rejected() {
        let token = generate_sha256_token("device-1", 0, SECRET);
        assert!(!verify_token("device-1", 0, &token, SECRET, MAX_TIMESTAMP_DRIFT_MS + 1));
    }

    #[test]
    fn wrong_token_is_rejected() {
        assert!(!verify_token("device-1", 1_000_000, "not-a-real-token", SECRET, 1_000_000));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_sha256_token("device-1", 1_000_000, SECRET);
        assert!(!verify_token("device-1", 1_000_000, &token, "other-secret", 1_000_000));
    }
}
