//! Persisted token record
//!
//! The single canonical record of the current access/refresh token pair and
//! their absolute expiry times. Expiries are unix timestamps in seconds,
//! computed at issuance from the token response's stated lifetimes.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::constants::{ACCESS_TOKEN_LIFETIME_SECS, REFRESH_TOKEN_LIFETIME_SECS};
use crate::token::TokenResponse;

/// Current unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// The access/refresh token pair with absolute expiry timestamps.
///
/// Invariant: `access_expires_at <= refresh_expires_at` at creation time.
/// The record is overwritten wholesale on every refresh, never appended
/// or versioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry as unix seconds (≈ issuance + 14 days)
    pub access_expires_at: u64,
    /// Refresh token expiry as unix seconds (≈ issuance + 90 days)
    pub refresh_expires_at: u64,
}

impl TokenRecord {
    /// Build a record from a token-endpoint response, with expiries anchored
    /// at `now`. Falls back to the documented Webex lifetimes when the
    /// response omits a lifetime field.
    pub fn from_response(response: &TokenResponse, now: u64) -> Self {
        let refresh_lifetime = response
            .refresh_token_expires_in
            .unwrap_or(REFRESH_TOKEN_LIFETIME_SECS);
        // The provider never issues an access token outliving its refresh
        // token; clamp to keep the invariant even on a malformed response.
        let access_lifetime = response
            .expires_in
            .unwrap_or(ACCESS_TOKEN_LIFETIME_SECS)
            .min(refresh_lifetime);

        Self {
            access_token: response.access_token.clone(),
            refresh_token: response.refresh_token.clone(),
            access_expires_at: now + access_lifetime,
            refresh_expires_at: now + refresh_lifetime,
        }
    }

    pub fn access_expired(&self, now: u64) -> bool {
        now >= self.access_expires_at
    }

    pub fn refresh_expired(&self, now: u64) -> bool {
        now >= self.refresh_expires_at
    }
}
