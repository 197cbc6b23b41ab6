//! Webex OAuth constants
//!
//! Endpoint URLs and scope defaults for the Webex integration. These values
//! identify the public side of the integration; the actual secrets (client
//! secret, access/refresh tokens) live in configuration and the token store.

/// Authorization endpoint presented to the operator for consent
pub const AUTHORIZE_ENDPOINT: &str = "https://webexapis.com/v1/authorize";

/// Token endpoint for code exchange and token refresh
pub const TOKEN_ENDPOINT: &str = "https://webexapis.com/v1/access_token";

/// Default redirect URI. Must match the integration's registered redirect
/// URI bit-for-bit (scheme, host, port, path) or Webex rejects the callback.
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/callback";

/// Scopes required to read org, license, user and telephony data for a
/// partner's managed customers.
pub const DEFAULT_SCOPES: &[&str] = &[
    "spark:organizations_read",
    "spark-admin:licenses_read",
    "spark-admin:people_read",
    "spark-admin:telephony_config_read",
];

/// Documented Webex access token lifetime (14 days). Used as a fallback when
/// the token response omits `expires_in`.
pub const ACCESS_TOKEN_LIFETIME_SECS: u64 = 14 * 24 * 60 * 60;

/// Documented Webex refresh token lifetime (90 days). Used as a fallback when
/// the token response omits `refresh_token_expires_in`.
pub const REFRESH_TOKEN_LIFETIME_SECS: u64 = 90 * 24 * 60 * 60;
