//! OAuth token exchange and refresh
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (initial interactive flow completion)
//! 2. Token refresh (run-time refresh of an expired access token)
//!
//! Both operations POST to the token endpoint with different grant types.
//! The endpoint URL is passed in so tests can point it at a local mock
//! server; production callers use `constants::TOKEN_ENDPOINT`.

use serde::{Deserialize, Serialize};

use crate::credentials::ClientCredentials;
use crate::error::{Error, Result};

/// Response from the token endpoint for both exchange and refresh.
///
/// The lifetime fields are deltas in seconds from the response time. The
/// caller converts them to absolute unix timestamps when building the
/// persisted `TokenRecord`.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: Option<u64>,
    /// Seconds until the refresh token expires (delta, not absolute)
    pub refresh_token_expires_in: Option<u64>,
}

/// Exchange an authorization code for tokens (initial interactive flow).
///
/// The redirect URI must match the one used in the authorization request
/// exactly or the provider rejects the exchange.
pub async fn exchange_code(
    client: &reqwest::Client,
    token_url: &str,
    credentials: &ClientCredentials,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(token_url)
        .form(&[
            ("grant_type", "authorization_code"),
            ("client_id", &credentials.client_id),
            ("client_secret", credentials.client_secret.expose()),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .send()
        .await
        .map_err(|e| Error::Network(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::AuthFailure(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenParse(format!("invalid token response: {e}")))
}

/// Refresh an access token using a refresh token.
///
/// A 401/403 from the token endpoint means the refresh token has been
/// revoked or is otherwise dead despite its recorded expiry still being in
/// the future; the remedy is the same as an expired pair, so it surfaces
/// as `TokensExpired`.
pub async fn refresh_token(
    client: &reqwest::Client,
    token_url: &str,
    credentials: &ClientCredentials,
    refresh: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("client_id", &credentials.client_id),
            ("client_secret", credentials.client_secret.expose()),
            ("refresh_token", refresh),
        ])
        .send()
        .await
        .map_err(|e| Error::Network(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        if status.as_u16() == 401 || status.as_u16() == 403 {
            tracing::warn!(%status, body, "refresh token rejected by provider");
            return Err(Error::TokensExpired);
        }

        return Err(Error::AuthFailure(format!(
            "token refresh returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenParse(format!("invalid refresh response: {e}")))
}
