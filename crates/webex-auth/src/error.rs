//! Error types for OAuth authentication operations

/// Errors from OAuth authentication operations.
///
/// `AuthFailure`, `TokensExpired` and `NoTokensFound` are terminal for a run:
/// the operator must (re)run the interactive authorization flow. `Network`
/// failures are transient but are surfaced to the caller rather than retried.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("authorization failed: {0}")]
    AuthFailure(String),

    #[error("access and refresh tokens are both expired; re-run the authorization flow")]
    TokensExpired,

    #[error("no stored tokens found; run the authorization flow first")]
    NoTokensFound,

    #[error("network error: {0}")]
    Network(String),

    #[error("token parse error: {0}")]
    TokenParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
