//! Client error types

/// Errors from the Webex API client.
///
/// An `Api` error carries the status and response body so the report layer
/// can log what the provider actually said before moving on to the next org.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Webex API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("decoding response: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, Error>;
