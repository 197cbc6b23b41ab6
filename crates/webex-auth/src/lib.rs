//! Webex OAuth authentication library
//!
//! Provides the authorization-code grant flow, token exchange/refresh, and
//! token file storage for the Webex Calling report tool. This crate is a
//! standalone library with no dependency on the report binary — it can be
//! tested and used independently.
//!
//! Token flow:
//! 1. Operator runs the interactive flow via `flow::AuthFlow::run()`
//! 2. The flow serves one callback, exchanges the code via `token::exchange_code()`
//! 3. The resulting `TokenRecord` is persisted via `store::TokenStore::save()`
//! 4. Each report run calls `manager::TokenManager::get_valid_access_token()`,
//!    which refreshes through `token::refresh_token()` when the access token
//!    has expired and the refresh token has not

pub mod constants;
pub mod credentials;
pub mod error;
pub mod flow;
pub mod manager;
pub mod record;
pub mod store;
pub mod token;

pub use constants::*;
pub use credentials::{ClientCredentials, Secret};
pub use error::{Error, Result};
pub use flow::{AuthFlow, AuthorizationRequest};
pub use manager::TokenManager;
pub use record::TokenRecord;
pub use store::TokenStore;
pub use token::{TokenResponse, exchange_code, refresh_token};
