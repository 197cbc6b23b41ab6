//! Webex REST API client
//!
//! Read-only client for the Webex admin APIs the calling report needs:
//! organizations, licenses, phone numbers, per-person outgoing permissions
//! and intercept settings, and premises PSTN trunks with their route groups.
//!
//! The client holds one access token for its lifetime; callers obtain a
//! fresh token from `webex-auth` before constructing it. All requests are
//! GETs with a `Bearer` header. A 403 on an org-scoped request is retried
//! once after re-reading the org details, which re-elevates partner admin
//! permissions on the Webex side.

pub mod client;
pub mod error;
pub mod types;

pub use client::WebexClient;
pub use error::{Error, Result};
pub use types::{
    InterceptSettings, LicenseCount, LicenseSummary, NumberRecord, Organization,
    OutgoingPermissions, TrunkInventory, TrunkRecord, decode_org_id,
};
