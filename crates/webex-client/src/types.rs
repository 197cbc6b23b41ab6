//! Wire types and report-shaped views of the Webex admin APIs
//!
//! The raw structs mirror the JSON the API returns (camelCase fields). The
//! report never consumes most of that verbatim, so each raw type has a
//! processed counterpart that carries exactly what ends up in a report row.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Generic list envelope (`{"items": [...]}`) used by several endpoints.
#[derive(Debug, Deserialize)]
pub struct ItemsPage<T> {
    pub items: Vec<T>,
}

/// An organization visible to the partner admin.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// API org id (base64-wrapped Hydra URI)
    pub id: String,
    pub display_name: String,
}

/// Extract the Control Hub org number from an API org id.
///
/// API ids are base64-encoded Hydra URIs of the form
/// `ciscospark://us/ORGANIZATION/<uuid>`; the Control Hub id shown to
/// admins is the trailing path segment. Ids come without base64 padding,
/// so it is restored before decoding.
pub fn decode_org_id(api_id: &str) -> Result<String> {
    let mut padded = api_id.to_owned();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    let bytes = STANDARD
        .decode(&padded)
        .map_err(|e| Error::Decode(format!("org id is not valid base64: {e}")))?;
    let uri = String::from_utf8(bytes)
        .map_err(|e| Error::Decode(format!("org id is not valid UTF-8: {e}")))?;
    let org_id = uri
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::Decode(format!("org id URI has no path segments: {uri}")))?;
    Ok(org_id.to_owned())
}

/// One license entry as returned by `GET /licenses`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    pub name: String,
    pub consumed_units: u64,
    pub total_units: u64,
    #[serde(default)]
    pub subscription_id: Option<String>,
}

/// Provisioned (consumed) vs booked (total) counts for one license family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LicenseCount {
    pub provisioned: u64,
    pub booked: u64,
}

const PROFESSIONAL_LICENSE: &str = "Webex Calling - Professional";
const WORKSPACE_LICENSE: &str = "Webex Calling - Workspaces";

/// Calling license totals for one org.
///
/// Orgs can hold several entries per license family (one per subscription);
/// the summary sums them and collects the distinct subscription ids.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LicenseSummary {
    pub professional: Option<LicenseCount>,
    pub workspaces: Option<LicenseCount>,
    pub subscription_ids: Vec<String>,
}

impl LicenseSummary {
    pub fn from_licenses(licenses: &[License]) -> Self {
        let mut summary = Self::default();
        for license in licenses {
            let slot = match license.name.as_str() {
                PROFESSIONAL_LICENSE => &mut summary.professional,
                WORKSPACE_LICENSE => &mut summary.workspaces,
                _ => continue,
            };
            let count = slot.get_or_insert_with(LicenseCount::default);
            count.provisioned += license.consumed_units;
            count.booked += license.total_units;

            if let Some(sub_id) = license.subscription_id.as_deref()
                && !sub_id.is_empty()
                && !summary.subscription_ids.iter().any(|s| s == sub_id)
            {
                summary.subscription_ids.push(sub_id.to_owned());
            }
        }
        summary
    }

    pub fn is_empty(&self) -> bool {
        self.professional.is_none() && self.workspaces.is_none()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneNumberPage {
    pub phone_numbers: Vec<RawPhoneNumber>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPhoneNumber {
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub main_number: Option<bool>,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub location: Option<NumberLocation>,
    #[serde(default)]
    pub owner: Option<NumberOwner>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NumberLocation {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberOwner {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub owner_type: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// One phone number row, flattened for the report.
///
/// Owner fields are populated only for numbers assigned to a person;
/// workspaces, voicemail groups and auto attendants keep them empty so
/// per-person feature lookups are skipped for those numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberRecord {
    /// E.164 digits without the leading `+` (empty for extension-only)
    pub phone_number: String,
    pub main_number: bool,
    pub extension: String,
    pub location: String,
    /// Owner display name, `First Last`, people only
    pub owner: String,
    /// Person id used for permission/intercept lookups, people only
    pub owner_id: Option<String>,
    /// `None` when the API omitted the number's state
    pub active: Option<bool>,
}

impl From<RawPhoneNumber> for NumberRecord {
    fn from(raw: RawPhoneNumber) -> Self {
        let (owner, owner_id) = match raw.owner {
            Some(o) if o.owner_type == "PEOPLE" => {
                let name = format!(
                    "{} {}",
                    o.first_name.unwrap_or_default(),
                    o.last_name.unwrap_or_default()
                )
                .trim()
                .to_owned();
                (name, o.id.filter(|id| !id.is_empty()))
            }
            _ => (String::new(), None),
        };

        Self {
            phone_number: raw
                .phone_number
                .map(|n| n.replace('+', ""))
                .unwrap_or_default(),
            main_number: raw.main_number.unwrap_or(false),
            extension: raw.extension.unwrap_or_default(),
            location: raw.location.map(|l| l.name).unwrap_or_default(),
            owner,
            owner_id,
            active: raw.state.map(|s| s == "ACTIVE"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingPermissionResponse {
    pub use_custom_enabled: bool,
    #[serde(default)]
    pub calling_permissions: Vec<CallingPermission>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallingPermission {
    pub call_type: String,
    pub action: String,
}

/// A person's outgoing call permissions, one column per call type.
///
/// The per-type actions are populated only when custom settings are
/// enabled; with default settings the columns stay empty, matching what
/// Control Hub shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingPermissions {
    pub custom: bool,
    pub internal: String,
    pub toll_free: String,
    pub national: String,
    pub international: String,
    pub operator_assistance: String,
    pub chargeable_directory_assistance: String,
    pub special_services_1: String,
    pub special_services_2: String,
    pub premium_services_1: String,
    pub premium_services_2: String,
}

impl OutgoingPermissions {
    pub fn from_response(response: &OutgoingPermissionResponse) -> Self {
        let mut permissions = Self {
            custom: response.use_custom_enabled,
            ..Self::default()
        };
        if !response.use_custom_enabled {
            return permissions;
        }

        for entry in &response.calling_permissions {
            let action = title_case(&entry.action);
            match entry.call_type.as_str() {
                "INTERNAL_CALL" => permissions.internal = action,
                "TOLL_FREE" => permissions.toll_free = action,
                "NATIONAL" => permissions.national = action,
                "INTERNATIONAL" => permissions.international = action,
                "OPERATOR_ASSISTED" => permissions.operator_assistance = action,
                "CHARGEABLE_DIRECTORY_ASSISTED" => {
                    permissions.chargeable_directory_assistance = action
                }
                "SPECIAL_SERVICES_I" => permissions.special_services_1 = action,
                "SPECIAL_SERVICES_II" => permissions.special_services_2 = action,
                "PREMIUM_SERVICES_I" => permissions.premium_services_1 = action,
                "PREMIUM_SERVICES_II" => permissions.premium_services_2 = action,
                _ => {}
            }
        }
        permissions
    }

    /// Report label for the permission mode column.
    pub fn mode_label(&self) -> &'static str {
        if self.custom {
            "Custom Settings"
        } else {
            "Default Settings"
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct InterceptResponse {
    pub enabled: bool,
    #[serde(default)]
    pub outgoing: Option<OutgoingIntercept>,
}

#[derive(Debug, Deserialize)]
pub struct OutgoingIntercept {
    #[serde(rename = "type")]
    pub intercept_type: String,
}

/// A person's call intercept settings, report-shaped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterceptSettings {
    pub enabled: bool,
    /// Outgoing intercept mode label, empty when intercept is disabled
    pub outgoing: String,
}

impl InterceptSettings {
    pub fn from_response(response: &InterceptResponse) -> Self {
        if !response.enabled {
            return Self::default();
        }
        let outgoing = match response.outgoing.as_ref().map(|o| o.intercept_type.as_str()) {
            Some("INTERCEPT_ALL") => "Intercept All Outgoing Calls",
            Some("ALLOW_LOCAL_ONLY") => "Allow Only National Outgoing Calls",
            _ => "",
        };
        Self {
            enabled: true,
            outgoing: outgoing.to_owned(),
        }
    }

    pub fn mode_label(&self) -> &'static str {
        if self.enabled { "Enable" } else { "Disable" }
    }
}

#[derive(Debug, Deserialize)]
pub struct TrunkPage {
    pub trunks: Vec<Trunk>,
}

#[derive(Debug, Deserialize)]
pub struct Trunk {
    pub name: String,
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteGroupPage {
    pub route_groups: Vec<RouteGroup>,
}

#[derive(Debug, Deserialize)]
pub struct RouteGroup {
    pub name: String,
}

/// A trunk together with the route groups it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrunkRecord {
    pub name: String,
    pub route_groups: Vec<String>,
}

/// The trunk section of one org's report.
///
/// `incomplete` is set when a route-group lookup failed for at least one
/// trunk, so the caller can flag the org while keeping the trunks that
/// did resolve.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TrunkInventory {
    pub trunks: Vec<TrunkRecord>,
    pub incomplete: bool,
}

/// `ALLOW` -> `Allow`, `AUTH_CODE` -> `Auth_Code`: uppercase each letter
/// that follows a non-letter, lowercase the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}
