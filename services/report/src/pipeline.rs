//! Report generation pipeline
//!
//! Gathers calling data for every managed customer org and writes three
//! CSV reports into a timestamped directory: license counts, phone numbers
//! with per-owner permissions, and PSTN trunks with their route groups.
//!
//! A failed API call is logged and flagged but never aborts the run; the
//! remaining orgs still get their rows and the summary reports that errors
//! occurred.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::{info, warn};
use webex_client::{
    InterceptSettings, LicenseSummary, NumberRecord, Organization, OutgoingPermissions,
    TrunkRecord, WebexClient, decode_org_id,
};

use crate::config::Config;
use crate::csv::write_csv;

const LICENSES_HEADER: &[&str] = &[
    "Customer Name",
    "Customer Org ID",
    "Sub-Ref Id(s)",
    "Booked (TOTAL)",
    "Booked Professional Licenses",
    "Booked Workspaces",
    "Provisioned (TOTAL)",
    "Provisioned Professional Licenses",
    "Provisioned Workspaces",
];

const NUMBERS_HEADER: &[&str] = &[
    "Customer Name",
    "Customer Org ID",
    "Phone Number",
    "Main Number",
    "Extension",
    "Location",
    "Assigned to",
    "Status",
    "Outgoing Call Permissions",
    "Internal",
    "Toll-free",
    "National",
    "International",
    "Operator Assistance",
    "Chargeable Directory Assistance",
    "Special Services I",
    "Special Services II",
    "Premium Services I",
    "Premium Services II",
    "Call Intercept",
    "Outgoing Intercept Permissions",
];

const TRUNKS_HEADER: &[&str] = &["Customer Name", "Customer Org ID", "Trunk", "Route Group Name"];

/// Everything gathered for one customer org.
#[derive(Debug, Default)]
pub struct OrgReport {
    pub name: String,
    pub org_id: String,
    pub licenses: LicenseSummary,
    pub numbers: Vec<NumberRecord>,
    /// Keyed by owner person id
    pub permissions: HashMap<String, OutgoingPermissions>,
    pub intercepts: HashMap<String, InterceptSettings>,
    pub trunks: Vec<TrunkRecord>,
    pub error_flag: bool,
}

pub struct RunSummary {
    pub orgs_processed: usize,
    pub errors: bool,
    pub output_dir: PathBuf,
}

/// Run the full pipeline: list orgs, gather per-org data, write the CSVs.
pub async fn run(config: &Config, client: &WebexClient) -> Result<RunSummary> {
    let orgs = client
        .list_organizations()
        .await
        .context("listing organizations")?;
    info!(count = orgs.len(), "found organizations");

    let selected: Vec<&Organization> = orgs
        .iter()
        .filter(|org| org.display_name != config.report.partner_org)
        .filter(|org| {
            config.report.orgs.is_empty() || config.report.orgs.contains(&org.display_name)
        })
        .collect();

    if selected.is_empty() {
        anyhow::bail!("no customer orgs to process");
    }

    let mut reports = Vec::with_capacity(selected.len());
    for (index, org) in selected.iter().enumerate() {
        info!(
            org = %org.display_name,
            progress = format!("{}/{}", index + 1, selected.len()),
            "processing org"
        );
        reports.push(gather_org(client, org).await);
    }

    let output_dir = write_reports(&config.report.output_dir, &reports)?;
    info!(path = %output_dir.display(), "report written");

    Ok(RunSummary {
        orgs_processed: reports.len(),
        errors: reports.iter().any(|r| r.error_flag),
        output_dir,
    })
}

/// Gather licenses, numbers (with per-owner features) and trunks for one
/// org. Errors flag the report and leave that section empty.
async fn gather_org(client: &WebexClient, org: &Organization) -> OrgReport {
    let mut report = OrgReport {
        name: org.display_name.clone(),
        ..OrgReport::default()
    };

    match decode_org_id(&org.id) {
        Ok(org_id) => report.org_id = org_id,
        Err(e) => {
            warn!(org = %org.display_name, error = %e, "could not decode org id");
            report.error_flag = true;
        }
    }

    // Refreshes the display name and, as a side effect, elevates partner
    // permissions on this org before the data calls start.
    match client.organization(&org.id).await {
        Ok(details) => report.name = details.display_name,
        Err(e) => {
            warn!(org = %org.display_name, error = %e, "could not read org details");
            report.error_flag = true;
        }
    }

    match client.license_summary(&org.id).await {
        Ok(summary) => {
            if summary.is_empty() {
                info!(org = %report.name, "no calling licenses found");
            }
            report.licenses = summary;
        }
        Err(e) => {
            warn!(org = %report.name, error = %e, "could not read licenses");
            report.error_flag = true;
        }
    }

    match client.phone_numbers(&org.id).await {
        Ok(numbers) => report.numbers = numbers,
        Err(e) => {
            warn!(org = %report.name, error = %e, "could not read phone numbers");
            report.error_flag = true;
        }
    }

    for number in &report.numbers {
        let Some(owner_id) = number.owner_id.as_deref() else {
            continue;
        };
        if !report.permissions.contains_key(owner_id) {
            match client.outgoing_permissions(&org.id, owner_id).await {
                Ok(permissions) => {
                    report.permissions.insert(owner_id.to_owned(), permissions);
                }
                Err(e) => {
                    warn!(org = %report.name, owner_id, error = %e,
                        "could not read outgoing permissions");
                    report.error_flag = true;
                }
            }
        }
        if !report.intercepts.contains_key(owner_id) {
            match client.intercept_settings(&org.id, owner_id).await {
                Ok(settings) => {
                    report.intercepts.insert(owner_id.to_owned(), settings);
                }
                Err(e) => {
                    warn!(org = %report.name, owner_id, error = %e,
                        "could not read intercept settings");
                    report.error_flag = true;
                }
            }
        }
    }

    match client.trunks_with_route_groups(&org.id).await {
        Ok(inventory) => {
            if inventory.incomplete {
                warn!(org = %report.name, "trunk list is incomplete");
                report.error_flag = true;
            }
            report.trunks = inventory.trunks;
        }
        Err(e) => {
            warn!(org = %report.name, error = %e, "could not read trunks");
            report.error_flag = true;
        }
    }

    report
}

/// Write the three CSVs into `calling_report_<epoch>/` under `output_dir`.
fn write_reports(output_dir: &Path, reports: &[OrgReport]) -> Result<PathBuf> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let dir = output_dir.join(format!("calling_report_{timestamp}"));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating report directory {}", dir.display()))?;

    let licenses: Vec<Vec<String>> = reports.iter().flat_map(license_rows).collect();
    let numbers: Vec<Vec<String>> = reports.iter().flat_map(number_rows).collect();
    let trunks: Vec<Vec<String>> = reports.iter().flat_map(trunk_rows).collect();

    write_csv(&dir.join("licenses.csv"), LICENSES_HEADER, &licenses)?;
    write_csv(&dir.join("numbers.csv"), NUMBERS_HEADER, &numbers)?;
    write_csv(&dir.join("trunks.csv"), TRUNKS_HEADER, &trunks)?;

    Ok(dir)
}

/// One license summary row per org. Absent license families render as
/// empty cells, not zeros.
fn license_rows(report: &OrgReport) -> Vec<Vec<String>> {
    let professional = report.licenses.professional;
    let workspaces = report.licenses.workspaces;

    let booked_total =
        professional.map(|c| c.booked).unwrap_or(0) + workspaces.map(|c| c.booked).unwrap_or(0);
    let provisioned_total = professional.map(|c| c.provisioned).unwrap_or(0)
        + workspaces.map(|c| c.provisioned).unwrap_or(0);

    let cell = |value: Option<u64>| value.map(|v| v.to_string()).unwrap_or_default();

    vec![vec![
        report.name.clone(),
        report.org_id.clone(),
        report.licenses.subscription_ids.join(", "),
        booked_total.to_string(),
        cell(professional.map(|c| c.booked)),
        cell(workspaces.map(|c| c.booked)),
        provisioned_total.to_string(),
        cell(professional.map(|c| c.provisioned)),
        cell(workspaces.map(|c| c.provisioned)),
    ]]
}

/// One row per phone number; a single blank-tail row when the org has no
/// numbers so it still appears in the report.
fn number_rows(report: &OrgReport) -> Vec<Vec<String>> {
    if report.numbers.is_empty() {
        let mut row = vec![report.name.clone(), report.org_id.clone()];
        row.resize(NUMBERS_HEADER.len(), String::new());
        return vec![row];
    }

    report
        .numbers
        .iter()
        .map(|number| {
            let permissions = number
                .owner_id
                .as_deref()
                .and_then(|id| report.permissions.get(id));
            let intercept = number
                .owner_id
                .as_deref()
                .and_then(|id| report.intercepts.get(id));

            let mut row = vec![
                report.name.clone(),
                report.org_id.clone(),
                number.phone_number.clone(),
                if number.main_number { "Main".into() } else { String::new() },
                number.extension.clone(),
                number.location.clone(),
                number.owner.clone(),
                match number.active {
                    Some(true) => "Active".into(),
                    Some(false) => "Not Applicable".into(),
                    // State not reported by the API, leave the cell blank
                    None => String::new(),
                },
            ];

            match permissions {
                Some(p) => {
                    row.push(p.mode_label().into());
                    if p.custom {
                        row.extend([
                            p.internal.clone(),
                            p.toll_free.clone(),
                            p.national.clone(),
                            p.international.clone(),
                            p.operator_assistance.clone(),
                            p.chargeable_directory_assistance.clone(),
                            p.special_services_1.clone(),
                            p.special_services_2.clone(),
                            p.premium_services_1.clone(),
                            p.premium_services_2.clone(),
                        ]);
                    } else {
                        row.extend(std::iter::repeat_n(String::new(), 10));
                    }
                }
                None => row.extend(std::iter::repeat_n(String::new(), 11)),
            }

            match intercept {
                Some(i) => {
                    row.push(i.mode_label().into());
                    row.push(i.outgoing.clone());
                }
                None => row.extend(std::iter::repeat_n(String::new(), 2)),
            }

            row
        })
        .collect()
}

/// One row per routed trunk; a single blank-tail row when the org has none.
fn trunk_rows(report: &OrgReport) -> Vec<Vec<String>> {
    if report.trunks.is_empty() {
        return vec![vec![
            report.name.clone(),
            report.org_id.clone(),
            String::new(),
            String::new(),
        ]];
    }

    report
        .trunks
        .iter()
        .map(|trunk| {
            vec![
                report.name.clone(),
                report.org_id.clone(),
                trunk.name.clone(),
                trunk.route_groups.join(","),
            ]
        })
        .collect()
}
