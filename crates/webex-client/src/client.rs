//! HTTP client for the Webex admin APIs

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{
    InterceptResponse, InterceptSettings, ItemsPage, License, LicenseSummary, NumberRecord,
    Organization, OutgoingPermissionResponse, OutgoingPermissions, PhoneNumberPage, RouteGroupPage,
    TrunkInventory, TrunkPage, TrunkRecord,
};

pub const BASE_URL: &str = "https://webexapis.com/v1";

/// Read-only Webex API client bound to one access token.
pub struct WebexClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl WebexClient {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: BASE_URL.into(),
            token: access_token.into(),
        }
    }

    /// Override the API base URL (used by tests to point at a mock).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// All organizations visible to the partner admin, including the
    /// partner's own org.
    pub async fn list_organizations(&self) -> Result<Vec<Organization>> {
        let page: ItemsPage<Organization> = self.get_json("organizations", &[], None).await?;
        Ok(page.items)
    }

    pub async fn organization(&self, org_id: &str) -> Result<Organization> {
        self.get_json(&format!("organizations/{org_id}"), &[], None)
            .await
    }

    /// Calling license totals for one org.
    pub async fn license_summary(&self, org_id: &str) -> Result<LicenseSummary> {
        let page: ItemsPage<License> = self
            .get_json("licenses", &[("orgId", org_id)], Some(org_id))
            .await?;
        Ok(LicenseSummary::from_licenses(&page.items))
    }

    /// All phone numbers provisioned in one org, flattened for the report.
    pub async fn phone_numbers(&self, org_id: &str) -> Result<Vec<NumberRecord>> {
        let page: PhoneNumberPage = self
            .get_json("telephony/config/numbers", &[("orgId", org_id)], Some(org_id))
            .await?;
        Ok(page.phone_numbers.into_iter().map(NumberRecord::from).collect())
    }

    /// Outgoing call permissions for one person.
    pub async fn outgoing_permissions(
        &self,
        org_id: &str,
        person_id: &str,
    ) -> Result<OutgoingPermissions> {
        let response: OutgoingPermissionResponse = self
            .get_json(
                &format!("people/{person_id}/features/outgoingPermission"),
                &[("orgId", org_id)],
                Some(org_id),
            )
            .await?;
        Ok(OutgoingPermissions::from_response(&response))
    }

    /// Call intercept settings for one person.
    pub async fn intercept_settings(
        &self,
        org_id: &str,
        person_id: &str,
    ) -> Result<InterceptSettings> {
        let response: InterceptResponse = self
            .get_json(
                &format!("people/{person_id}/features/intercept"),
                &[("orgId", org_id)],
                Some(org_id),
            )
            .await?;
        Ok(InterceptSettings::from_response(&response))
    }

    /// Premises PSTN trunks for one org, each with the route groups that
    /// use it. Trunks not attached to any route group are omitted. A failed
    /// route-group lookup drops that trunk and marks the inventory
    /// incomplete instead of losing the whole section.
    pub async fn trunks_with_route_groups(&self, org_id: &str) -> Result<TrunkInventory> {
        let page: TrunkPage = self
            .get_json(
                "telephony/config/premisePstn/trunks",
                &[("orgId", org_id)],
                Some(org_id),
            )
            .await?;

        let mut inventory = TrunkInventory::default();
        for trunk in page.trunks {
            let usage: RouteGroupPage = match self
                .get_json(
                    &format!("telephony/config/premisePstn/trunks/{}/usageRouteGroup", trunk.id),
                    &[("orgId", org_id)],
                    Some(org_id),
                )
                .await
            {
                Ok(usage) => usage,
                Err(e) => {
                    warn!(org_id, trunk = %trunk.name, error = %e,
                        "skipping trunk after route-group lookup failure");
                    inventory.incomplete = true;
                    continue;
                }
            };
            if usage.route_groups.is_empty() {
                continue;
            }
            inventory.trunks.push(TrunkRecord {
                name: trunk.name,
                route_groups: usage.route_groups.into_iter().map(|rg| rg.name).collect(),
            });
        }
        Ok(inventory)
    }

    /// GET a JSON resource.
    ///
    /// Partner admin permissions on a customer org can lapse server-side,
    /// turning org-scoped requests into 403s. Reading the org details
    /// re-elevates them, so a 403 with `elevate_org` set triggers that read
    /// and then retries the original request exactly once.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
        elevate_org: Option<&str>,
    ) -> Result<T> {
        let url = format!("{}/{path}", self.base_url);
        let mut response = self.get(&url, params).await?;

        if response.status().as_u16() == 403
            && let Some(org_id) = elevate_org
        {
            warn!(path, org_id, "got 403, re-reading org details to re-elevate");
            let org_url = format!("{}/organizations/{org_id}", self.base_url);
            // Outcome checked via the retry, not here
            let _ = self.get(&org_url, &[]).await;
            response = self.get(&url, params).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            warn!(path, %status, body, "API request failed");
            return Err(Error::Api {
                status: status.as_u16(),
                body,
            });
        }

        debug!(path, %status, "API request ok");
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Decode(format!("{path}: {e}")))
    }

    async fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<reqwest::Response> {
        self.http
            .get(url)
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Mock API server. The handler maps (request path, request index) to a
    /// (status line, JSON body); every raw request is logged for assertions.
    async fn spawn_api<F>(handler: F) -> (String, Arc<Mutex<Vec<String>>>)
    where
        F: Fn(&str, usize) -> (&'static str, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));
        let task_log = log.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let mut buf = vec![0u8; 8192];
                let Ok(size) = socket.read(&mut buf).await else {
                    continue;
                };
                let request = String::from_utf8_lossy(&buf[..size]).into_owned();
                let path = request
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or_default()
                    .to_owned();
                let index = {
                    let mut log = task_log.lock().unwrap();
                    log.push(request);
                    log.len() - 1
                };
                let (status, body) = handler(&path, index);
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        (format!("http://{addr}/v1"), log)
    }

    fn logged_paths(log: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
        log.lock()
            .unwrap()
            .iter()
            .map(|request| {
                request
                    .lines()
                    .next()
                    .and_then(|line| line.split_whitespace().nth(1))
                    .unwrap_or_default()
                    .to_owned()
            })
            .collect()
    }

    const LICENSES_BODY: &str = r#"{"items": [
        {"name": "Webex Calling - Professional", "consumedUnits": 7,
         "totalUnits": 10, "subscriptionId": "Sub-1"}
    ]}"#;

    #[tokio::test]
    async fn organizations_are_listed_with_bearer_auth() {
        let (base_url, log) = spawn_api(|_, _| {
            (
                "200 OK",
                r#"{"items": [
                    {"id": "org-1", "displayName": "Acme"},
                    {"id": "org-2", "displayName": "Globex"}
                ]}"#
                .to_owned(),
            )
        })
        .await;

        let client = WebexClient::new("at_token").with_base_url(&base_url);
        let orgs = client.list_organizations().await.unwrap();

        assert_eq!(orgs.len(), 2);
        assert_eq!(orgs[0].display_name, "Acme");

        let requests = log.lock().unwrap();
        assert!(
            requests[0].to_lowercase().contains("authorization: bearer at_token"),
            "missing bearer header in: {}",
            requests[0]
        );
    }

    #[tokio::test]
    async fn api_error_carries_status_and_body() {
        let (base_url, _) =
            spawn_api(|_, _| ("404 Not Found", r#"{"message":"no such org"}"#.to_owned())).await;

        let client = WebexClient::new("at_token").with_base_url(&base_url);
        let result = client.license_summary("org-x").await;

        match result {
            Err(Error::Api { status, body }) => {
                assert_eq!(status, 404);
                assert!(body.contains("no such org"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn forbidden_request_reelevates_and_retries_once() {
        let (base_url, log) = spawn_api(|path, index| {
            if path.starts_with("/v1/licenses") && index == 0 {
                ("403 Forbidden", r#"{"message":"permissions lapsed"}"#.to_owned())
            } else if path.starts_with("/v1/organizations/") {
                ("200 OK", r#"{"id": "org-1", "displayName": "Acme"}"#.to_owned())
            } else {
                ("200 OK", LICENSES_BODY.to_owned())
            }
        })
        .await;

        let client = WebexClient::new("at_token").with_base_url(&base_url);
        let summary = client.license_summary("org-1").await.unwrap();

        assert_eq!(summary.subscription_ids, vec!["Sub-1"]);
        let paths = logged_paths(&log);
        assert_eq!(paths.len(), 3, "403, org read, retry: {paths:?}");
        assert!(paths[0].starts_with("/v1/licenses"));
        assert_eq!(paths[1], "/v1/organizations/org-1");
        assert!(paths[2].starts_with("/v1/licenses"));
    }

    #[tokio::test]
    async fn persistent_forbidden_is_an_api_error() {
        let (base_url, log) = spawn_api(|path, _| {
            if path.starts_with("/v1/organizations/") {
                ("200 OK", r#"{"id": "org-1", "displayName": "Acme"}"#.to_owned())
            } else {
                ("403 Forbidden", r#"{"message":"still forbidden"}"#.to_owned())
            }
        })
        .await;

        let client = WebexClient::new("at_token").with_base_url(&base_url);
        let result = client.license_summary("org-1").await;

        assert!(
            matches!(result, Err(Error::Api { status: 403, .. })),
            "got {result:?}"
        );
        // One retry, not a loop
        assert_eq!(logged_paths(&log).len(), 3);
    }

    #[tokio::test]
    async fn trunks_without_route_groups_are_omitted() {
        let (base_url, _) = spawn_api(|path, _| {
            if path.starts_with("/v1/telephony/config/premisePstn/trunks/t1/") {
                ("200 OK", r#"{"routeGroups": [{"name": "RG-East"}, {"name": "RG-West"}]}"#.to_owned())
            } else if path.starts_with("/v1/telephony/config/premisePstn/trunks/t2/") {
                ("200 OK", r#"{"routeGroups": []}"#.to_owned())
            } else {
                (
                    "200 OK",
                    r#"{"trunks": [
                        {"name": "Trunk One", "id": "t1"},
                        {"name": "Trunk Two", "id": "t2"}
                    ]}"#
                    .to_owned(),
                )
            }
        })
        .await;

        let client = WebexClient::new("at_token").with_base_url(&base_url);
        let inventory = client.trunks_with_route_groups("org-1").await.unwrap();

        assert_eq!(inventory.trunks.len(), 1);
        assert_eq!(inventory.trunks[0].name, "Trunk One");
        assert_eq!(inventory.trunks[0].route_groups, vec!["RG-East", "RG-West"]);
        assert!(!inventory.incomplete);
    }

    #[tokio::test]
    async fn failed_route_group_lookup_skips_that_trunk_only() {
        let (base_url, _) = spawn_api(|path, _| {
            if path.starts_with("/v1/telephony/config/premisePstn/trunks/t1/") {
                ("200 OK", r#"{"routeGroups": [{"name": "RG-East"}]}"#.to_owned())
            } else if path.starts_with("/v1/telephony/config/premisePstn/trunks/t2/") {
                ("500 Internal Server Error", r#"{"message":"backend down"}"#.to_owned())
            } else if path.starts_with("/v1/organizations/") {
                ("200 OK", r#"{"id": "org-1", "displayName": "Acme"}"#.to_owned())
            } else {
                (
                    "200 OK",
                    r#"{"trunks": [
                        {"name": "Trunk One", "id": "t1"},
                        {"name": "Trunk Two", "id": "t2"}
                    ]}"#
                    .to_owned(),
                )
            }
        })
        .await;

        let client = WebexClient::new("at_token").with_base_url(&base_url);
        let inventory = client.trunks_with_route_groups("org-1").await.unwrap();

        // The healthy trunk survives; the failure is flagged, not fatal
        assert_eq!(inventory.trunks.len(), 1);
        assert_eq!(inventory.trunks[0].name, "Trunk One");
        assert!(inventory.incomplete);
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let (base_url, _) = spawn_api(|_, _| ("200 OK", r#"{"unexpected": true}"#.to_owned())).await;

        let client = WebexClient::new("at_token").with_base_url(&base_url);
        let result = client.list_organizations().await;
        assert!(matches!(result, Err(Error::Decode(_))), "got {result:?}");
    }
}
