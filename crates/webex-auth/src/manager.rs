//! Token lifecycle management
//!
//! The run-time side of the token story: every API caller asks the manager
//! for a currently-valid access token and the manager decides, per call,
//! whether the stored token can be handed out as-is, must be refreshed
//! first, or whether the whole pair is dead and the operator has to run the
//! interactive flow again.
//!
//! An internal mutex serializes the load / check / refresh / persist
//! sequence so concurrent callers cannot race two refreshes against each
//! other; the loser of the race would otherwise persist a stale record.

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::constants::TOKEN_ENDPOINT;
use crate::credentials::ClientCredentials;
use crate::error::{Error, Result};
use crate::record::{TokenRecord, unix_now};
use crate::store::TokenStore;
use crate::token::refresh_token;

/// Hands out valid access tokens, refreshing transparently when needed.
pub struct TokenManager {
    credentials: ClientCredentials,
    token_url: String,
    store: TokenStore,
    http: reqwest::Client,
    lock: Mutex<()>,
}

impl TokenManager {
    /// Create a manager against the production Webex token endpoint.
    pub fn new(credentials: ClientCredentials, store: TokenStore) -> Self {
        Self {
            credentials,
            token_url: TOKEN_ENDPOINT.into(),
            store,
            http: reqwest::Client::new(),
            lock: Mutex::new(()),
        }
    }

    /// Override the token endpoint (used by tests to point at a mock).
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Return an access token that is valid right now.
    ///
    /// Reads the stored record on every call so that a refresh persisted by
    /// a concurrent caller (or another invocation of the tool) is picked up
    /// rather than redone:
    ///
    /// - no record on disk: [`Error::NoTokensFound`], run the interactive flow
    /// - access token still valid: returned as-is, no network traffic
    /// - access expired, refresh valid: one refresh round-trip, the new
    ///   record replaces the old one on disk before the token is returned
    /// - both expired: [`Error::TokensExpired`], no network traffic, the
    ///   stored record is left untouched
    pub async fn get_valid_access_token(&self) -> Result<String> {
        let _guard = self.lock.lock().await;

        let record = self.store.load().await?.ok_or(Error::NoTokensFound)?;
        let now = unix_now();

        if !record.access_expired(now) {
            debug!(
                expires_in_secs = record.access_expires_at - now,
                "stored access token still valid"
            );
            return Ok(record.access_token);
        }

        if record.refresh_expired(now) {
            return Err(Error::TokensExpired);
        }

        let refreshed = self.refresh_and_persist(&record).await?;
        Ok(refreshed.access_token)
    }

    /// One refresh round-trip; the refreshed record is persisted before it
    /// is handed back so a crash after this point never loses it.
    async fn refresh_and_persist(&self, record: &TokenRecord) -> Result<TokenRecord> {
        info!("access token expired, refreshing");
        let response = refresh_token(
            &self.http,
            &self.token_url,
            &self.credentials,
            &record.refresh_token,
        )
        .await?;

        let refreshed = TokenRecord::from_response(&response, unix_now());
        self.store.save(&refreshed).await?;
        info!(
            access_expires_at = refreshed.access_expires_at,
            refresh_expires_at = refreshed.refresh_expires_at,
            "access token refreshed"
        );
        Ok(refreshed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const REFRESH_BODY: &str = r#"{
        "access_token": "at_refreshed",
        "expires_in": 1209600,
        "refresh_token": "rt_rotated",
        "refresh_token_expires_in": 7776000
    }"#;

    // Connection-refused port: any request against it fails loudly, which
    // lets tests assert that a code path makes no network calls at all.
    const UNREACHABLE_TOKEN_URL: &str = "http://127.0.0.1:9/access_token";

    async fn spawn_token_endpoint(
        status: &'static str,
        body: &'static str,
    ) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let task_hits = hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                task_hits.fetch_add(1, Ordering::SeqCst);
                let mut buf = vec![0u8; 8192];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        (format!("http://{addr}/access_token"), hits)
    }

    fn manager(dir: &tempfile::TempDir, token_url: &str) -> TokenManager {
        TokenManager::new(
            ClientCredentials::new("Cclient123", "secret"),
            TokenStore::new(dir.path().join("tokens.json")),
        )
        .with_token_url(token_url)
    }

    fn record(access_offset: i64, refresh_offset: i64) -> TokenRecord {
        let now = unix_now() as i64;
        TokenRecord {
            access_token: "at_stored".into(),
            refresh_token: "rt_stored".into(),
            access_expires_at: (now + access_offset) as u64,
            refresh_expires_at: (now + refresh_offset) as u64,
        }
    }

    #[tokio::test]
    async fn missing_record_is_no_tokens_found() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(&dir, UNREACHABLE_TOKEN_URL);

        let result = mgr.get_valid_access_token().await;
        assert!(matches!(result, Err(Error::NoTokensFound)), "got {result:?}");
    }

    #[tokio::test]
    async fn valid_access_token_returned_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(&dir, UNREACHABLE_TOKEN_URL);
        // Valid for another hour; any network call would hit the refused port
        mgr.store.save(&record(3600, 86_400)).await.unwrap();

        let token = mgr.get_valid_access_token().await.unwrap();
        assert_eq!(token, "at_stored");
    }

    #[tokio::test]
    async fn expired_access_triggers_refresh_and_persist() {
        let dir = tempfile::tempdir().unwrap();
        let (token_url, hits) = spawn_token_endpoint("200 OK", REFRESH_BODY).await;
        let mgr = manager(&dir, &token_url);
        mgr.store.save(&record(-10, 86_400)).await.unwrap();

        let token = mgr.get_valid_access_token().await.unwrap();
        assert_eq!(token, "at_refreshed");
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // The rotated pair replaced the old record wholesale
        let stored = mgr.store.load().await.unwrap().unwrap();
        assert_eq!(stored.access_token, "at_refreshed");
        assert_eq!(stored.refresh_token, "rt_rotated");
        assert!(!stored.access_expired(unix_now()));
    }

    #[tokio::test]
    async fn both_expired_fails_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(&dir, UNREACHABLE_TOKEN_URL);
        let stale = record(-7_776_000, -10);
        mgr.store.save(&stale).await.unwrap();

        let result = mgr.get_valid_access_token().await;
        assert!(matches!(result, Err(Error::TokensExpired)), "got {result:?}");

        // The dead record is left in place for inspection
        assert_eq!(mgr.store.load().await.unwrap(), Some(stale));
    }

    #[tokio::test]
    async fn rejected_refresh_token_is_tokens_expired() {
        let dir = tempfile::tempdir().unwrap();
        let (token_url, hits) =
            spawn_token_endpoint("401 Unauthorized", r#"{"message":"revoked"}"#).await;
        let mgr = manager(&dir, &token_url);
        mgr.store.save(&record(-10, 86_400)).await.unwrap();

        let result = mgr.get_valid_access_token().await;
        assert!(matches!(result, Err(Error::TokensExpired)), "got {result:?}");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_server_error_is_auth_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (token_url, _) =
            spawn_token_endpoint("500 Internal Server Error", r#"{"message":"oops"}"#).await;
        let mgr = manager(&dir, &token_url);
        mgr.store.save(&record(-10, 86_400)).await.unwrap();

        let result = mgr.get_valid_access_token().await;
        assert!(matches!(result, Err(Error::AuthFailure(_))), "got {result:?}");
    }

    #[tokio::test]
    async fn concurrent_callers_refresh_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let (token_url, hits) = spawn_token_endpoint("200 OK", REFRESH_BODY).await;
        let mgr = Arc::new(manager(&dir, &token_url));
        mgr.store.save(&record(-10, 86_400)).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..5 {
            let mgr = mgr.clone();
            tasks.push(tokio::spawn(
                async move { mgr.get_valid_access_token().await },
            ));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), "at_refreshed");
        }

        // The first caller refreshes and persists; the rest reload the fresh
        // record under the lock and hand it out without another round-trip.
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
