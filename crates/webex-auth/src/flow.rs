//! Interactive authorization-code flow
//!
//! Performs the one-time (or once-per-90-days) interactive grant: builds the
//! consent URL, binds a one-shot localhost listener matching the registered
//! redirect URI, waits for the provider callback, exchanges the code for
//! tokens and persists the resulting record.
//!
//! The listener serves exactly one callback request and then shuts down.
//! A failed exchange is terminal for the run; the operator restarts the flow.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::constants::{AUTHORIZE_ENDPOINT, TOKEN_ENDPOINT};
use crate::credentials::ClientCredentials;
use crate::error::{Error, Result};
use crate::record::{TokenRecord, unix_now};
use crate::store::TokenStore;
use crate::token::exchange_code;

/// How long the callback listener waits for the provider redirect before the
/// flow fails. Five minutes is enough for the operator to click through the
/// consent page.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

const SUCCESS_PAGE: &str = "<html><body><h1>Authorization complete</h1>\
<p>You can close this window and return to the terminal.</p></body></html>";
const FAILURE_PAGE: &str = "<html><body><h1>Authorization failed</h1>\
<p>You can close this window; check the terminal for details.</p></body></html>";

/// Ephemeral state for one authorization attempt.
///
/// Created by [`AuthFlow::begin`], consumed when the callback arrives, then
/// discarded. The state nonce ties the callback to this attempt.
pub struct AuthorizationRequest {
    /// Full consent URL to present to the operator
    pub url: String,
    state: String,
}

/// Query parameters carried by the provider callback.
#[derive(Debug, PartialEq, Eq)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Configuration and entry point for the interactive grant.
pub struct AuthFlow {
    credentials: ClientCredentials,
    authorize_url: String,
    token_url: String,
    redirect_uri: String,
    scopes: Vec<String>,
    callback_timeout: Duration,
    http: reqwest::Client,
}

impl AuthFlow {
    /// Create a flow against the production Webex endpoints.
    pub fn new(
        credentials: ClientCredentials,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            credentials,
            authorize_url: AUTHORIZE_ENDPOINT.into(),
            token_url: TOKEN_ENDPOINT.into(),
            redirect_uri: redirect_uri.into(),
            scopes,
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
            http: reqwest::Client::new(),
        }
    }

    /// Override the provider endpoints (used by tests to point at mocks).
    pub fn with_endpoints(
        mut self,
        authorize_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        self.authorize_url = authorize_url.into();
        self.token_url = token_url.into();
        self
    }

    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    /// Build the consent URL with a fresh state nonce.
    pub fn begin(&self) -> AuthorizationRequest {
        let state = generate_state();
        let url = format!(
            "{}?client_id={}&response_type=code&redirect_uri={}&scope={}&state={}",
            self.authorize_url,
            self.credentials.client_id,
            urlencoded(&self.redirect_uri),
            urlencoded(&self.scopes.join(" ")),
            state,
        );
        AuthorizationRequest { url, state }
    }

    /// Run the full interactive flow: bind the listener, present the consent
    /// URL, serve one callback, exchange the code and persist the record.
    pub async fn run(&self, store: &TokenStore) -> Result<TokenRecord> {
        let listener = self.bind_listener().await?;
        let request = self.begin();

        info!(redirect_uri = %self.redirect_uri, "waiting for authorization callback");
        println!("\nOpen this URL in your browser to authorize the integration:\n");
        println!("{}\n", request.url);

        self.wait_and_exchange(listener, &request, store).await
    }

    /// Bind on the exact host:port of the registered redirect URI. A port
    /// already in use surfaces here, before the operator is sent to the
    /// consent page.
    async fn bind_listener(&self) -> Result<TcpListener> {
        let (host, port, _) = self.redirect_parts()?;
        TcpListener::bind((host.as_str(), port))
            .await
            .map_err(|e| Error::Io(format!("binding callback listener on {host}:{port}: {e}")))
    }

    /// Serve exactly one callback request, then exchange and persist.
    async fn wait_and_exchange(
        &self,
        listener: TcpListener,
        request: &AuthorizationRequest,
        store: &TokenStore,
    ) -> Result<TokenRecord> {
        let (_, _, expected_path) = self.redirect_parts()?;

        // The timeout covers the read as well as the accept: a client that
        // connects and then sends nothing must not stall the flow.
        let received = tokio::time::timeout(self.callback_timeout, async {
            let (mut socket, peer) = listener
                .accept()
                .await
                .map_err(|e| Error::Io(format!("accepting authorization callback: {e}")))?;
            info!(%peer, "authorization callback received");
            let params = read_callback(&mut socket, &expected_path).await;
            Ok::<_, Error>((socket, params))
        })
        .await
        .map_err(|_| {
            Error::AuthFailure(format!(
                "timed out after {}s waiting for the authorization callback",
                self.callback_timeout.as_secs()
            ))
        })?;
        let (mut socket, params) = received?;

        // Answer the browser before touching the token endpoint; the page
        // only reflects whether the callback itself looked valid, including
        // the state check.
        let page = match &params {
            Ok(p)
                if p.error.is_none()
                    && p.code.is_some()
                    && p.state.as_deref() == Some(request.state.as_str()) =>
            {
                SUCCESS_PAGE
            }
            _ => FAILURE_PAGE,
        };
        respond(&mut socket, page).await;
        let params = params?;

        if let Some(error) = params.error {
            let detail = params.error_description.unwrap_or_default();
            warn!(error, detail, "provider denied the authorization request");
            return Err(Error::AuthFailure(format!(
                "provider returned {error}: {detail}"
            )));
        }

        match params.state.as_deref() {
            Some(state) if state == request.state => {}
            _ => return Err(Error::AuthFailure("state mismatch in callback".into())),
        }

        let code = params
            .code
            .ok_or_else(|| Error::AuthFailure("callback carried no authorization code".into()))?;

        let response = exchange_code(
            &self.http,
            &self.token_url,
            &self.credentials,
            &code,
            &self.redirect_uri,
        )
        .await?;

        let record = TokenRecord::from_response(&response, unix_now());
        store.save(&record).await?;
        info!(
            access_expires_at = record.access_expires_at,
            refresh_expires_at = record.refresh_expires_at,
            "authorization complete, tokens stored"
        );
        Ok(record)
    }

    /// Host, port and path of the registered redirect URI.
    fn redirect_parts(&self) -> Result<(String, u16, String)> {
        let url = reqwest::Url::parse(&self.redirect_uri)
            .map_err(|e| Error::AuthFailure(format!("invalid redirect_uri: {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| Error::AuthFailure("redirect_uri has no host".into()))?
            .to_owned();
        let port = url.port_or_known_default().unwrap_or(80);
        Ok((host, port, url.path().to_owned()))
    }
}

/// Generate a random state nonce for CSRF protection: 32 random bytes as
/// URL-safe base64 (no padding).
fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Minimal URL encoding for parameter values.
/// Only encodes characters that would break URL parameter parsing.
fn urlencoded(s: &str) -> String {
    s.replace(' ', "%20")
        .replace(':', "%3A")
        .replace('/', "%2F")
}

/// Read the single callback request off the socket and parse its query.
async fn read_callback(socket: &mut TcpStream, expected_path: &str) -> Result<CallbackParams> {
    let mut buffer = vec![0u8; 8192];
    let size = socket
        .read(&mut buffer)
        .await
        .map_err(|e| Error::Io(format!("reading authorization callback: {e}")))?;
    if size == 0 {
        return Err(Error::AuthFailure("empty callback request".into()));
    }

    let request = String::from_utf8_lossy(&buffer[..size]);
    let target = extract_request_target(&request)?;
    parse_callback_target(target, expected_path)
}

/// Best-effort response to the operator's browser; the flow result does not
/// depend on this write succeeding.
async fn respond(socket: &mut TcpStream, page: &str) {
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        page.len(),
        page
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Pull the request target out of the HTTP request line
/// (`GET /callback?code=... HTTP/1.1`).
fn extract_request_target(request: &str) -> Result<&str> {
    let first_line = request
        .lines()
        .next()
        .ok_or_else(|| Error::AuthFailure("malformed callback request".into()))?;
    let mut parts = first_line.split_whitespace();
    let method = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    if method != "GET" || target.is_empty() {
        return Err(Error::AuthFailure("callback must be a GET request".into()));
    }
    Ok(target)
}

/// Parse the callback target's query parameters.
fn parse_callback_target(target: &str, expected_path: &str) -> Result<CallbackParams> {
    let url = reqwest::Url::parse(&format!("http://localhost{target}"))
        .map_err(|e| Error::AuthFailure(format!("invalid callback target: {e}")))?;

    if url.path() != expected_path {
        return Err(Error::AuthFailure(format!(
            "unexpected callback path {} (expected {expected_path})",
            url.path()
        )));
    }

    let mut params = CallbackParams {
        code: None,
        state: None,
        error: None,
        error_description: None,
    };
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => params.code = Some(value.into_owned()),
            "state" => params.state = Some(value.into_owned()),
            "error" => params.error = Some(value.into_owned()),
            "error_description" => params.error_description = Some(value.into_owned()),
            _ => {}
        }
    }

    if params.code.is_none() && params.error.is_none() {
        return Err(Error::AuthFailure(
            "callback carried neither code nor error".into(),
        ));
    }

    Ok(params)
}
