//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The client secret is loaded from the WEBEX_CLIENT_SECRET env var or
//! client_secret_file, never stored in the TOML directly to avoid leaking
//! secrets.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use webex_auth::{ClientCredentials, DEFAULT_REDIRECT_URI, DEFAULT_SCOPES, Secret};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub oauth: OauthConfig,
    pub report: ReportConfig,
}

/// OAuth integration settings
#[derive(Debug, Deserialize)]
pub struct OauthConfig {
    pub client_id: String,
    #[serde(skip)]
    pub client_secret: Option<Secret>,
    /// Path to a file containing the client secret (alternative to the
    /// WEBEX_CLIENT_SECRET env var)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_token_file")]
    pub token_file: PathBuf,
}

/// Report generation settings
#[derive(Debug, Deserialize)]
pub struct ReportConfig {
    /// The partner's own org name; skipped when iterating customer orgs
    pub partner_org: String,
    /// When non-empty, only orgs with these display names are processed
    #[serde(default)]
    pub orgs: Vec<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.into()
}

fn default_scopes() -> Vec<String> {
    DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
}

fn default_token_file() -> PathBuf {
    PathBuf::from("tokens.json")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("reports")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment
    /// variables.
    ///
    /// Client secret resolution order:
    /// 1. WEBEX_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let mut config: Config =
            toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;

        if config.oauth.client_id.is_empty() {
            bail!("oauth.client_id must not be empty");
        }
        if !config.oauth.redirect_uri.starts_with("http://")
            && !config.oauth.redirect_uri.starts_with("https://")
        {
            bail!(
                "oauth.redirect_uri must start with http:// or https://, got: {}",
                config.oauth.redirect_uri
            );
        }
        if config.report.partner_org.is_empty() {
            bail!("report.partner_org must not be empty");
        }

        // Resolve client secret: env var takes precedence over file
        if let Ok(secret) = std::env::var("WEBEX_CLIENT_SECRET") {
            config.oauth.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.oauth.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).with_context(|| {
                format!("reading client_secret_file {}", secret_file.display())
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.oauth.client_secret = Some(Secret::new(secret));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("webex-calling-report.toml")
    }

    /// Credentials for the token endpoint; fails when no secret was
    /// resolved from env or file.
    pub fn credentials(&self) -> Result<ClientCredentials> {
        let secret = self.oauth.client_secret.as_ref().with_context(|| {
            "no client secret: set WEBEX_CLIENT_SECRET or oauth.client_secret_file"
        })?;
        Ok(ClientCredentials::new(
            self.oauth.client_id.clone(),
            secret.expose(),
        ))
    }
}
