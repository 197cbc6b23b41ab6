//! Webex Calling partner report tool
//!
//! Two modes:
//! 1. `webex-calling-report authorize` — run the interactive OAuth flow
//!    once and persist the token record
//! 2. `webex-calling-report` — obtain a valid access token (refreshing if
//!    needed), gather calling data for every managed customer org and write
//!    the CSV reports

mod config;
mod csv;
mod pipeline;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webex_auth::{AuthFlow, Error as AuthError, TokenManager, TokenStore};
use webex_client::WebexClient;

use crate::config::Config;

/// Parsed command line: optional `--config <path>` and an optional
/// `authorize` subcommand.
#[derive(Debug, PartialEq, Eq)]
struct CliArgs {
    config_path: Option<String>,
    authorize: bool,
}

fn parse_args(args: &[String]) -> CliArgs {
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .cloned();
    let authorize = args.iter().any(|a| a == "authorize");
    CliArgs {
        config_path,
        authorize,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_args(&args);

    let config_path = Config::resolve_path(cli.config_path.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let credentials = config.credentials()?;
    let store = TokenStore::new(config.oauth.token_file.clone());

    if cli.authorize {
        let flow = AuthFlow::new(
            credentials,
            config.oauth.redirect_uri.clone(),
            config.oauth.scopes.clone(),
        );
        let record = flow.run(&store).await.context("authorization flow failed")?;
        info!(
            path = %store.path().display(),
            refresh_expires_at = record.refresh_expires_at,
            "authorization complete"
        );
        return Ok(());
    }

    let manager = TokenManager::new(credentials, store);
    let access_token = match manager.get_valid_access_token().await {
        Ok(token) => token,
        Err(AuthError::NoTokensFound) => {
            anyhow::bail!(
                "no stored tokens at {}; run `webex-calling-report authorize` first",
                manager.store().path().display()
            );
        }
        Err(AuthError::TokensExpired) => {
            anyhow::bail!(
                "both tokens are expired; re-run `webex-calling-report authorize`"
            );
        }
        Err(e) => return Err(e).context("obtaining access token"),
    };

    let client = WebexClient::new(access_token);
    let summary = pipeline::run(&config, &client).await?;

    if summary.errors {
        warn!(
            orgs = summary.orgs_processed,
            path = %summary.output_dir.display(),
            "report finished with errors; see the log for the failed requests"
        );
    } else {
        info!(
            orgs = summary.orgs_processed,
            path = %summary.output_dir.display(),
            "report finished"
        );
    }
    Ok(())
}
