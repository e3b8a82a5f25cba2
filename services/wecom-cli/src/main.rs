//! WeCom third-party service CLI
//!
//! One-shot binary that:
//! 1. Loads the suite/provider identities from TOML + env/secret files
//! 2. Builds a token-guarded client (file-backed token store when configured)
//! 3. Runs one platform call and prints the JSON result on stdout
//!
//! Logs go to stderr as JSON so stdout stays machine readable.

mod command;
mod config;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wecom_auth::{
    AccessToken, FileTokenStore, MemoryTokenStore, ProviderCredentials, SuiteCredentials,
    TokenStore,
};
use wecom_service::{ClientConfig, ProviderClient, RequestOptions, SuiteClient};

use crate::command::{Cli, Command};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs on stderr with LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    let config_path = cli.config;
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        prefix = %config.api.prefix,
        suite = config.suite.is_some(),
        provider = config.provider.is_some(),
        token_dir = ?config.token_store.dir,
        "configuration loaded"
    );

    let http = reqwest::Client::builder()
        .timeout(config.api.timeout())
        .build()
        .context("failed to build HTTP client")?;

    let output = run(cli.command, &config, http).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Execute one command against the configured platform.
async fn run(command: Command, config: &Config, http: reqwest::Client) -> Result<Value> {
    info!(command = command.name(), "running command");

    if command.is_provider() {
        let client = provider_client(config, http)?;
        return match command {
            Command::ProviderToken => Ok(token_json(&client.latest_token().await?)),
            Command::ProviderAuthUrl {
                redirect_uri,
                state,
            } => {
                let state = state.unwrap_or_else(new_state);
                let url = client.authorization_url(&redirect_uri, &state);
                Ok(json!({ "url": url, "state": state }))
            }
            Command::LoginInfo { auth_code } => Ok(client.get_login_info(&auth_code).await?),
            other => anyhow::bail!("`{}` is not a provider command", other.name()),
        };
    }

    let client = suite_client(config, http)?;
    let output = match command {
        Command::Token => token_json(&client.latest_token().await?),
        Command::AuthUrl {
            redirect_uri,
            state,
        } => {
            let data = client.get_pre_auth_code(None).await?;
            let pre_auth_code = data["pre_auth_code"]
                .as_str()
                .context("get_pre_auth_code response has no pre_auth_code")?;
            let state = state.unwrap_or_else(new_state);
            let url = client.authorization_url(pre_auth_code, &redirect_uri, &state);
            json!({ "url": url, "pre_auth_code": pre_auth_code, "state": state })
        }
        Command::PreAuthCode { appids } => {
            let appids = (!appids.is_empty()).then_some(appids.as_slice());
            client.get_pre_auth_code(appids).await?
        }
        Command::SessionInfo {
            pre_auth_code,
            appids,
        } => client.set_session_info(&pre_auth_code, &appids).await?,
        Command::PermanentCode { auth_code } => client.get_permanent_code(&auth_code).await?,
        Command::AuthInfo {
            corpid,
            permanent_code,
        } => client.get_auth_info(&corpid, &permanent_code).await?,
        Command::Agent {
            corpid,
            permanent_code,
            agentid,
        } => client.get_agent(&corpid, &permanent_code, agentid).await?,
        Command::SetAgent {
            corpid,
            permanent_code,
            agent,
        } => client.set_agent(&corpid, &permanent_code, agent).await?,
        Command::CorpToken {
            corpid,
            permanent_code,
        } => client.get_corp_token(&corpid, &permanent_code).await?,
        other => anyhow::bail!("`{}` is not a suite command", other.name()),
    };
    Ok(output)
}

fn suite_client(config: &Config, http: reqwest::Client) -> Result<SuiteClient> {
    let suite = config
        .suite
        .as_ref()
        .context("no [suite] section in config")?;
    let secret = suite
        .suite_secret
        .clone()
        .context("suite secret not resolved")?;
    let ticket = suite
        .suite_ticket
        .clone()
        .context("suite ticket not resolved")?;

    let credentials = SuiteCredentials::new(suite.suite_id.clone(), secret, ticket);
    Ok(SuiteClient::new(
        credentials,
        client_config(config, http, "suite_token.json"),
    ))
}

fn provider_client(config: &Config, http: reqwest::Client) -> Result<ProviderClient> {
    let provider = config
        .provider
        .as_ref()
        .context("no [provider] section in config")?;
    let secret = provider
        .provider_secret
        .clone()
        .context("provider secret not resolved")?;

    let credentials = ProviderCredentials::new(provider.corp_id.clone(), secret);
    Ok(ProviderClient::new(
        credentials,
        client_config(config, http, "provider_token.json"),
    ))
}

fn client_config(config: &Config, http: reqwest::Client, token_file: &str) -> ClientConfig {
    let mut defaults = RequestOptions::new().with_timeout(config.api.timeout());
    for (name, value) in &config.api.headers {
        defaults = defaults.with_header(name.as_str(), value.as_str());
    }

    ClientConfig::new()
        .with_prefix(config.api.prefix.as_str())
        .with_defaults(defaults)
        .with_store(token_store(config.token_store.dir.as_deref(), token_file))
        .externally_managed(config.token_store.externally_managed)
        .with_retry_budget(config.api.retry_budget)
        .with_http_client(http)
}

fn token_store(dir: Option<&Path>, token_file: &str) -> Arc<dyn TokenStore> {
    match dir {
        Some(dir) => Arc::new(FileTokenStore::new(dir.join(token_file))),
        None => Arc::new(MemoryTokenStore::new()),
    }
}

fn token_json(token: &AccessToken) -> Value {
    json!({ "access_token": token.value(), "expires_at": token.expires_at() })
}

fn new_state() -> String {
    uuid::Uuid::new_v4().to_string()
}
