//! Command line arguments

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;

/// One-shot client for the WeCom third-party service API
#[derive(Debug, Parser)]
#[command(name = "wecom-service", version, long_about = None)]
pub struct Cli {
    /// TOML config file
    #[arg(long, env = "CONFIG_PATH", default_value = "wecom-service.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Subcommand)]
pub enum Command {
    /// Print the suite access token, issuing one if needed
    Token,
    /// Fetch a pre-auth code and print the suite installation URL
    AuthUrl {
        redirect_uri: String,
        /// Opaque value echoed back on redirect; random UUID when omitted
        state: Option<String>,
    },
    /// service/get_pre_auth_code, optionally limited to some suite apps
    PreAuthCode { appids: Vec<u32> },
    /// service/set_session_info
    SessionInfo {
        pre_auth_code: String,
        #[arg(required = true)]
        appids: Vec<u32>,
    },
    /// service/get_permanent_code
    PermanentCode { auth_code: String },
    /// service/get_auth_info
    AuthInfo {
        corpid: String,
        permanent_code: String,
    },
    /// service/get_agent
    Agent {
        corpid: String,
        permanent_code: String,
        agentid: u32,
    },
    /// service/set_agent with a JSON agent object
    SetAgent {
        corpid: String,
        permanent_code: String,
        #[arg(value_parser = parse_json)]
        agent: Value,
    },
    /// service/get_corp_token
    CorpToken {
        corpid: String,
        permanent_code: String,
    },
    /// Print the provider access token, issuing one if needed
    ProviderToken,
    /// Print the provider login URL
    ProviderAuthUrl {
        redirect_uri: String,
        state: Option<String>,
    },
    /// service/get_login_info
    LoginInfo { auth_code: String },
}

impl Command {
    /// Commands that need the `[provider]` identity.
    pub fn is_provider(&self) -> bool {
        matches!(
            self,
            Command::ProviderToken | Command::ProviderAuthUrl { .. } | Command::LoginInfo { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Token => "token",
            Command::AuthUrl { .. } => "auth-url",
            Command::PreAuthCode { .. } => "pre-auth-code",
            Command::SessionInfo { .. } => "session-info",
            Command::PermanentCode { .. } => "permanent-code",
            Command::AuthInfo { .. } => "auth-info",
            Command::Agent { .. } => "agent",
            Command::SetAgent { .. } => "set-agent",
            Command::CorpToken { .. } => "corp-token",
            Command::ProviderToken => "provider-token",
            Command::ProviderAuthUrl { .. } => "provider-auth-url",
            Command::LoginInfo { .. } => "login-info",
        }
    }
}

fn parse_json(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))
}
