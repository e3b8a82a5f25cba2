//! Configuration types and loading
//!
//! Secrets (suite secret, suite ticket, provider secret) are read from env
//! vars or from files named in the config, never from the TOML itself.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::Secret;
use serde::Deserialize;
use wecom_auth::{API_PREFIX, DEFAULT_RETRY_BUDGET};

pub const SUITE_SECRET_VAR: &str = "WECOM_SUITE_SECRET";
pub const SUITE_TICKET_VAR: &str = "WECOM_SUITE_TICKET";
pub const PROVIDER_SECRET_VAR: &str = "WECOM_PROVIDER_SECRET";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub suite: Option<SuiteConfig>,
    #[serde(default)]
    pub provider: Option<ProviderConfig>,
    #[serde(default)]
    pub token_store: TokenStoreConfig,
}

/// Platform API settings shared by both clients
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,
    /// Headers added to every platform call
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            timeout_secs: default_timeout(),
            retry_budget: default_retry_budget(),
            headers: BTreeMap::new(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Suite identity
#[derive(Debug, Deserialize)]
pub struct SuiteConfig {
    pub suite_id: String,
    #[serde(skip)]
    pub suite_secret: Option<Secret<String>>,
    /// Path to a file containing the suite secret (alternative to WECOM_SUITE_SECRET)
    #[serde(default)]
    pub suite_secret_file: Option<PathBuf>,
    #[serde(skip)]
    pub suite_ticket: Option<Secret<String>>,
    /// Path to the file the ticket callback handler keeps current
    #[serde(default)]
    pub suite_ticket_file: Option<PathBuf>,
}

/// Provider identity
#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    pub corp_id: String,
    #[serde(skip)]
    pub provider_secret: Option<Secret<String>>,
    #[serde(default)]
    pub provider_secret_file: Option<PathBuf>,
}

/// Where access tokens are kept between runs
#[derive(Debug, Default, Deserialize)]
pub struct TokenStoreConfig {
    /// Directory holding `suite_token.json` / `provider_token.json`.
    /// Tokens stay in process memory when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Tokens are refreshed by another process; expiry codes are returned as errors
    #[serde(default)]
    pub externally_managed: bool,
}

fn default_prefix() -> String {
    API_PREFIX.to_string()
}

fn default_timeout() -> u64 {
    15
}

fn default_retry_budget() -> u32 {
    DEFAULT_RETRY_BUDGET
}

impl Config {
    /// Load configuration from a TOML file, then resolve secrets.
    ///
    /// Each secret resolves from its env var first, then its `*_file` path.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if !config.api.prefix.starts_with("http://") && !config.api.prefix.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "api.prefix must start with http:// or https://, got: {}",
                config.api.prefix
            )));
        }

        if config.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if config.api.retry_budget == 0 {
            return Err(common::Error::Config(
                "retry_budget must be greater than 0".into(),
            ));
        }

        if config.suite.is_none() && config.provider.is_none() {
            return Err(common::Error::Config(
                "at least one of [suite] or [provider] must be configured".into(),
            ));
        }

        if let Some(suite) = config.suite.as_mut() {
            suite.suite_secret =
                resolve_secret(SUITE_SECRET_VAR, suite.suite_secret_file.as_deref())?;
            suite.suite_ticket =
                resolve_secret(SUITE_TICKET_VAR, suite.suite_ticket_file.as_deref())?;
            if suite.suite_secret.is_none() {
                return Err(common::Error::MissingSecret {
                    name: "suite secret",
                    env_var: SUITE_SECRET_VAR,
                    file_key: "suite_secret_file",
                });
            }
            if suite.suite_ticket.is_none() {
                return Err(common::Error::MissingSecret {
                    name: "suite ticket",
                    env_var: SUITE_TICKET_VAR,
                    file_key: "suite_ticket_file",
                });
            }
        }

        if let Some(provider) = config.provider.as_mut() {
            provider.provider_secret =
                resolve_secret(PROVIDER_SECRET_VAR, provider.provider_secret_file.as_deref())?;
            if provider.provider_secret.is_none() {
                return Err(common::Error::MissingSecret {
                    name: "provider secret",
                    env_var: PROVIDER_SECRET_VAR,
                    file_key: "provider_secret_file",
                });
            }
        }

        Ok(config)
    }
}

/// Env var wins over file; a blank env var or file counts as unset.
fn resolve_secret(var: &str, file: Option<&Path>) -> common::Result<Option<Secret<String>>> {
    if let Ok(value) = std::env::var(var) {
        let secret = Secret::new(value);
        if !secret.is_blank() {
            return Ok(Some(secret));
        }
    }
    let Some(file) = file else {
        return Ok(None);
    };
    let value = std::fs::read_to_string(file).map_err(|e| {
        common::Error::Config(format!("failed to read {}: {e}", file.display()))
    })?;
    let value = value.trim().to_owned();
    if value.is_empty() {
        return Ok(None);
    }
    Ok(Some(Secret::new(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that mutate environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn clear_secret_env() {
        unsafe {
            remove_env(SUITE_SECRET_VAR);
            remove_env(SUITE_TICKET_VAR);
            remove_env(PROVIDER_SECRET_VAR);
        }
    }

    /// Write `toml` plus secret files into a fresh temp dir.
    fn write_config(dir: &tempfile::TempDir, toml: &str) -> PathBuf {
        std::fs::write(dir.path().join("suite_secret"), "suite-secret-file\n").unwrap();
        std::fs::write(dir.path().join("suite_ticket"), "ticket-file\n").unwrap();
        std::fs::write(dir.path().join("provider_secret"), "provider-secret-file\n").unwrap();
        let toml = toml.replace("{dir}", &dir.path().display().to_string());
        let path = dir.path().join("config.toml");
        std::fs::write(&path, toml).unwrap();
        path
    }

    const FULL: &str = r#"
[api]
prefix = "https://qyapi.weixin.qq.com/cgi-bin/"
timeout_secs = 5

[api.headers]
x-request-source = "wecom-service"

[suite]
suite_id = "ww_suite"
suite_secret_file = "{dir}/suite_secret"
suite_ticket_file = "{dir}/suite_ticket"

[provider]
corp_id = "wxvendor"
provider_secret_file = "{dir}/provider_secret"

[token_store]
dir = "/var/lib/wecom"
"#;

    #[test]
    fn test_load_full_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_secret_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, FULL);

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.timeout(), Duration::from_secs(5));
        assert_eq!(config.api.retry_budget, DEFAULT_RETRY_BUDGET);
        assert_eq!(config.api.headers["x-request-source"], "wecom-service");

        let suite = config.suite.unwrap();
        assert_eq!(suite.suite_id, "ww_suite");
        assert_eq!(suite.suite_secret.unwrap().expose(), "suite-secret-file");
        assert_eq!(suite.suite_ticket.unwrap().expose(), "ticket-file");

        let provider = config.provider.unwrap();
        assert_eq!(provider.provider_secret.unwrap().expose(), "provider-secret-file");

        assert_eq!(config.token_store.dir, Some(PathBuf::from("/var/lib/wecom")));
        assert!(!config.token_store.externally_managed);
    }

    #[test]
    fn test_defaults_for_minimal_provider_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_secret_env();
        unsafe { set_env(PROVIDER_SECRET_VAR, "from-env") };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[provider]\ncorp_id = \"wxvendor\"\n");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.prefix, API_PREFIX);
        assert_eq!(config.api.timeout_secs, 15);
        assert!(config.suite.is_none());
        assert!(config.token_store.dir.is_none());
        assert_eq!(
            config.provider.unwrap().provider_secret.unwrap().expose(),
            "from-env"
        );
        clear_secret_env();
    }

    #[test]
    fn test_env_overrides_secret_files() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_secret_env();
        unsafe {
            set_env(SUITE_SECRET_VAR, "env-secret");
            set_env(SUITE_TICKET_VAR, "env-ticket");
        }
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, FULL);

        let suite = Config::load(&path).unwrap().suite.unwrap();
        assert_eq!(suite.suite_secret.unwrap().expose(), "env-secret");
        assert_eq!(suite.suite_ticket.unwrap().expose(), "env-ticket");
        clear_secret_env();
    }

    #[test]
    fn test_blank_env_falls_back_to_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_secret_env();
        unsafe { set_env(SUITE_TICKET_VAR, "   ") };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, FULL);

        let suite = Config::load(&path).unwrap().suite.unwrap();
        assert_eq!(suite.suite_ticket.unwrap().expose(), "ticket-file");
        clear_secret_env();
    }

    #[test]
    fn test_missing_ticket_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_secret_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[suite]\nsuite_id = \"s\"\nsuite_secret_file = \"{dir}/suite_secret\"\n",
        );

        let err = Config::load(&path).unwrap_err();
        assert!(
            matches!(
                err,
                common::Error::MissingSecret {
                    name: "suite ticket",
                    ..
                }
            ),
            "got: {err:?}"
        );
        assert!(err.to_string().contains("suite ticket missing"), "got: {err}");
    }

    #[test]
    fn test_blank_secret_file_counts_as_missing() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_secret_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[provider]\ncorp_id = \"c\"\nprovider_secret_file = \"{dir}/blank\"\n",
        );
        std::fs::write(dir.path().join("blank"), "  \n").unwrap();

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("provider secret missing"), "got: {err}");
    }

    #[test]
    fn test_unreadable_secret_file_is_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_secret_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[provider]\ncorp_id = \"c\"\nprovider_secret_file = \"/nonexistent/secret\"\n",
        );

        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("failed to read /nonexistent/secret"), "got: {err}");
    }

    #[test]
    fn test_no_identity_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[api]\ntimeout_secs = 3\n");
        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("at least one of [suite] or [provider]"));
    }

    #[test]
    fn test_invalid_prefix_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[api]\nprefix = \"qyapi.weixin.qq.com/cgi-bin/\"\n[provider]\ncorp_id = \"c\"\n",
        );
        let err = Config::load(&path).unwrap_err().to_string();
        assert!(err.contains("api.prefix must start with http"), "got: {err}");
    }

    #[test]
    fn test_zero_timeout_and_budget_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[api]\ntimeout_secs = 0\n[provider]\ncorp_id = \"c\"\n");
        assert!(Config::load(&path).is_err(), "timeout_secs = 0 must be rejected");

        let path = write_config(&dir, "[api]\nretry_budget = 0\n[provider]\ncorp_id = \"c\"\n");
        assert!(Config::load(&path).is_err(), "retry_budget = 0 must be rejected");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(matches!(Config::load(&path), Err(common::Error::Toml(_))));
    }

    #[test]
    fn test_secrets_not_in_debug_output() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_secret_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, FULL);

        let debug = format!("{:?}", Config::load(&path).unwrap());
        assert!(!debug.contains("suite-secret-file"));
        assert!(!debug.contains("ticket-file"));
        assert!(debug.contains("[REDACTED]"));
    }
}
