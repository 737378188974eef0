//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub transactions: TransactionsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Wallet backend connection
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Where the login is kept between invocations
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Length of the trailing window, in calendar days
    #[serde(default = "default_trailing_days")]
    pub trailing_days: u64,
    /// How many recent transactions the dashboard aggregates
    #[serde(default = "default_history_page_size")]
    pub history_page_size: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionsConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON log lines instead of human-readable ones
    #[serde(default)]
    pub json: bool,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:8080/api/v1".to_string()
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_session_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(".walletctl").join("session.json"),
        _ => PathBuf::from(".walletctl").join("session.json"),
    }
}
fn default_trailing_days() -> u64 {
    7
}
fn default_history_page_size() -> u32 {
    100
}
fn default_page_size() -> u32 {
    20
}

impl Config {
    /// Load configuration from file and environment
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Start with defaults
            .set_default("api.base_url", default_base_url())?
            .set_default("api.timeout_ms", default_timeout_ms() as i64)?
            .set_default(
                "session.path",
                default_session_path().to_string_lossy().into_owned(),
            )?
            .set_default("dashboard.trailing_days", default_trailing_days() as i64)?
            .set_default("dashboard.history_page_size", default_history_page_size() as i64)?
            .set_default("transactions.page_size", default_page_size() as i64)?
            .set_default("logging.json", false)?
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (WALLETCTL__API__BASE_URL, ...)
            .add_source(
                config::Environment::with_prefix("WALLETCTL")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.api.base_url)
            .with_context(|| format!("api.base_url is not a valid URL: {}", self.api.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("api.base_url must use http or https, got {}", url.scheme());
        }

        if self.api.timeout_ms == 0 {
            anyhow::bail!("api.timeout_ms must be positive");
        }

        if !(1..=366).contains(&self.dashboard.trailing_days) {
            anyhow::bail!("dashboard.trailing_days must be between 1 and 366");
        }

        if !(1..=1000).contains(&self.dashboard.history_page_size) {
            anyhow::bail!("dashboard.history_page_size must be between 1 and 1000");
        }

        if !(1..=1000).contains(&self.transactions.page_size) {
            anyhow::bail!("transactions.page_size must be between 1 and 1000");
        }

        if self.session.path.as_os_str().is_empty() {
            anyhow::bail!("session.path must not be empty");
        }

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  API:
    base_url: {}
    timeout: {}ms
  Session:
    path: {}
  Dashboard:
    trailing_days: {}
    history_page_size: {}
  Transactions:
    page_size: {}
  Logging:
    json: {}
"#,
            mask_url(&self.api.base_url),
            self.api.timeout_ms,
            self.session.path.display(),
            self.dashboard.trailing_days,
            self.dashboard.history_page_size,
            self.transactions.page_size,
            self.logging.json,
        )
    }
}

/// Mask URL for display (hide credentials and query params)
fn mask_url(url: &str) -> String {
    let base = match url.find('?') {
        Some(idx) => format!("{}?***", &url[..idx]),
        None => url.to_string(),
    };

    match url::Url::parse(&base) {
        Ok(parsed) if parsed.username().is_empty() && parsed.password().is_none() => base,
        Ok(mut parsed) => {
            if parsed.set_username("***").is_ok() && parsed.set_password(None).is_ok() {
                parsed.to_string()
            } else {
                strip_userinfo(&base)
            }
        }
        Err(_) => strip_userinfo(&base),
    }
}

/// Replace everything before `@` in the authority with `***`
fn strip_userinfo(url: &str) -> String {
    let Some(scheme_end) = url.find("://").map(|idx| idx + 3) else {
        return url.to_string();
    };
    let rest = &url[scheme_end..];
    let authority_end = rest
        .find(|c: char| matches!(c, '/' | '?' | '#'))
        .unwrap_or(rest.len());

    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{}***@{}", &url[..scheme_end], &rest[at + 1..]),
        None => url.to_string(),
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            trailing_days: default_trailing_days(),
            history_page_size: default_history_page_size(),
        }
    }
}

impl Default for TransactionsConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            session: SessionConfig::default(),
            dashboard: DashboardConfig::default(),
            transactions: TransactionsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
