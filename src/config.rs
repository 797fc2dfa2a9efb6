use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use tracing::trace;

use crate::alerts::AbsencePolicy;

/// Entity store backend configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreConfig {
    /// PostgREST-style HTTP API
    Rest {
        /// Base URL; falls back to `SUPABASE_URL`
        url: Option<String>,

        /// API key; falls back to `SUPABASE_KEY`
        api_key: Option<String>,
    },

    /// Single JSON document holding every collection
    File { path: PathBuf },
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Rest {
            url: None,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct RefreshConfig {
    /// Timer period in seconds, `0` disables the timer
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_debounce_millis")]
    pub debounce_millis: u64,
    #[serde(default = "default_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub render_timeout_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            debounce_millis: default_debounce_millis(),
            fetch_timeout_secs: default_timeout_secs(),
            render_timeout_secs: default_timeout_secs(),
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_millis)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alert {
    Discord(Discord),
    Webhook(Webhook),
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct Webhook {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct Discord {
    pub url: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct AlertsConfig {
    /// Where notifications go; log only when absent
    pub notifier: Option<Alert>,
    #[serde(default = "default_true")]
    pub notify_on_recovery: bool,
    #[serde(default = "default_timeout_secs")]
    pub dispatch_timeout_secs: u64,

    /// Clear alerts of components that vanish from the store
    #[serde(default)]
    pub clear_absent: bool,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            notifier: None,
            notify_on_recovery: true,
            dispatch_timeout_secs: default_timeout_secs(),
            clear_absent: false,
        }
    }
}

impl AlertsConfig {
    pub fn absence_policy(&self) -> AbsencePolicy {
        if self.clear_absent {
            AbsencePolicy::Clear
        } else {
            AbsencePolicy::Retain
        }
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct RenderConfig {
    /// Graphviz DOT output
    pub diagram_path: Option<PathBuf>,

    /// Self-refreshing HTML output
    pub interactive_path: Option<PathBuf>,

    #[serde(default = "default_interactive_refresh_secs")]
    pub interactive_refresh_secs: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            diagram_path: None,
            interactive_path: None,
            interactive_refresh_secs: default_interactive_refresh_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct WatchConfig {
    pub path: PathBuf,
    #[serde(default = "default_poll_millis")]
    pub poll_millis: u64,
}

impl WatchConfig {
    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_millis)
    }
}

/// HTTP API configuration
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Bearer token required on every request; open access when absent
    pub auth_token: Option<String>,

    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            auth_token: None,
            enable_cors: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub render: RenderConfig,

    /// File change source (optional)
    pub watch: Option<WatchConfig>,

    /// HTTP API (optional)
    pub api: Option<ApiConfig>,
}

fn default_interval_secs() -> u64 {
    10
}

fn default_debounce_millis() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_interactive_refresh_secs() -> u64 {
    10
}

fn default_poll_millis() -> u64 {
    500
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

fn default_true() -> bool {
    true
}

/// Read a JSON or TOML (by `.toml` extension) configuration file
pub fn read_config_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let file_content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read configuration file {}", path.display()))?;

    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let config: Config = if is_toml {
        toml::from_str(&file_content).context("invalid TOML configuration")?
    } else {
        serde_json::from_str(&file_content).context("invalid JSON configuration")?
    };

    trace!("loaded config: {config:?}");
    Ok(config)
}
