// Configuration (strict YAML)
//
// Unknown keys are rejected at every level and values are range-checked after
// parsing. Sections may be omitted; omitted sections take their defaults.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{MetricsError, Result};

pub const CONFIG_ENV: &str = "MEMBERSHIP_METRICS_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "membership-metrics.yaml";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub store: StoreSection,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            store: StoreSection::default(),
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(MetricsError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }

        self.server.validate()?;
        self.store.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        if !(100..=120000).contains(&self.request_timeout_ms) {
            return Err(MetricsError::Config(
                "server.request_timeout_ms must be between 100 and 120000".into(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|e| MetricsError::Config(format!("server.listen '{}': {e}", self.listen)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl StoreSection {
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(MetricsError::Config("store.path must not be empty".into()));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:8000".into()
}
fn default_request_timeout_ms() -> u64 {
    10000
}
fn default_store_path() -> PathBuf {
    PathBuf::from("membership-metrics.db")
}

// ============================================================================
// LOADING
// ============================================================================

pub fn load_from_file(path: &Path) -> Result<MetricsConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| MetricsError::Config(format!("read {} failed: {e}", path.display())))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<MetricsConfig> {
    let cfg: MetricsConfig =
        serde_yaml::from_str(s).map_err(|e| MetricsError::Config(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Config from `$MEMBERSHIP_METRICS_CONFIG`, else `membership-metrics.yaml`.
/// A missing default file means built-in defaults; a missing explicit file is an error.
pub fn load() -> Result<MetricsConfig> {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => load_from_file(Path::new(&path)),
        Err(_) => {
            let path = Path::new(DEFAULT_CONFIG_PATH);
            if path.exists() {
                load_from_file(path)
            } else {
                tracing::info!("no {} found, using defaults", DEFAULT_CONFIG_PATH);
                Ok(MetricsConfig::default())
            }
        }
    }
}
