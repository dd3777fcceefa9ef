// Run configuration: defaults, then coinsnap.toml, then COINSNAP_* env (`__` nests).

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::market_data::types::Target;

pub const DEFAULT_BASE_URL: &str = "https://www.coingecko.com/en/all-cryptocurrencies";
pub const DEFAULT_API_ENDPOINT: &str = "https://api.coingecko.com/api/v3/coins/markets";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub target_rows: usize,
    pub base_url: String,
    pub output: PathBuf,
    pub api: ApiSettings,
    pub paging: PagingSettings,
    pub expand: ExpandSettings,
    pub pool: PoolSettings,
    pub browser: BrowserSettings,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target_rows: 1250,
            base_url: DEFAULT_BASE_URL.to_string(),
            output: PathBuf::from("coins.csv"),
            api: ApiSettings::default(),
            paging: PagingSettings::default(),
            expand: ExpandSettings::default(),
            pool: PoolSettings::default(),
            browser: BrowserSettings::default(),
        }
    }
}

impl RunConfig {
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let builder = match file {
            Some(path) => Config::builder().add_source(File::from(path).required(true)),
            None => Config::builder().add_source(File::with_name("coinsnap").required(false)),
        };
        builder
            .add_source(
                Environment::with_prefix("COINSNAP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn target(&self) -> Target {
        Target::new(self.target_rows, self.base_url.clone())
    }
}

/// JSON markets endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub endpoint: String,
    pub vs_currency: String,
    pub order: String,
    pub per_page: u32,
    /// Comma-separated percentage-change windows.
    pub windows: String,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_API_ENDPOINT.to_string(),
            vs_currency: "usd".to_string(),
            order: "market_cap_desc".to_string(),
            per_page: 250,
            windows: "1h,24h,7d,30d".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PagingSettings {
    pub max_pages: u32,
    pub cooldown_secs: u64,
    pub page_pause_ms: u64,
    /// Consecutive backoffs on one page before giving up on it.
    pub max_rate_limit_retries: u32,
}

impl Default for PagingSettings {
    fn default() -> Self {
        Self {
            max_pages: 5,
            cooldown_secs: 60,
            page_pause_ms: 1000,
            max_rate_limit_retries: 10,
        }
    }
}

impl PagingSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn page_pause(&self) -> Duration {
        Duration::from_millis(self.page_pause_ms)
    }
}

/// Browser-side waits and the "load more" attempt budget.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExpandSettings {
    pub max_attempts: u32,
    pub initial_wait_ms: u64,
    pub row_wait_ms: u64,
    pub poll_ms: u64,
    pub settle_ms: u64,
    pub nav_timeout_ms: u64,
}

impl Default for ExpandSettings {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            initial_wait_ms: 25_000,
            row_wait_ms: 20_000,
            poll_ms: 250,
            settle_ms: 600,
            nav_timeout_ms: 30_000,
        }
    }
}

impl ExpandSettings {
    pub fn initial_wait(&self) -> Duration {
        Duration::from_millis(self.initial_wait_ms)
    }

    pub fn row_wait(&self) -> Duration {
        Duration::from_millis(self.row_wait_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn nav_timeout(&self) -> Duration {
        Duration::from_millis(self.nav_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub workers: usize,
    pub page_size: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self { workers: 5, page_size: 250 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// When false the HTML paths fetch server-rendered markup over HTTP.
    pub enabled: bool,
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self { enabled: true, headless: true, chrome_path: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_source_constants() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.target_rows, 1250);
        assert_eq!(cfg.pool.workers, 5);
        assert_eq!(cfg.paging.cooldown(), Duration::from_secs(60));
        assert_eq!(cfg.api.per_page, 250);
        let target = cfg.target();
        assert_eq!(target.columns.len(), 12);
        assert_eq!(target.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_file_overrides_nested_sections() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "target_rows = 40\n[pool]\nworkers = 2\n[paging]\ncooldown_secs = 1\n"
        )
        .unwrap();

        let cfg = RunConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.target_rows, 40);
        assert_eq!(cfg.pool.workers, 2);
        assert_eq!(cfg.pool.page_size, 250);
        assert_eq!(cfg.paging.cooldown_secs, 1);
        assert_eq!(cfg.paging.max_pages, 5);
    }

    #[test]
    fn test_poll_never_zero() {
        let s = ExpandSettings { poll_ms: 0, ..ExpandSettings::default() };
        assert_eq!(s.poll(), Duration::from_millis(1));
    }
}
