use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Tunables read from `onionscan.toml`. Every section is optional.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanSettings {
    pub timeout_secs: u64,
    pub concurrency: ConcurrencyConfig,
    pub http: HttpConfig,
    pub banner: BannerConfig,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            concurrency: ConcurrencyConfig::default(),
            http: HttpConfig::default(),
            banner: BannerConfig::default(),
        }
    }
}

impl ScanSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    pub max_targets: usize,
    pub max_banner_probes: usize,
    pub max_path_probes: usize,
    pub max_image_fetches: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_targets: 4,
            max_banner_probes: 8,
            max_path_probes: 4,
            max_image_fetches: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub min_exposed_body_bytes: usize,
    pub max_body_bytes: usize,
    pub max_images: usize,
    pub max_redirects: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0".to_string(),
            min_exposed_body_bytes: 16,
            max_body_bytes: 5 * 1024 * 1024,
            max_images: 32,
            max_redirects: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BannerConfig {
    pub max_bytes: usize,
}

impl Default for BannerConfig {
    fn default() -> Self {
        Self { max_bytes: 1024 }
    }
}
