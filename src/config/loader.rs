use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use super::types::ScanSettings;

const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "./onionscan.toml",
    "./config/onionscan.toml",
    "~/.config/onionscan/onionscan.toml",
];

pub struct ConfigLoader;

impl ConfigLoader {
    /// A custom path that exists must parse; a missing one is only a warning
    pub fn load_with_custom_path(custom_path: Option<&Path>) -> Result<ScanSettings> {
        if let Some(path) = custom_path {
            if path.exists() {
                return Self::load_from_file(path)
                    .with_context(|| format!("Failed to load config from custom path: {:?}", path));
            }
            tracing::warn!("Custom config path does not exist: {:?}, falling back to defaults", path);
        }

        for default_path in DEFAULT_CONFIG_PATHS {
            let path = Self::expand_path(default_path);
            if path.exists() {
                match Self::load_from_file(&path) {
                    Ok(settings) => {
                        tracing::info!("Loaded configuration from: {:?}", path);
                        return Ok(settings);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {:#}", path, e);
                        continue;
                    }
                }
            }
        }

        tracing::info!("No configuration file found, using default settings");
        Ok(ScanSettings::default())
    }

    fn load_from_file(path: &Path) -> Result<ScanSettings> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let settings: ScanSettings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {:?}", path))?;

        Self::validate(&settings)?;

        Ok(settings)
    }

    pub fn validate(settings: &ScanSettings) -> Result<()> {
        if settings.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be greater than 0");
        }

        let c = &settings.concurrency;
        if c.max_targets == 0 || c.max_banner_probes == 0 || c.max_path_probes == 0 || c.max_image_fetches == 0 {
            anyhow::bail!("concurrency limits must be greater than 0");
        }

        if settings.http.max_body_bytes == 0 {
            anyhow::bail!("http.max_body_bytes must be greater than 0");
        }

        if settings.banner.max_bytes == 0 {
            anyhow::bail!("banner.max_bytes must be greater than 0");
        }

        Ok(())
    }

    fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Ok(home) = std::env::var("HOME") {
                return PathBuf::from(home).join(rest);
            }
        }
        PathBuf::from(path)
    }
}
