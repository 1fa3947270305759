//! WFS service configuration loading and types.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Service configuration, optionally loaded from a YAML file.
///
/// Command-line arguments override file values; see `main.rs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WfsConfig {
    /// Base URL of the farmOS instance.
    pub farm_os_url: String,

    /// Public URL of the WFS endpoint, advertised as `OnlineResource`.
    pub public_url: String,

    pub service_title: String,
    pub service_abstract: String,

    /// Maximum number of concurrent `getArea` calls for one GetFeature.
    pub fetch_concurrency: usize,

    /// User-Agent sent to farmOS.
    pub user_agent: String,
}

impl Default for WfsConfig {
    fn default() -> Self {
        Self {
            farm_os_url: "http://localhost:80".to_string(),
            public_url: "http://localhost:5707/wfs".to_string(),
            service_title: "farmOS WFS".to_string(),
            service_abstract: "Areas of a farmOS instance as a WFS feature type".to_string(),
            fetch_concurrency: 4,
            user_agent: concat!("farmos-wfs/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl WfsConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: WfsConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {:?}", path))?;

        tracing::info!(path = ?path, "Loaded WFS configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetch_concurrency == 0 {
            bail!("fetch_concurrency must be at least 1");
        }
        for (field, url) in [("farm_os_url", &self.farm_os_url), ("public_url", &self.public_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                bail!("{} must be an http(s) URL, got '{}'", field, url);
            }
        }
        Ok(())
    }
}
