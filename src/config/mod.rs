use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::courses::DisplayZone;

fn default_api_base_url() -> String {
    "http://localhost:8002".to_string()
}

fn default_page_size() -> usize {
    10
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host serving the admin API and the course pages
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Sent as `Authorization: JWT <token>` when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Initial page size; must be one of 10, 25, 50, 100
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Locale whose catalog is loaded from `locales/<locale>.toml`
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Show "Last Edited" in UTC instead of local time
    #[serde(default)]
    pub display_utc: bool,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            auth_token: None,
            page_size: default_page_size(),
            locale: default_locale(),
            display_utc: false,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl AppConfig {
    /// Directory holding config, catalogs and theme
    pub fn config_dir() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("coursegrid");

        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!("Could not create config directory: {}", e);
        }

        Ok(dir)
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from file, or create default
    pub fn load() -> Result<Self> {
        let path = match Self::config_path() {
            Ok(p) => p,
            Err(_) => return Ok(AppConfig::default()),
        };

        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => return Ok(config.sanitized()),
                    Err(e) => tracing::warn!("Failed to parse config: {}", e),
                },
                Err(e) => tracing::warn!("Failed to read config: {}", e),
            }
            return Ok(AppConfig::default());
        }

        let config = AppConfig::default();
        if let Err(e) = config.save() {
            tracing::warn!("Could not write default config: {}", e);
        }
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let content = toml::to_string_pretty(&self.clone().sanitized())?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Replace values the grid cannot work with
    pub fn sanitized(mut self) -> Self {
        if !crate::view::PAGE_SIZES.contains(&self.page_size) {
            tracing::warn!("Page size {} not offered, using 10", self.page_size);
            self.page_size = default_page_size();
        }
        if self.api_base_url.trim().is_empty() {
            self.api_base_url = default_api_base_url();
        }
        if self.auth_token.as_ref().map(|t| t.is_empty()).unwrap_or(false) {
            self.auth_token = None;
        }
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = default_request_timeout();
        }
        self
    }

    pub fn display_zone(&self) -> DisplayZone {
        if self.display_utc {
            DisplayZone::Utc
        } else {
            DisplayZone::Local
        }
    }
}
