use std::{fs, path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use catalog_core::GatewayConfig;
use serde::Deserialize;
use shared::domain::AccountId;
use tracing::warn;
use url::Url;

const SETTINGS_FILE: &str = "catalog.toml";

#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: String,
    pub api_key: String,
    pub access_token: Option<String>,
    pub request_timeout_secs: u64,
    /// Signed-in account as handed over by the identity provider.
    pub viewer_id: Option<String>,
    pub download_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:54321".into(),
            api_key: String::new(),
            access_token: None,
            request_timeout_secs: 15,
            viewer_id: None,
            download_dir: PathBuf::from("./downloads"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    base_url: Option<String>,
    api_key: Option<String>,
    access_token: Option<String>,
    request_timeout_secs: Option<u64>,
    viewer_id: Option<String>,
    download_dir: Option<PathBuf>,
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        if let Err(err) = apply_file_settings(&mut settings, &raw) {
            warn!("config: ignoring {SETTINGS_FILE}: {err:#}");
        }
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file_settings(settings: &mut Settings, raw: &str) -> Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw).context("invalid settings file")?;

    if let Some(v) = file_cfg.base_url {
        settings.base_url = v;
    }
    if let Some(v) = file_cfg.api_key {
        settings.api_key = v;
    }
    if let Some(v) = file_cfg.access_token {
        settings.access_token = Some(v);
    }
    if let Some(v) = file_cfg.request_timeout_secs {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.viewer_id {
        settings.viewer_id = Some(v);
    }
    if let Some(v) = file_cfg.download_dir {
        settings.download_dir = v;
    }
    Ok(())
}

fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("CATALOG_URL") {
        settings.base_url = v;
    }
    if let Some(v) = lookup("APP__BASE_URL") {
        settings.base_url = v;
    }

    if let Some(v) = lookup("CATALOG_API_KEY") {
        settings.api_key = v;
    }
    if let Some(v) = lookup("APP__API_KEY") {
        settings.api_key = v;
    }

    if let Some(v) = lookup("CATALOG_ACCESS_TOKEN") {
        settings.access_token = Some(v);
    }

    if let Some(v) = lookup("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    if let Some(v) = lookup("CATALOG_VIEWER_ID") {
        settings.viewer_id = Some(v);
    }

    if let Some(v) = lookup("APP__DOWNLOAD_DIR") {
        settings.download_dir = PathBuf::from(v);
    }
}

impl Settings {
    pub fn gateway_config(&self) -> Result<GatewayConfig> {
        let base_url = Url::parse(self.base_url.trim())
            .with_context(|| format!("invalid catalog url '{}'", self.base_url))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!("catalog url must be http or https, got '{}'", base_url.scheme());
        }
        if self.api_key.trim().is_empty() {
            warn!("config: no api key configured; the backend will likely reject requests");
        }

        Ok(GatewayConfig {
            base_url,
            api_key: self.api_key.trim().to_string(),
            access_token: self
                .access_token
                .as_deref()
                .map(str::trim)
                .filter(|token| !token.is_empty())
                .map(str::to_string),
            request_timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
        })
    }

    /// `None` means browsing signed out.
    pub fn viewer(&self) -> Result<Option<AccountId>> {
        let Some(raw) = self.viewer_id.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if raw.is_empty() {
            return Ok(None);
        }
        raw.parse::<AccountId>()
            .map(Some)
            .with_context(|| format!("invalid viewer id '{raw}'"))
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
