use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context};
use client_core::{PageSize, DEFAULT_API_BASE_URL};
use serde::Deserialize;
use tracing::warn;
use url::Url;

pub const CONFIG_FILE: &str = "admin.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base_url: String,
    pub default_page_size: u32,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            default_page_size: PageSize::default().get(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    api_base_url: Option<String>,
    default_page_size: Option<u32>,
    request_timeout_secs: Option<u64>,
}

/// Values given on the command line; they win over file and environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub api_base_url: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

impl Settings {
    pub fn page_size(&self) -> anyhow::Result<PageSize> {
        PageSize::new(self.default_page_size)
            .with_context(|| format!("invalid default_page_size {}", self.default_page_size))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn apply_file(&mut self, raw: &str) -> anyhow::Result<()> {
        let file: FileSettings = toml::from_str(raw)?;
        if let Some(v) = file.api_base_url {
            self.api_base_url = v;
        }
        if let Some(v) = file.default_page_size {
            self.default_page_size = v;
        }
        if let Some(v) = file.request_timeout_secs {
            self.request_timeout_secs = v;
        }
        Ok(())
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("API_BASE_URL") {
            self.api_base_url = v;
        }
        if let Some(v) = var("APP__API_BASE_URL") {
            self.api_base_url = v;
        }

        if let Some(v) = var("APP__DEFAULT_PAGE_SIZE") {
            match v.trim().parse::<u32>() {
                Ok(parsed) => self.default_page_size = parsed,
                Err(_) => warn!(value = %v, "ignoring unparsable APP__DEFAULT_PAGE_SIZE"),
            }
        }
        if let Some(v) = var("APP__REQUEST_TIMEOUT_SECS") {
            match v.trim().parse::<u64>() {
                Ok(parsed) => self.request_timeout_secs = parsed,
                Err(_) => warn!(value = %v, "ignoring unparsable APP__REQUEST_TIMEOUT_SECS"),
            }
        }
    }

    fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(v) = overrides.api_base_url {
            self.api_base_url = v;
        }
        if let Some(v) = overrides.request_timeout_secs {
            self.request_timeout_secs = v;
        }
    }

    fn validated(mut self) -> anyhow::Result<Self> {
        self.api_base_url = normalize_base_url(&self.api_base_url)?;
        self.page_size()?;
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        Ok(self)
    }
}

/// Defaults, then `path` if it exists, then the environment, then `overrides`.
pub fn load_settings(path: &Path, overrides: Overrides) -> anyhow::Result<Settings> {
    resolve_settings(path, |key| std::env::var(key).ok(), overrides)
}

fn resolve_settings(
    path: &Path,
    var: impl Fn(&str) -> Option<String>,
    overrides: Overrides,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        settings
            .apply_file(&raw)
            .with_context(|| format!("invalid config file '{}'", path.display()))?;
    }
    settings.apply_env(var);
    settings.apply_overrides(overrides);

    settings.validated()
}

fn normalize_base_url(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        bail!("api_base_url must not be empty");
    }
    let url = Url::parse(trimmed).with_context(|| format!("invalid api_base_url '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("api_base_url '{raw}' must use http or https");
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
