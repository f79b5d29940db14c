// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use recdesk_app::ResourceKind;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

pub const APP_NAME: &str = "recdesk";
pub const CONFIG_PATH_ENV: &str = "RECDESK_CONFIG_PATH";
pub const API_KEY_ENV: &str = "RECDESK_API_KEY";

const CONFIG_VERSION: i64 = 1;
const DEFAULT_BASE_URL: &str = "http://localhost:8765/api";
const DEFAULT_TIMEOUT: &str = "10s";
const DEFAULT_PAGE_SIZE: i64 = 200;
const DEFAULT_STATUS_CLEAR_SECS: i64 = 4;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub api: Api,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            api: Api::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Api {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Option<String>,
    pub page_size: Option<i64>,
}

impl Default for Api {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_owned()),
            api_key: None,
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
            page_size: Some(DEFAULT_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub start_tab: Option<String>,
    pub status_clear_secs: Option<i64>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            start_tab: Some(ResourceKind::Entities.as_str().to_owned()),
            status_clear_secs: Some(DEFAULT_STATUS_CLEAR_SECS),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub dir: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
            dir: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;
        Ok(config_root.join(APP_NAME).join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put values under [api], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1. Run `recdesk --print-example-config` for the current schema",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(base_url) = &self.api.base_url {
            let parsed = Url::parse(base_url.trim_end_matches('/')).with_context(|| {
                format!(
                    "api.base_url in {} is not a valid URL: {base_url:?}",
                    path.display()
                )
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                bail!(
                    "api.base_url in {} must use http or https, got {base_url:?}",
                    path.display()
                );
            }
        }

        if let Some(timeout) = &self.api.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "api.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(page_size) = self.api.page_size
            && page_size <= 0
        {
            bail!(
                "api.page_size in {} must be positive, got {}",
                path.display(),
                page_size
            );
        }

        if let Some(tab) = &self.ui.start_tab
            && ResourceKind::parse(tab).is_none()
        {
            let names = ResourceKind::ALL
                .iter()
                .map(|kind| kind.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            bail!(
                "ui.start_tab in {} must be one of {names}, got {tab:?}",
                path.display()
            );
        }

        if let Some(secs) = self.ui.status_clear_secs
            && secs <= 0
        {
            bail!(
                "ui.status_clear_secs in {} must be positive, got {}",
                path.display(),
                secs
            );
        }

        if let Some(level) = &self.log.level {
            EnvFilter::try_new(level).with_context(|| {
                format!(
                    "log.level in {} is not a valid filter: {level:?}",
                    path.display()
                )
            })?;
        }

        Ok(())
    }

    pub fn api_base_url(&self) -> &str {
        self.api
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    /// `RECDESK_API_KEY` wins over `[api].api_key`; blank values count as unset.
    pub fn api_key(&self) -> Option<String> {
        env::var(API_KEY_ENV)
            .ok()
            .or_else(|| self.api.api_key.clone())
            .map(|key| key.trim().to_owned())
            .filter(|key| !key.is_empty())
    }

    pub fn api_timeout(&self) -> Result<Duration> {
        parse_duration(self.api.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn page_size(&self) -> usize {
        let size = self.api.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
        usize::try_from(size).unwrap_or(usize::MAX)
    }

    pub fn start_tab(&self) -> ResourceKind {
        self.ui
            .start_tab
            .as_deref()
            .and_then(ResourceKind::parse)
            .unwrap_or(ResourceKind::Entities)
    }

    pub fn status_clear(&self) -> Duration {
        let secs = self
            .ui
            .status_clear_secs
            .unwrap_or(DEFAULT_STATUS_CLEAR_SECS)
            .max(1);
        Duration::from_secs(secs.unsigned_abs())
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.log.dir {
            return Ok(PathBuf::from(dir));
        }
        let data_root = dirs::data_local_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [log].dir to a writable directory")
        })?;
        Ok(data_root.join(APP_NAME))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# recdesk config\n# Place this file at: {}\n\nversion = 1\n\n[api]\nbase_url = \"{}\"\n# Optional. {} overrides this value.\n# api_key = \"...\"\ntimeout = \"{}\"\npage_size = {}\n\n[ui]\n# One of: entities, relationships, jobs, logs, protocols, history\nstart_tab = \"entities\"\nstatus_clear_secs = {}\n\n[log]\n# tracing filter directives; {} overrides this value.\nlevel = \"{}\"\n# Optional. Default is the platform data dir (for example ~/.local/share/recdesk)\n# dir = \"/absolute/path/to/logs\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            API_KEY_ENV,
            DEFAULT_TIMEOUT,
            DEFAULT_PAGE_SIZE,
            DEFAULT_STATUS_CLEAR_SECS,
            crate::logging::LOG_ENV,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 10s)")
}
