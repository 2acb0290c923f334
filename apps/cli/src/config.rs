use std::fs;

use anyhow::{anyhow, Context};
use serde::Deserialize;
use shared::domain::Pagination;
use url::Url;

pub const CONFIG_FILE: &str = "tapper.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub database_url: String,
    pub page_limit: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:3000/api/v1".into(),
            database_url: "sqlite://./data/tapper.db".into(),
            page_limit: Pagination::DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_url: Option<String>,
    database_url: Option<String>,
    page_limit: Option<u32>,
}

pub fn load_settings() -> Settings {
    let file = fs::read_to_string(CONFIG_FILE).ok();
    load_settings_from(file.as_deref(), |key| std::env::var(key).ok())
}

/// Layers the config file, then environment variables, over the defaults.
/// Later sources win; unparsable values are skipped.
pub fn load_settings_from(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        match toml::from_str::<FileSettings>(raw) {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.api_url {
                    settings.api_url = v;
                }
                if let Some(v) = file_cfg.database_url {
                    settings.database_url = v;
                }
                if let Some(v) = file_cfg.page_limit {
                    settings.page_limit = v;
                }
            }
            Err(err) => tracing::warn!(error = %err, "config: ignoring unreadable {CONFIG_FILE}"),
        }
    }

    if let Some(v) = env("TAPPER_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = env("APP__API_URL") {
        settings.api_url = v;
    }

    if let Some(v) = env("TAPPER_DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = env("APP__DATABASE_URL") {
        settings.database_url = v;
    }

    if let Some(v) = env("APP__PAGE_LIMIT") {
        if let Ok(parsed) = v.parse::<u32>() {
            settings.page_limit = parsed;
        }
    }

    settings
}

pub fn validate_api_url(raw_api_url: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw_api_url.trim())
        .with_context(|| format!("invalid api url '{raw_api_url}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!("api url '{raw_api_url}' must use http or https"));
    }
    Ok(url)
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    storage::ensure_sqlite_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}
