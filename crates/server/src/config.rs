use std::env;

use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;
use shared::domain::{is_valid_collection_name, DEFAULT_COLLECTION};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    pub bind_addr: String,
    pub database_url: String,
    pub default_collection: String,
    pub snapshot_channel_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/board.db".into(),
            default_collection: DEFAULT_COLLECTION.into(),
            snapshot_channel_capacity: 256,
        }
    }
}

/// Loads `server.toml` (optional) then `APP__*` variables over the defaults.
pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from("server")
}

pub fn load_settings_from(file_stem: &str) -> anyhow::Result<Settings> {
    let defaults = Settings::default();
    let settings: Settings = Config::builder()
        .set_default("bind_addr", defaults.bind_addr)?
        .set_default("database_url", defaults.database_url)?
        .set_default("default_collection", defaults.default_collection)?
        .set_default(
            "snapshot_channel_capacity",
            defaults.snapshot_channel_capacity as u64,
        )?
        .add_source(File::with_name(file_stem).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .separator("__")
                .try_parsing(true),
        )
        .set_override_option("bind_addr", legacy_env("SERVER_BIND", "APP__BIND_ADDR"))?
        .set_override_option(
            "database_url",
            legacy_env("DATABASE_URL", "APP__DATABASE_URL"),
        )?
        .build()
        .context("failed to assemble server settings")?
        .try_deserialize()
        .context("invalid server settings")?;

    if !is_valid_collection_name(&settings.default_collection) {
        anyhow::bail!(
            "default_collection '{}' must be 1-64 characters of [A-Za-z0-9_-]",
            settings.default_collection
        );
    }
    if settings.snapshot_channel_capacity == 0 {
        anyhow::bail!("snapshot_channel_capacity must be greater than zero");
    }

    Ok(settings)
}

/// Older deployments set unprefixed variables; the `APP__` form wins.
fn legacy_env(legacy: &str, prefixed: &str) -> Option<String> {
    if env::var(prefixed).is_ok() {
        return None;
    }
    env::var(legacy).ok()
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite:") || raw_database_url.contains("://") {
        return raw_database_url.replace('\\', "/");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
