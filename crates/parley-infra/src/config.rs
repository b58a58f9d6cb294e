//! Configuration loader for Parley.
//!
//! Reads `config.toml` from the data directory (`~/.parley/` in production)
//! and deserializes it into [`ParleyConfig`]. Falls back to defaults when the
//! file is missing or malformed, then applies `PARLEY_AI_*` environment
//! overrides.

use std::path::{Path, PathBuf};

use parley_types::config::ParleyConfig;

pub const DATA_DIR_ENV: &str = "PARLEY_DATA_DIR";
pub const BASE_URL_ENV: &str = "PARLEY_AI_BASE_URL";
pub const API_KEY_ENV: &str = "PARLEY_AI_API_KEY";
pub const MODEL_ENV: &str = "PARLEY_AI_MODEL";

/// The data directory: `PARLEY_DATA_DIR`, else `~/.parley`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".parley")
}

/// Load configuration from `{data_dir}/config.toml` plus environment overrides.
pub async fn load_config(data_dir: &Path) -> ParleyConfig {
    let config = load_config_file(data_dir).await;
    apply_env_overrides(config, |name| std::env::var(name).ok())
}

/// Load `{data_dir}/config.toml` without environment overrides.
///
/// - If the file does not exist, returns [`ParleyConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
pub async fn load_config_file(data_dir: &Path) -> ParleyConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ParleyConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ParleyConfig::default();
        }
    };

    match toml::from_str::<ParleyConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ParleyConfig::default()
        }
    }
}

/// Override the `[ai]` section with whichever variables `lookup` returns.
///
/// Empty values are ignored.
pub fn apply_env_overrides(
    mut config: ParleyConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> ParleyConfig {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(base_url) = get(BASE_URL_ENV) {
        config.ai.base_url = Some(base_url);
    }
    if let Some(api_key) = get(API_KEY_ENV) {
        config.ai.api_key = Some(api_key);
    }
    if let Some(model) = get(MODEL_ENV) {
        config.ai.model = Some(model);
    }
    config
}
