use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::fs;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "THUMBBOX_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/thumbbox.toml";
const ENV_PREFIX: &str = "THUMBBOX";
const ENV_SEPARATOR: &str = "__";
const HOSTNAME_FILE: &str = "/etc/hostname";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
///
/// An explicit `config_path` takes precedence over `THUMBBOX_CONFIG`.
pub fn load(config_path: Option<PathBuf>) -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_path = config_path.unwrap_or_else(|| {
        env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    });

    let mut config = load_from_sources(config_path)?;
    load_secrets(&mut config);
    resolve_serve_from(&mut config);

    Ok(config)
}

/// Object store credentials only ever come from the environment
fn load_secrets(config: &mut Config) {
    config.storage.access_key = first_env(&["ACCESS_KEY", "AWS_ACCESS_KEY_ID"]);
    config.storage.secret_key = first_env(&["SECRET_KEY", "AWS_SECRET_ACCESS_KEY"]);
}

fn resolve_serve_from(config: &mut Config) {
    if config.server.serve_from.is_some() {
        return;
    }
    let from_file = || {
        fs::read_to_string(HOSTNAME_FILE)
            .ok()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
    };
    config.server.serve_from = Some(
        first_env(&["HOSTNAME"])
            .or_else(from_file)
            .unwrap_or_else(|| "localhost".to_string()),
    );
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| env::var(name).ok().filter(|value| !value.is_empty()))
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // THUMBBOX__STORAGE__BUCKET -> storage.bucket
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
