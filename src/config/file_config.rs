//! Configuration file support.
//!
//! Files may be TOML, JSON or YAML (picked by extension) and are layered
//! under environment overrides:
//!
//! ```toml
//! [http]
//! min_timeout = 1
//! max_timeout = 2
//! retry_on = [429]
//! api_key = "your-ncbi-key"
//!
//! [search]
//! max_retries = 5
//! ids_per_request = 100
//! terms_per_request = 10
//!
//! [fetch]
//! max_retries = 5
//! ids_per_request = 100
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Environment variables use the `EZMETAFETCH_` prefix and `__` between
//! sections, e.g. `EZMETAFETCH_HTTP__API_KEY` or
//! `EZMETAFETCH_HTTP__RETRY_ON=429,503`.

use std::path::{Path, PathBuf};

use super::Config;

/// File name looked up in the working directory
const LOCAL_CONFIG_FILE: &str = "ezmetafetch.toml";

fn environment() -> config::Environment {
    config::Environment::with_prefix("EZMETAFETCH")
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("http.retry_on")
        .try_parsing(true)
}

/// Load configuration from a file, with environment overrides on top
pub fn load_config(path: &Path) -> Result<Config, config::ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(environment())
        .build()?;

    settings.try_deserialize()
}

/// Defaults with environment overrides, for runs without a file
pub fn load_env_config() -> Result<Config, config::ConfigError> {
    config::Config::builder()
        .add_source(environment())
        .build()?
        .try_deserialize()
}

/// Locate a configuration file in the default places.
///
/// Looks for `./ezmetafetch.toml` first, then
/// `<config dir>/ezmetafetch/config.toml`.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("ezmetafetch").join("config.toml"))
        .filter(|path| path.is_file())
}

/// Save configuration as TOML
pub fn save_config(config: &Config, path: &Path) -> Result<(), ConfigFileError> {
    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
    }

    std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}
