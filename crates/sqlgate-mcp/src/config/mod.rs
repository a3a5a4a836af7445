//! Configuration management
//!
//! Supports configuration loading with precedence: env > file > CLI > defaults

mod builder;
mod env;
mod file;

pub use builder::{
    Config, ConfigBuilder, DEFAULT_BACKEND, DEFAULT_HTTP_PORT, TelemetryConfig, TransportConfig,
    TransportMode,
};

use std::path::{Path, PathBuf};

use crate::Result;

/// Layered builder plus the config file it read, if any
#[derive(Debug)]
pub struct LoadedConfig {
    pub builder: ConfigBuilder,
    pub source: Option<PathBuf>,
}

/// Layer the discovered config file, then the environment, over `base`
pub fn load_config(base: ConfigBuilder) -> Result<LoadedConfig> {
    layer(base, file::find_config_file())
}

/// Layer a specific config file, then the environment, over `base`
pub fn load_config_from_path(base: ConfigBuilder, path: &Path) -> Result<LoadedConfig> {
    layer(base, Some(path.to_path_buf()))
}

fn layer(base: ConfigBuilder, source: Option<PathBuf>) -> Result<LoadedConfig> {
    let builder = match source {
        Some(ref path) => file::load_from_file(path, base)?,
        None => base,
    };

    Ok(LoadedConfig {
        builder: env::load_from_env(builder)?,
        source,
    })
}
