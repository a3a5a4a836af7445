//! TOML configuration file loading

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use super::builder::{ConfigBuilder, TransportMode};
use crate::Result;

/// Configuration file locations checked in order
const CONFIG_PATHS: &[&str] = &[
    "./sqlgate-mcp.toml",
    "~/.config/sqlgate-mcp/config.toml",
    "/etc/sqlgate-mcp/config.toml",
];

/// Find the first existing configuration file
pub fn find_config_file() -> Option<PathBuf> {
    for path_str in CONFIG_PATHS {
        let path = if path_str.starts_with('~') {
            if let Ok(home) = std::env::var("HOME") {
                PathBuf::from(path_str.replacen('~', &home, 1))
            } else {
                continue;
            }
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path, builder: ConfigBuilder) -> Result<ConfigBuilder> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let file_config: FileConfig = toml::from_str(&content).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })?;

    apply_file_config(builder, file_config)
}

fn apply_file_config(mut builder: ConfigBuilder, config: FileConfig) -> Result<ConfigBuilder> {
    if let Some(db) = config.database {
        if let Some(url_str) = db.url {
            let url = Url::parse(&url_str)
                .map_err(|e| crate::Error::Config(format!("Invalid database URL: {e}")))?;
            builder = builder.database_url(url);
        }

        if let Some(kind) = db.kind {
            builder = builder.backend_kind(kind);
        }
    }

    if let Some(policy) = config.policy {
        if let Some(tables) = policy.allowed_tables {
            builder = builder.allowed_tables(tables);
        }

        if let Some(columns) = policy.allowed_columns {
            builder = builder.allowed_columns(columns);
        }

        if let Some(keywords) = policy.forbidden_keywords {
            builder = builder.forbidden_keywords(keywords);
        }
    }

    if let Some(transport) = config.transport {
        if let Some(mode_str) = transport.mode {
            let mode: TransportMode = mode_str.parse().unwrap_or_default();
            builder = builder.transport_mode(mode);
        }

        if let Some(host_str) = transport.http_host
            && let Ok(host) = host_str.parse::<IpAddr>()
        {
            builder = builder.http_host(host);
        }

        if let Some(port) = transport.http_port {
            builder = builder.http_port(port);
        }

        if let Some(origin) = transport.cors_origin {
            builder = builder.cors_origin(origin);
        }

        if let Some(key) = transport.api_key {
            builder = builder.api_key(key);
        }
    }

    if let Some(obs) = config.observability {
        if let Some(level) = obs.log_level {
            builder = builder.log_level(level);
        }

        if let Some(json) = obs.json_logs {
            builder = builder.json_logs(json);
        }
    }

    Ok(builder)
}

/// Root configuration file structure
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    database: Option<DatabaseConfig>,
    policy: Option<PolicyConfig>,
    transport: Option<TransportFileConfig>,
    observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Deserialize)]
struct DatabaseConfig {
    url: Option<String>,
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PolicyConfig {
    allowed_tables: Option<Vec<String>>,
    allowed_columns: Option<Vec<String>>,
    forbidden_keywords: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TransportFileConfig {
    mode: Option<String>,
    http_host: Option<String>,
    http_port: Option<u16>,
    cors_origin: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObservabilityConfig {
    log_level: Option<String>,
    json_logs: Option<bool>,
}
