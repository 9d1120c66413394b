//! Configuration system for Beacon.
//!
//! Uses `figment` for layered configuration: defaults -> config file ->
//! environment. Configuration is loaded from `beacon.toml` in the working
//! directory (or an explicit path) with `BEACON_*` environment overrides.

use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Geospatial targeting radius treated as "effectively unbounded": the
/// Earth's circumference in metres. No two points on the surface are farther
/// apart than half of this, so the default proximity query never excludes a
/// responder by distance.
pub const UNBOUNDED_DISPATCH_RADIUS_M: f64 = 40_075_000.0;

/// Top-level configuration for the Beacon service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeaconConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub dispatch: DispatchConfig,
    pub media: MediaConfig,
    pub database: DatabaseConfig,
}

/// Bind address for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
        }
    }
}

/// Bearer credential settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC signing secret. Empty means a random secret is generated at
    /// startup (tokens then expire with the process).
    pub token_secret: String,
    /// Lifetime of issued tokens in seconds.
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: String::new(),
            token_ttl_secs: 86_400,
        }
    }
}

/// Notification targeting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Maximum distance in metres for proximity targeting. Defaults to
    /// [`UNBOUNDED_DISPATCH_RADIUS_M`].
    pub max_distance_m: f64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_distance_m: UNBOUNDED_DISPATCH_RADIUS_M,
        }
    }
}

/// Audio clip storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Directory where uploaded clips are written and served from.
    pub media_dir: PathBuf,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from("media"),
        }
    }
}

/// SQLite store location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("beacon.db"),
        }
    }
}

impl BeaconConfig {
    /// Load configuration: defaults, then the config file, then `BEACON_*`
    /// environment variables (nested keys separated by `__`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = path.unwrap_or(Path::new("beacon.toml"));
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("BEACON_").split("__"))
            .extract()
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
