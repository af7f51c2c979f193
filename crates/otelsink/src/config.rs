//! Configuration types for the sink.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::SinkError;

/// Default listen port for the gRPC receiver.
pub const DEFAULT_GRPC_PORT: u16 = 3000;

/// Default maximum size of a decoded request message (4 MiB, tonic's own default).
pub const DEFAULT_MAX_DECODING_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Default storage root, relative to the working directory.
pub const DEFAULT_STORAGE_PATH: &str = "data";

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "otelsink.toml";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "OTELSINK_";

/// Sink configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
}

impl SinkConfig {
    /// Load configuration from files and environment.
    ///
    /// Configuration is loaded in order (later sources override earlier):
    /// 1. Default values
    /// 2. `otelsink.toml` in current directory
    /// 3. Environment variables prefixed with `OTELSINK_`, nested with `__`
    ///    (e.g. `OTELSINK_STORAGE__PATH`)
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Config`] if a source cannot be parsed or a value
    /// does not fit its field.
    pub fn load() -> Result<Self, SinkError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration from a specific file path.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Config`] if a source cannot be parsed or a value
    /// does not fit its field.
    pub fn load_from(path: &str) -> Result<Self, SinkError> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| SinkError::Config(e.to_string()))
    }
}

/// gRPC server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// OTLP gRPC address (default: 127.0.0.1:3000).
    pub grpc_addr: SocketAddr,
    /// Largest request message accepted, in bytes.
    pub max_decoding_message_size: usize,
    /// Accept gzip-compressed requests.
    pub accept_gzip: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            grpc_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_GRPC_PORT)),
            max_decoding_message_size: DEFAULT_MAX_DECODING_MESSAGE_SIZE,
            accept_gzip: true,
        }
    }
}

/// Local filesystem storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage root; one subdirectory per signal is created beneath it.
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORAGE_PATH),
        }
    }
}
