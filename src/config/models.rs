use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub imaging: ImagingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Host identity reported in `X-Serve-From`; resolved at load time when unset
    pub serve_from: Option<String>,
    /// Time allowed until response headers are produced
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Longest a single body chunk may wait on a slow client
    #[serde(default = "default_stall_timeout_secs")]
    pub stall_timeout_secs: u64,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            serve_from: None,
            request_timeout_secs: default_request_timeout_secs(),
            stall_timeout_secs: default_stall_timeout_secs(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 2222))
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_stall_timeout_secs() -> u64 {
    60
}

/// Storage provider type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    #[default]
    S3,
    Local,
    Memory,
}

/// Object store holding sources and cached derivatives
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub provider: StorageProvider,
    #[serde(default)]
    pub bucket: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Directory backing the `local` provider
    pub root: Option<PathBuf>,
    /// Loaded from the environment, never from the config file
    #[serde(skip)]
    pub access_key: Option<String>,
    /// Loaded from the environment, never from the config file
    #[serde(skip)]
    pub secret_key: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageProvider::default(),
            bucket: String::new(),
            endpoint: default_endpoint(),
            region: default_region(),
            root: None,
            access_key: None,
            secret_key: None,
        }
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:9000".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Resize pipeline tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImagingConfig {
    /// Chunks buffered between the encoder and the response copier
    #[serde(default = "default_pipe_capacity")]
    pub pipe_capacity: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: ByteSize,
    /// Frames buffered between animated resampling stages
    #[serde(default = "default_frame_queue_depth")]
    pub frame_queue_depth: usize,
    #[serde(default = "default_max_source_bytes")]
    pub max_source_bytes: ByteSize,
}

impl Default for ImagingConfig {
    fn default() -> Self {
        Self {
            pipe_capacity: default_pipe_capacity(),
            chunk_size: default_chunk_size(),
            frame_queue_depth: default_frame_queue_depth(),
            max_source_bytes: default_max_source_bytes(),
        }
    }
}

fn default_pipe_capacity() -> usize {
    8
}

fn default_chunk_size() -> ByteSize {
    ByteSize::kib(64)
}

fn default_frame_queue_depth() -> usize {
    2
}

fn default_max_source_bytes() -> ByteSize {
    ByteSize::mib(32)
}
