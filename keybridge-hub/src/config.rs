//! Hub configuration from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

use keybridge_core::{Origin, StorageBackend};

/// Runtime configuration for the hub server.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// WebSocket listen address.
    pub listen_addr: SocketAddr,
    /// HTTP (health/metrics) listen address.
    pub http_addr: SocketAddr,
    /// Candidate origins allowed to incorporate.
    pub allowed_origins: Vec<Origin>,
    /// Storage backend for the key-value store.
    pub storage_backend: StorageBackend,
    /// Directory for the sqlite database.
    pub data_dir: PathBuf,
    /// Optional bearer token guarding the /metrics endpoint.
    pub metrics_token: Option<String>,
    /// Maximum accepted frame size in bytes; larger frames are dropped.
    pub max_frame_size: usize,
}

impl HubConfig {
    /// Loads configuration from the environment, with sensible defaults
    /// for everything except the candidate pool.
    ///
    /// - `KEYBRIDGE_LISTEN_ADDR` (default `0.0.0.0:9600`)
    /// - `KEYBRIDGE_HTTP_ADDR` (default `0.0.0.0:9601`)
    /// - `KEYBRIDGE_ALLOWED_ORIGINS` (comma-separated origin list)
    /// - `KEYBRIDGE_STORAGE` (`memory` or `sqlite`, default `memory`)
    /// - `KEYBRIDGE_DATA_DIR` (default `./data`)
    /// - `KEYBRIDGE_METRICS_TOKEN` (unset = unauthenticated metrics)
    /// - `KEYBRIDGE_MAX_FRAME_SIZE` (bytes, default 262144)
    pub fn from_env() -> Self {
        let listen_addr = env_or("KEYBRIDGE_LISTEN_ADDR", "0.0.0.0:9600")
            .parse()
            .expect("Invalid KEYBRIDGE_LISTEN_ADDR");
        let http_addr = env_or("KEYBRIDGE_HTTP_ADDR", "0.0.0.0:9601")
            .parse()
            .expect("Invalid KEYBRIDGE_HTTP_ADDR");

        let allowed_origins = parse_origins(&env_or("KEYBRIDGE_ALLOWED_ORIGINS", ""));

        let storage_backend = match env_or("KEYBRIDGE_STORAGE", "memory").as_str() {
            "sqlite" => StorageBackend::Sqlite,
            _ => StorageBackend::Memory,
        };

        let data_dir = PathBuf::from(env_or("KEYBRIDGE_DATA_DIR", "./data"));

        let metrics_token = std::env::var("KEYBRIDGE_METRICS_TOKEN").ok();

        let max_frame_size = env_or("KEYBRIDGE_MAX_FRAME_SIZE", "262144")
            .parse()
            .expect("Invalid KEYBRIDGE_MAX_FRAME_SIZE");

        HubConfig {
            listen_addr,
            http_addr,
            allowed_origins,
            storage_backend,
            data_dir,
            metrics_token,
            max_frame_size,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_origins(raw: &str) -> Vec<Origin> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Origin::from)
        .collect()
}

// INLINE_TEST_REQUIRED: Binary crate without lib.rs - tests cannot be external
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_list_parsing_trims_and_skips_empties() {
        let origins = parse_origins("https://a.example, https://b.example,,  ");
        assert_eq!(
            origins,
            vec![Origin::from("https://a.example"), Origin::from("https://b.example")]
        );
        assert!(parse_origins("").is_empty());
    }

    #[test]
    fn from_env_reads_overrides() {
        // A single test mutates the environment to avoid races between
        // parallel test threads.
        std::env::set_var("KEYBRIDGE_LISTEN_ADDR", "127.0.0.1:7000");
        std::env::set_var("KEYBRIDGE_HTTP_ADDR", "127.0.0.1:7001");
        std::env::set_var("KEYBRIDGE_ALLOWED_ORIGINS", "https://app.example");
        std::env::set_var("KEYBRIDGE_STORAGE", "sqlite");
        std::env::set_var("KEYBRIDGE_DATA_DIR", "/tmp/keybridge-test");
        std::env::set_var("KEYBRIDGE_MAX_FRAME_SIZE", "1024");

        let config = HubConfig::from_env();
        assert_eq!(config.listen_addr.port(), 7000);
        assert_eq!(config.http_addr.port(), 7001);
        assert_eq!(config.allowed_origins, vec![Origin::from("https://app.example")]);
        assert_eq!(config.storage_backend, StorageBackend::Sqlite);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/keybridge-test"));
        assert_eq!(config.max_frame_size, 1024);

        for key in [
            "KEYBRIDGE_LISTEN_ADDR",
            "KEYBRIDGE_HTTP_ADDR",
            "KEYBRIDGE_ALLOWED_ORIGINS",
            "KEYBRIDGE_STORAGE",
            "KEYBRIDGE_DATA_DIR",
            "KEYBRIDGE_MAX_FRAME_SIZE",
        ] {
            std::env::remove_var(key);
        }
    }
}
