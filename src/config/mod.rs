//! Configuration for the canvasflow server
//!
//! Every value has a default and can be overridden through a `CANVASFLOW_*`
//! environment variable, which is how container deployments configure it.

use crate::layout::LayoutConfig;
use crate::replication::Neo4jSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Primary database location
    pub database: DatabaseConfig,
    /// Save semantics of the primary store
    pub storage: StorageConfig,
    /// Secondary store replication
    pub sync: SyncConfig,
    /// Layout constants used by previews and clients that ask the server
    #[serde(default)]
    pub layout: LayoutConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number (default: 3004)
    pub port: u16,
}

/// Primary SQLite database location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding the database file (default: "data")
    pub data_dir: String,
    /// File name inside `data_dir` (default: "canvasflow.db")
    pub file_name: String,
}

impl DatabaseConfig {
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.file_name)
    }
}

/// Primary store save behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Answer 409 when a save was built from an older revision.
    /// Off means last writer wins.
    pub reject_stale_writes: bool,
}

/// Secondary graph store replication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Replicate after each save
    pub enabled: bool,
    /// Replicate before answering the save and embed the result; otherwise
    /// replicate in the background and let clients poll
    pub embed_result: bool,
    /// Connection settings for the Neo4j HTTP endpoint
    pub neo4j: Neo4jSettings,
}

fn env_or(key: &str, fallback: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| fallback.to_string())
}

fn env_flag(key: &str, fallback: bool) -> bool {
    match std::env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => fallback,
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for k8s/container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env_or("CANVASFLOW_HOST", "0.0.0.0"),
                port: env_or("CANVASFLOW_PORT", "3004").parse().unwrap_or(3004),
            },
            database: DatabaseConfig {
                data_dir: env_or("CANVASFLOW_DATA_DIR", "data"),
                file_name: env_or("CANVASFLOW_DB_FILE", "canvasflow.db"),
            },
            storage: StorageConfig {
                reject_stale_writes: env_flag("CANVASFLOW_REJECT_STALE_WRITES", false),
            },
            sync: SyncConfig {
                enabled: env_flag("CANVASFLOW_SYNC_ENABLED", true),
                embed_result: env_flag("CANVASFLOW_SYNC_EMBED_RESULT", true),
                neo4j: Neo4jSettings {
                    url: env_or("CANVASFLOW_NEO4J_URL", "http://localhost:7474"),
                    database: env_or("CANVASFLOW_NEO4J_DATABASE", "neo4j"),
                    user: env_or("CANVASFLOW_NEO4J_USER", "neo4j"),
                    password: env_or("CANVASFLOW_NEO4J_PASSWORD", "neo4j"),
                    timeout_secs: env_or("CANVASFLOW_NEO4J_TIMEOUT_SECS", "10")
                        .parse()
                        .unwrap_or(10),
                },
            },
            layout: LayoutConfig::default(),
        }
    }
}
