//! Settings file for the songmark tools
//!
//! Provides TOML-based configuration for selecting the storage backend
//! (memory, filesystem or PostgreSQL) together with the fingerprinting and
//! matching parameters.

use crate::config::{MatchingConfig, SongmarkConfig};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SongmarkSettings {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fingerprint: SongmarkConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
}

/// Storage backend configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub filesystem: FilesystemConfig,
    #[serde(default)]
    pub postgresql: PostgresqlConfig,
}

/// Storage backend type
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Memory,
    #[default]
    Filesystem,
    Postgresql,
}

/// Filesystem backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilesystemConfig {
    #[serde(default = "default_base_directory")]
    pub base_directory: String,
    #[serde(default)]
    pub format: FileFormat,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            base_directory: default_base_directory(),
            format: FileFormat::default(),
        }
    }
}

fn default_base_directory() -> String {
    "./songmark-index".to_string()
}

/// File format for filesystem storage
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Json,
    Bson,
    /// Read whichever exists, write JSON
    #[default]
    Auto,
}

/// PostgreSQL backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostgresqlConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for PostgresqlConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: default_database(),
            user: default_user(),
            password: default_password(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    5432
}
fn default_database() -> String {
    "songmark".to_string()
}
fn default_user() -> String {
    "songmark_user".to_string()
}
fn default_password() -> String {
    "songmark_pass".to_string()
}
fn default_max_connections() -> u32 {
    10
}

impl SongmarkSettings {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!(
                "failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let settings: SongmarkSettings = toml::from_str(&content)
            .map_err(|e| Error::InvalidConfig(format!("failed to parse TOML config: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::info!(
                "Config file {} not found, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.fingerprint.validate()?;
        self.matching.validate()
    }

    /// Get PostgreSQL connection string (password omitted)
    pub fn connection_string(&self) -> Option<String> {
        match self.storage.backend {
            BackendKind::Postgresql => {
                let pg = &self.storage.postgresql;
                Some(format!(
                    "postgresql://{}@{}:{}/{}",
                    pg.user, pg.host, pg.port, pg.database
                ))
            }
            _ => None,
        }
    }

    /// In-memory storage, used by tests and one-shot runs
    pub fn in_memory() -> Self {
        Self {
            storage: StorageConfig {
                backend: BackendKind::Memory,
                ..StorageConfig::default()
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = SongmarkSettings::default();
        assert_eq!(settings.storage.backend, BackendKind::Filesystem);
        assert_eq!(settings.storage.filesystem.base_directory, "./songmark-index");
        assert_eq!(settings.matching.min_vote_threshold, 100);
        assert!(settings.connection_string().is_none());
    }

    #[test]
    fn test_connection_string() {
        let mut settings = SongmarkSettings::default();
        settings.storage.backend = BackendKind::Postgresql;
        let conn_str = settings.connection_string().unwrap();
        assert!(conn_str.starts_with("postgresql://"));
        assert!(conn_str.contains("songmark_user"));
        assert!(conn_str.contains("localhost:5432"));
        assert!(!conn_str.contains("songmark_pass"));
    }

    #[test]
    fn test_parse_filesystem_toml() {
        let toml_str = r#"
            [storage]
            backend = "filesystem"

            [storage.filesystem]
            base_directory = "./test_db"
            format = "bson"

            [matching]
            min_vote_threshold = 10
        "#;

        let settings: SongmarkSettings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.storage.backend, BackendKind::Filesystem);
        assert_eq!(settings.storage.filesystem.base_directory, "./test_db");
        assert_eq!(settings.storage.filesystem.format, FileFormat::Bson);
        assert_eq!(settings.matching.min_vote_threshold, 10);
        assert_eq!(settings.matching.ratio_threshold, 2.5);
        assert_eq!(settings.fingerprint.frame_size, 2048);
    }

    #[test]
    fn test_parse_postgresql_toml() {
        let toml_str = r#"
            [storage]
            backend = "postgresql"

            [storage.postgresql]
            host = "db.example.com"
            port = 5433
            database = "test_songmark"
            max_connections = 20

            [fingerprint]
            neighborhood_size = 11
        "#;

        let settings: SongmarkSettings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.storage.backend, BackendKind::Postgresql);
        assert_eq!(settings.storage.postgresql.host, "db.example.com");
        assert_eq!(settings.storage.postgresql.port, 5433);
        assert_eq!(settings.storage.postgresql.user, "songmark_user");
        assert_eq!(settings.fingerprint.neighborhood_size, 11);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[matching]\nratio_threshold = -1.0\n").unwrap();
        assert!(matches!(
            SongmarkSettings::load(&path),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SongmarkSettings::load_or_default(&dir.path().join("none.toml")).unwrap();
        assert_eq!(settings.storage.backend, BackendKind::Filesystem);
    }
}
