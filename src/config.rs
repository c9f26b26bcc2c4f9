//! Configuration for the roster daemon.
//!
//! A YAML document with three optional sections:
//!
//! ```yaml
//! server:
//!   host: 0.0.0.0
//!   port: 8000
//! storage:
//!   database_url: postgres://localhost/roster
//!   max_connections: 10
//!   acquire_timeout_secs: 30
//! entities:
//!   - name: user
//!     fields:
//!       - { name: id, type: integer, identity: true }
//!       - { name: username, type: text, max_length: 100 }
//! ```
//!
//! Every key has a default. Without `storage.database_url` (and without `DATABASE_URL` in the
//! environment) the daemon keeps records in memory. Without `entities` it serves the built-in
//! `user` schema.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{EntityDef, SchemaError, SchemaRegistry, user_schema};

/// Environment variable consulted when no database URL is configured.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file being read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// The document is not valid YAML for this configuration.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_yml::Error),
    /// An entity declaration is invalid.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

/// Where the HTTP server listens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Which store backs the entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSettings {
    /// PostgreSQL connection string; `None` selects the in-memory store.
    #[serde(default)]
    pub database_url: Option<String>,
    /// Upper bound on pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long an operation may wait for a pooled connection.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

impl StorageSettings {
    /// [`StorageSettings::acquire_timeout_secs`] as a duration.
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerSettings,
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Entity declarations; `None` serves the built-in `user` schema.
    #[serde(default)]
    pub entities: Option<Vec<EntityDef>>,
}

impl RosterConfig {
    /// Parses a YAML configuration document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Reads and parses a YAML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    /// Fills `storage.database_url` from `fallback` when the document left it unset.
    pub fn with_database_url_fallback(mut self, fallback: Option<String>) -> Self {
        if self.storage.database_url.is_none() {
            self.storage.database_url = fallback.filter(|url| !url.is_empty());
        }
        self
    }

    /// Applies [`DATABASE_URL_ENV`] as the database URL fallback.
    pub fn with_env(self) -> Self {
        self.with_database_url_fallback(std::env::var(DATABASE_URL_ENV).ok())
    }

    /// Builds the schema registry for the configured entities.
    pub fn registry(&self) -> Result<SchemaRegistry, ConfigError> {
        let registry = match &self.entities {
            Some(defs) => SchemaRegistry::from_defs(defs.clone())?,
            None => SchemaRegistry::new(vec![user_schema()])?,
        };
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldType;

    #[test]
    fn empty_document_uses_defaults() {
        let config = RosterConfig::from_yaml("{}").unwrap();
        assert_eq!(config, RosterConfig::default());
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.storage.max_connections, 10);
        assert_eq!(config.storage.acquire_timeout(), Duration::from_secs(30));
        assert_eq!(config.storage.database_url, None);
    }

    #[test]
    fn default_registry_serves_user() {
        let registry = RosterConfig::default().registry().unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.schema_for("user").is_ok());
    }

    #[test]
    fn parses_every_section() {
        let yaml = r#"
server:
  host: 0.0.0.0
  port: 9000
storage:
  database_url: postgres://db/roster
  max_connections: 4
entities:
  - name: book
    fields:
      - { name: isbn, type: text, identity: true, max_length: 13 }
      - { name: title, type: text }
      - { name: price, type: float, required: false }
      - { name: format, type: enum, values: [hardcover, paperback] }
"#;
        let config = RosterConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.database_url.as_deref(), Some("postgres://db/roster"));
        assert_eq!(config.storage.max_connections, 4);
        assert_eq!(config.storage.acquire_timeout_secs, 30);

        let registry = config.registry().unwrap();
        let book = registry.schema_for("book").unwrap();
        assert_eq!(book.identity().name, "isbn");
        assert_eq!(book.field("format").unwrap().field_type, FieldType::Enum);
        assert!(registry.schema_for("user").is_err());
    }

    #[test]
    fn invalid_entities_are_rejected() {
        let yaml = r#"
entities:
  - name: book
    fields:
      - { name: title, type: text }
"#;
        let config = RosterConfig::from_yaml(yaml).unwrap();
        assert!(matches!(config.registry(), Err(ConfigError::Schema(_))));
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        assert!(matches!(
            RosterConfig::from_yaml("server: [1, 2"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn database_url_fallback_only_fills_gaps() {
        let config = RosterConfig::default()
            .with_database_url_fallback(Some("postgres://env/roster".to_string()));
        assert_eq!(config.storage.database_url.as_deref(), Some("postgres://env/roster"));

        let config = RosterConfig::from_yaml("storage: { database_url: \"postgres://file/r\" }")
            .unwrap()
            .with_database_url_fallback(Some("postgres://env/roster".to_string()));
        assert_eq!(config.storage.database_url.as_deref(), Some("postgres://file/r"));

        let config = RosterConfig::default().with_database_url_fallback(Some(String::new()));
        assert_eq!(config.storage.database_url, None);
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = RosterConfig::from_file(Path::new("/nonexistent/roster.yaml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
