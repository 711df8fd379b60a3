//! Configuration management.
//!
//! Connection parameters for both backends, supplied as plain records with
//! builder-style setters. A TOML config file and `AGENTFS_*` environment
//! variables can populate them; construction performs no I/O, and
//! connection setup happens in `initialize()`.

use crate::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Checks that a SQL identifier is safe to interpolate into statements.
///
/// Table and schema names end up in SQL text (they cannot be bound as
/// parameters), so only conservative identifiers are accepted.
fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Connection parameters for the S3 backend.
///
/// Credentials are optional: when absent, the SDK's default provider chain
/// (environment, profile, IAM role) applies.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Bucket name.
    pub bucket: String,
    /// Key prefix scoping every stored object; empty for the bucket root.
    pub prefix: String,
    /// AWS region; `None` defers to the provider chain.
    pub region: Option<String>,
    /// Custom endpoint URL for S3-compatible stores such as MinIO.
    pub endpoint_url: Option<String>,
    /// Static access key ID.
    pub access_key_id: Option<String>,
    /// Static secret access key.
    pub secret_access_key: Option<String>,
    /// Use path-style addressing (required by MinIO).
    pub force_path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: "agentfs".to_string(),
            prefix: String::new(),
            region: None,
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
            force_path_style: false,
        }
    }
}

impl S3Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bucket name.
    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Sets the key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets the region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets a custom endpoint URL and enables path-style addressing.
    #[must_use]
    pub fn with_endpoint_url(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint.into());
        self.force_path_style = true;
        self
    }

    /// Sets static credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }

    /// Sets path-style addressing explicitly.
    #[must_use]
    pub const fn with_force_path_style(mut self, force: bool) -> Self {
        self.force_path_style = force;
        self
    }

    /// Loads configuration from `AGENTFS_S3_*` environment variables,
    /// reading a `.env` file first when present.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        if let Ok(bucket) = std::env::var("AGENTFS_S3_BUCKET") {
            config.bucket = bucket;
        }
        if let Ok(prefix) = std::env::var("AGENTFS_S3_PREFIX") {
            config.prefix = prefix;
        }
        if let Ok(region) = std::env::var("AGENTFS_S3_REGION") {
            config.region = Some(region);
        }
        if let Ok(endpoint) = std::env::var("AGENTFS_S3_ENDPOINT") {
            config = config.with_endpoint_url(endpoint);
        }
        if let (Ok(key), Ok(secret)) = (
            std::env::var("AGENTFS_S3_ACCESS_KEY_ID"),
            std::env::var("AGENTFS_S3_SECRET_ACCESS_KEY"),
        ) {
            config = config.with_credentials(key, secret);
        }
        config
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the bucket name is empty.
    pub fn validate(&self) -> Result<()> {
        if self.bucket.is_empty() {
            return Err(Error::InvalidConfig("bucket name is empty".to_string()));
        }
        Ok(())
    }
}

/// Connection parameters for the PostgreSQL backend.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Database name.
    pub database: String,
    /// Role name.
    pub user: String,
    /// Role password.
    pub password: String,
    /// Table holding the file records.
    pub table: String,
    /// Schema the table lives in.
    pub schema: String,
    /// Advisory minimum pool size; connections are created lazily, so this
    /// is a sizing hint rather than a pre-warmed floor.
    pub min_pool_size: usize,
    /// Maximum pool size; exhaustion blocks callers until a connection
    /// frees up.
    pub max_pool_size: usize,
    /// Optional pool acquire timeout. `None` waits indefinitely.
    pub pool_timeout: Option<Duration>,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "agentfs".to_string(),
            user: "postgres".to_string(),
            password: "postgres".to_string(),
            table: "agent_files".to_string(),
            schema: "public".to_string(),
            min_pool_size: 2,
            max_pool_size: 10,
            pool_timeout: None,
        }
    }
}

impl PostgresConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server host.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the server port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the database name.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Sets the role credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Sets the table name.
    #[must_use]
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Sets the schema name.
    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Sets the pool size bounds.
    #[must_use]
    pub const fn with_pool_size(mut self, min: usize, max: usize) -> Self {
        self.min_pool_size = min;
        self.max_pool_size = max;
        self
    }

    /// Sets the pool acquire timeout.
    #[must_use]
    pub const fn with_pool_timeout(mut self, timeout: Duration) -> Self {
        self.pool_timeout = Some(timeout);
        self
    }

    /// Loads configuration from `AGENTFS_PG_*` environment variables,
    /// reading a `.env` file first when present.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        if let Ok(host) = std::env::var("AGENTFS_PG_HOST") {
            config.host = host;
        }
        if let Ok(port) = std::env::var("AGENTFS_PG_PORT") {
            if let Ok(port) = port.parse() {
                config.port = port;
            }
        }
        if let Ok(database) = std::env::var("AGENTFS_PG_DATABASE") {
            config.database = database;
        }
        if let Ok(user) = std::env::var("AGENTFS_PG_USER") {
            config.user = user;
        }
        if let Ok(password) = std::env::var("AGENTFS_PG_PASSWORD") {
            config.password = password;
        }
        if let Ok(table) = std::env::var("AGENTFS_PG_TABLE") {
            config.table = table;
        }
        config
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the table or schema name is not
    /// a safe SQL identifier, or the pool bounds are inconsistent.
    pub fn validate(&self) -> Result<()> {
        if !is_safe_identifier(&self.table) {
            return Err(Error::InvalidConfig(format!(
                "table name '{}' is not a safe SQL identifier",
                self.table
            )));
        }
        if !is_safe_identifier(&self.schema) {
            return Err(Error::InvalidConfig(format!(
                "schema name '{}' is not a safe SQL identifier",
                self.schema
            )));
        }
        if self.max_pool_size == 0 {
            return Err(Error::InvalidConfig(
                "max_pool_size must be at least 1".to_string(),
            ));
        }
        if self.min_pool_size > self.max_pool_size {
            return Err(Error::InvalidConfig(
                "min_pool_size exceeds max_pool_size".to_string(),
            ));
        }
        Ok(())
    }
}

/// Combined settings for both backends.
#[derive(Debug, Clone, Default)]
pub struct StorageSettings {
    /// S3 backend parameters.
    pub s3: S3Config,
    /// PostgreSQL backend parameters.
    pub postgres: PostgresConfig,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// S3 section.
    pub s3: Option<S3Section>,
    /// PostgreSQL section.
    pub postgres: Option<PostgresSection>,
}

/// S3 section in a config file.
#[derive(Debug, Deserialize, Default)]
pub struct S3Section {
    /// Bucket name.
    pub bucket: Option<String>,
    /// Key prefix.
    pub prefix: Option<String>,
    /// Region.
    pub region: Option<String>,
    /// Endpoint URL.
    pub endpoint_url: Option<String>,
    /// Access key ID.
    pub access_key_id: Option<String>,
    /// Secret access key.
    pub secret_access_key: Option<String>,
    /// Path-style addressing.
    pub force_path_style: Option<bool>,
}

/// PostgreSQL section in a config file.
#[derive(Debug, Deserialize, Default)]
pub struct PostgresSection {
    /// Server host.
    pub host: Option<String>,
    /// Server port.
    pub port: Option<u16>,
    /// Database name.
    pub database: Option<String>,
    /// Role name.
    pub user: Option<String>,
    /// Role password.
    pub password: Option<String>,
    /// Table name.
    pub table: Option<String>,
    /// Schema name.
    pub schema: Option<String>,
    /// Minimum pool size.
    pub min_pool_size: Option<usize>,
    /// Maximum pool size.
    pub max_pool_size: Option<usize>,
    /// Pool acquire timeout in seconds.
    pub pool_timeout_secs: Option<u64>,
}

impl StorageSettings {
    /// Loads settings from a TOML file, merging onto defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!("cannot read '{}': {e}", path.display()))
        })?;

        let file: ConfigFile = toml::from_str(&contents).map_err(|e| {
            Error::InvalidConfig(format!("cannot parse '{}': {e}", path.display()))
        })?;

        Ok(Self::from_config_file(file))
    }

    /// Converts a parsed [`ConfigFile`] into settings.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut settings = Self::default();

        if let Some(s3) = file.s3 {
            if let Some(bucket) = s3.bucket {
                settings.s3.bucket = bucket;
            }
            if let Some(prefix) = s3.prefix {
                settings.s3.prefix = prefix;
            }
            settings.s3.region = s3.region.or(settings.s3.region);
            settings.s3.endpoint_url = s3.endpoint_url.or(settings.s3.endpoint_url);
            settings.s3.access_key_id = s3.access_key_id.or(settings.s3.access_key_id);
            settings.s3.secret_access_key =
                s3.secret_access_key.or(settings.s3.secret_access_key);
            if let Some(force) = s3.force_path_style {
                settings.s3.force_path_style = force;
            } else if settings.s3.endpoint_url.is_some() {
                settings.s3.force_path_style = true;
            }
        }

        if let Some(pg) = file.postgres {
            if let Some(host) = pg.host {
                settings.postgres.host = host;
            }
            if let Some(port) = pg.port {
                settings.postgres.port = port;
            }
            if let Some(database) = pg.database {
                settings.postgres.database = database;
            }
            if let Some(user) = pg.user {
                settings.postgres.user = user;
            }
            if let Some(password) = pg.password {
                settings.postgres.password = password;
            }
            if let Some(table) = pg.table {
                settings.postgres.table = table;
            }
            if let Some(schema) = pg.schema {
                settings.postgres.schema = schema;
            }
            if let Some(min) = pg.min_pool_size {
                settings.postgres.min_pool_size = min;
            }
            if let Some(max) = pg.max_pool_size {
                settings.postgres.max_pool_size = max;
            }
            if let Some(secs) = pg.pool_timeout_secs {
                settings.postgres.pool_timeout = Some(Duration::from_secs(secs));
            }
        }

        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_identifiers() {
        assert!(is_safe_identifier("agent_files"));
        assert!(is_safe_identifier("files2"));
        assert!(!is_safe_identifier(""));
        assert!(!is_safe_identifier("2files"));
        assert!(!is_safe_identifier("files; DROP TABLE x"));
        assert!(!is_safe_identifier("files-2"));
    }

    #[test]
    fn test_postgres_validate_rejects_unsafe_table() {
        let config = PostgresConfig::default().with_table("files; --");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_postgres_validate_rejects_inverted_pool_bounds() {
        let config = PostgresConfig::default().with_pool_size(20, 5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_s3_validate_rejects_empty_bucket() {
        let config = S3Config::default().with_bucket("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_url_enables_path_style() {
        let config = S3Config::default().with_endpoint_url("http://localhost:9000");
        assert!(config.force_path_style);
    }

    #[test]
    fn test_settings_from_toml() {
        let toml = r#"
            [s3]
            bucket = "test-bucket"
            prefix = "test-run"
            endpoint_url = "http://localhost:9000"

            [postgres]
            host = "db.internal"
            port = 5433
            table = "test_files"
            min_pool_size = 2
            max_pool_size = 5
            pool_timeout_secs = 30
        "#;
        let file: ConfigFile = toml::from_str(toml).unwrap();
        let settings = StorageSettings::from_config_file(file);

        assert_eq!(settings.s3.bucket, "test-bucket");
        assert_eq!(settings.s3.prefix, "test-run");
        assert!(settings.s3.force_path_style);
        assert_eq!(settings.postgres.host, "db.internal");
        assert_eq!(settings.postgres.port, 5433);
        assert_eq!(settings.postgres.table, "test_files");
        assert_eq!(
            settings.postgres.pool_timeout,
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_defaults_are_valid() {
        S3Config::default().validate().unwrap();
        PostgresConfig::default().validate().unwrap();
    }
}
