//! Connection and repository configuration.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BOUTIQUE_DB_HOST` - database host name
//! - `BOUTIQUE_DB_NAME` - database name
//! - `BOUTIQUE_DB_USER` - login user
//! - `BOUTIQUE_DB_PASSWORD` - login password
//!
//! ## Optional
//! - `BOUTIQUE_DB_KIND` - `postgres` (default) or `mssql`
//! - `BOUTIQUE_DB_PORT` - port (default: 5432 for postgres, 1433 for mssql)

use secrecy::SecretString;
use thiserror::Error;

use crate::db::DbKind;
use crate::sql::ENTITY_ALIAS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub kind: DbKind,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: SecretString,
}

impl DatabaseConfig {
    /// Loads configuration from `BOUTIQUE_DB_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));

        let kind = match lookup("BOUTIQUE_DB_KIND") {
            Some(raw) => raw
                .parse::<DbKind>()
                .map_err(|e| ConfigError::InvalidEnvVar("BOUTIQUE_DB_KIND".to_string(), e))?,
            None => DbKind::Postgres,
        };
        let port = match lookup("BOUTIQUE_DB_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|e| {
                ConfigError::InvalidEnvVar("BOUTIQUE_DB_PORT".to_string(), e.to_string())
            })?,
            None => kind.default_port(),
        };

        Ok(Self {
            kind,
            host: required("BOUTIQUE_DB_HOST")?,
            port,
            database: required("BOUTIQUE_DB_NAME")?,
            user: required("BOUTIQUE_DB_USER")?,
            password: SecretString::from(required("BOUTIQUE_DB_PASSWORD")?),
        })
    }
}

/// Settings shared by the repositories built over one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Alias of the entity table, also the prefix of its selected columns.
    /// Must differ from the join aliases `j` and `p`.
    pub entity_alias: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            entity_alias: ENTITY_ALIAS.to_string(),
        }
    }
}
