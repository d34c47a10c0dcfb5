//! Configuration management

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use separator_common::{Result, SeparatorError};

// ============================================================================
// Configuration Keys
// ============================================================================

pub const KEY_CONNECTION_STRING: &str = "DB_CONNECTION_STRING";
pub const KEY_SERVER: &str = "DB_SERVER";
pub const KEY_DATABASE: &str = "DB_NAME";
pub const KEY_USERNAME: &str = "DB_USERNAME";
pub const KEY_PASSWORD: &str = "DB_PASSWORD";
pub const KEY_TABLE: &str = "DB_TABLE";
pub const KEY_CONNECT_TIMEOUT: &str = "DB_CONNECT_TIMEOUT";
pub const KEY_VAULT_URL: &str = "KEY_VAULT_URL";
pub const KEY_VAULT_TOKEN: &str = "KEY_VAULT_TOKEN";
pub const KEY_CONNECTION_STRING_SECRET: &str = "DB_CONNECTION_STRING_SECRET";
pub const KEY_SERVER_SECRET: &str = "DB_SERVER_SECRET";
pub const KEY_DATABASE_SECRET: &str = "DB_NAME_SECRET";
pub const KEY_USERNAME_SECRET: &str = "DB_USERNAME_SECRET";
pub const KEY_PASSWORD_SECRET: &str = "DB_PASSWORD_SECRET";

// ============================================================================
// Defaults
// ============================================================================

/// Table used when `DB_TABLE` is unset
pub const DEFAULT_TABLE: &str = "SeparatorRecords";

/// Connection timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_CONNECTION_STRING_SECRET: &str = "SqlConnString";
pub const DEFAULT_SERVER_SECRET: &str = "mpr-separator-db-server";
pub const DEFAULT_DATABASE_SECRET: &str = "mpr-separator-db-name";
pub const DEFAULT_USERNAME_SECRET: &str = "mpr-separator-db-username";
pub const DEFAULT_PASSWORD_SECRET: &str = "mpr-separator-db-password";

/// Flat string-keyed process configuration
///
/// A snapshot of the environment taken once; blank values read as unset.
#[derive(Clone, Default)]
pub struct ProcessConfig {
    vars: HashMap<String, String>,
}

impl ProcessConfig {
    /// Snapshot the process environment after loading `.env`, if present
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Trimmed, non-empty value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }
}

// Values may hold passwords; only the keys are printed.
impl std::fmt::Debug for ProcessConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.vars.keys().collect();
        keys.sort();
        f.debug_struct("ProcessConfig").field("keys", &keys).finish()
    }
}

/// A validated SQL table identifier, optionally schema-qualified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableName {
    schema: Option<String>,
    name: String,
}

impl TableName {
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim();
        let (schema, name) = match value.split_once('.') {
            Some((schema, name)) => (Some(schema), name),
            None => (None, value),
        };

        for part in schema.iter().chain(std::iter::once(&name)) {
            if !is_identifier(part) {
                return Err(SeparatorError::configuration(format!(
                    "Invalid table name '{}': expected letters, digits and underscores",
                    value
                )));
            }
        }

        Ok(Self {
            schema: schema.map(str::to_string),
            name: name.to_string(),
        })
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Double-quoted form for interpolation into statements
    pub fn quoted(&self) -> String {
        match self.schema {
            Some(ref schema) => format!("\"{}\".\"{}\"", schema, self.name),
            None => format!("\"{}\"", self.name),
        }
    }
}

impl Default for TableName {
    fn default() -> Self {
        Self {
            schema: None,
            name: DEFAULT_TABLE.to_string(),
        }
    }
}

impl std::fmt::Display for TableName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.schema {
            Some(ref schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {},
        _ => return false,
    }
    value.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Secret names used by the credential fallback chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretNames {
    pub connection_string: String,
    pub server: String,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl Default for SecretNames {
    fn default() -> Self {
        Self {
            connection_string: DEFAULT_CONNECTION_STRING_SECRET.to_string(),
            server: DEFAULT_SERVER_SECRET.to_string(),
            database: DEFAULT_DATABASE_SECRET.to_string(),
            username: DEFAULT_USERNAME_SECRET.to_string(),
            password: DEFAULT_PASSWORD_SECRET.to_string(),
        }
    }
}

/// Store settings derived from process configuration
#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub table: TableName,
    pub connect_timeout: Duration,
    pub key_vault_url: Option<String>,
    pub key_vault_token: Option<String>,
    pub secret_names: SecretNames,
}

impl StoreSettings {
    pub fn from_config(config: &ProcessConfig) -> Result<Self> {
        let table = TableName::parse(config.get_or(KEY_TABLE, DEFAULT_TABLE))?;

        let connect_timeout = match config.get(KEY_CONNECT_TIMEOUT) {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    SeparatorError::configuration(format!(
                        "{} must be a whole number of seconds, got '{}'",
                        KEY_CONNECT_TIMEOUT, raw
                    ))
                })?;
                if secs == 0 {
                    return Err(SeparatorError::configuration(format!(
                        "{} must be greater than 0",
                        KEY_CONNECT_TIMEOUT
                    )));
                }
                secs
            },
            None => DEFAULT_CONNECT_TIMEOUT_SECS,
        };

        let defaults = SecretNames::default();
        let secret_names = SecretNames {
            connection_string: config
                .get_or(KEY_CONNECTION_STRING_SECRET, &defaults.connection_string)
                .to_string(),
            server: config.get_or(KEY_SERVER_SECRET, &defaults.server).to_string(),
            database: config.get_or(KEY_DATABASE_SECRET, &defaults.database).to_string(),
            username: config.get_or(KEY_USERNAME_SECRET, &defaults.username).to_string(),
            password: config.get_or(KEY_PASSWORD_SECRET, &defaults.password).to_string(),
        };

        Ok(Self {
            table,
            connect_timeout: Duration::from_secs(connect_timeout),
            key_vault_url: config.get(KEY_VAULT_URL).map(str::to_string),
            key_vault_token: config.get(KEY_VAULT_TOKEN).map(str::to_string),
            secret_names,
        })
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            table: TableName::default(),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            key_vault_url: None,
            key_vault_token: None,
            secret_names: SecretNames::default(),
        }
    }
}
