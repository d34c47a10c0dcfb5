//! Configuration read from the process environment
//!
//! These tests mutate environment variables and run serially.

use serial_test::serial;

use separator_core::config::{
    ProcessConfig, StoreSettings, KEY_CONNECTION_STRING, KEY_CONNECT_TIMEOUT, KEY_TABLE,
};
use separator_core::store::{CredentialResolver, CredentialSource};

struct EnvGuard(Vec<&'static str>);

impl EnvGuard {
    fn set(pairs: &[(&'static str, &str)]) -> Self {
        for (key, value) in pairs {
            std::env::set_var(key, value);
        }
        Self(pairs.iter().map(|(k, _)| *k).collect())
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for key in &self.0 {
            std::env::remove_var(key);
        }
    }
}

#[test]
#[serial]
fn test_settings_from_environment() {
    let _guard = EnvGuard::set(&[(KEY_TABLE, "audit.separations"), (KEY_CONNECT_TIMEOUT, "5")]);

    let settings = StoreSettings::from_config(&ProcessConfig::from_env()).unwrap();

    assert_eq!(settings.table.schema(), Some("audit"));
    assert_eq!(settings.table.name(), "separations");
    assert_eq!(settings.connect_timeout.as_secs(), 5);
}

#[tokio::test]
#[serial]
async fn test_environment_connection_string_resolves() {
    let _guard = EnvGuard::set(&[(KEY_CONNECTION_STRING, "postgresql://app@db.internal/separators")]);

    let config = ProcessConfig::from_env();
    let settings = StoreSettings::from_config(&config).unwrap();
    let resolver = CredentialResolver::from_settings(config, &settings).unwrap();

    let (_, source) = resolver.resolve().await.unwrap();
    assert_eq!(source, CredentialSource::ConfigConnectionString);
}

#[test]
#[serial]
fn test_invalid_table_from_environment_is_rejected() {
    let _guard = EnvGuard::set(&[(KEY_TABLE, "records;drop")]);
    let err = StoreSettings::from_config(&ProcessConfig::from_env()).unwrap_err();
    assert_eq!(err.kind(), "configuration");
}
