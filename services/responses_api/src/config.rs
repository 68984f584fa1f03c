//! services/responses_api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use response_store_core::{CompletionPolicy, KeyScheme};
use std::net::SocketAddr;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// S3 rejects presigned URLs valid for longer than seven days.
pub const MAX_PRESIGN_EXPIRY_SECS: u64 = 604_800;

/// Where records are persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    /// Process-local store; nothing survives a restart.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "s3" => Ok(StorageBackend::S3),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("'{}' is not a storage backend (s3 | memory)", other)),
        }
    }
}

/// The knobs the response service itself needs, independent of any transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServiceSettings {
    pub key_scheme: KeyScheme,
    pub completion: CompletionPolicy,
    /// Total tries for a conditional read-modify-write before giving up with a conflict.
    pub max_write_attempts: u32,
    pub presign_default_expiry_secs: u64,
    pub presign_max_expiry_secs: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            key_scheme: KeyScheme::Namespaced,
            completion: CompletionPolicy::default(),
            max_write_attempts: 3,
            presign_default_expiry_secs: 300,
            presign_max_expiry_secs: 3600,
        }
    }
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub storage_backend: StorageBackend,
    pub responses_bucket: String,
    pub aws_region: Option<String>,
    pub service: ServiceSettings,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server Settings ---
        let bind_address = parse_or(&lookup, "BIND_ADDRESS", SocketAddr::from(([0, 0, 0, 0], 3000)))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Storage Settings ---
        let storage_backend = parse_or(&lookup, "STORAGE_BACKEND", StorageBackend::S3)?;
        let responses_bucket = match (lookup("RESPONSES_BUCKET"), storage_backend) {
            (Some(bucket), _) if !bucket.trim().is_empty() => bucket,
            (_, StorageBackend::Memory) => "local-responses".to_string(),
            (_, StorageBackend::S3) => {
                return Err(ConfigError::MissingVar("RESPONSES_BUCKET".to_string()))
            }
        };
        let aws_region = lookup("AWS_REGION");

        // --- Response Service Settings ---
        let defaults = ServiceSettings::default();
        let key_scheme = parse_or(&lookup, "KEY_SCHEME", defaults.key_scheme)?;
        let auto_complete = parse_or(&lookup, "AUTO_COMPLETE", false)?;
        let max_write_attempts = parse_or(&lookup, "MAX_WRITE_ATTEMPTS", defaults.max_write_attempts)?;
        if max_write_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_WRITE_ATTEMPTS".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let presign_default_expiry_secs = parse_or(
            &lookup,
            "PRESIGN_DEFAULT_EXPIRY_SECS",
            defaults.presign_default_expiry_secs,
        )?;
        let presign_max_expiry_secs =
            parse_or(&lookup, "PRESIGN_MAX_EXPIRY_SECS", defaults.presign_max_expiry_secs)?;
        for (name, secs) in [
            ("PRESIGN_DEFAULT_EXPIRY_SECS", presign_default_expiry_secs),
            ("PRESIGN_MAX_EXPIRY_SECS", presign_max_expiry_secs),
        ] {
            if secs > MAX_PRESIGN_EXPIRY_SECS {
                return Err(ConfigError::InvalidValue(
                    name.to_string(),
                    format!("must be at most {} seconds", MAX_PRESIGN_EXPIRY_SECS),
                ));
            }
        }

        Ok(Self {
            bind_address,
            log_level,
            storage_backend,
            responses_bucket,
            aws_region,
            service: ServiceSettings {
                key_scheme,
                completion: CompletionPolicy { auto_complete },
                max_write_attempts,
                presign_default_expiry_secs,
                presign_max_expiry_secs: presign_max_expiry_secs.max(presign_default_expiry_secs),
            },
        })
    }
}

/// Parses `name` when set, otherwise falls back to `default`.
fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn s3_backend_requires_a_bucket() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(v)) if v == "RESPONSES_BUCKET"));
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[("RESPONSES_BUCKET", "responses-dev")]).unwrap();
        assert_eq!(config.responses_bucket, "responses-dev");
        assert_eq!(config.storage_backend, StorageBackend::S3);
        assert_eq!(config.service, ServiceSettings::default());
        assert_eq!(config.bind_address.port(), 3000);
    }

    #[test]
    fn memory_backend_needs_no_bucket() {
        let config = load(&[
            ("STORAGE_BACKEND", "memory"),
            ("KEY_SCHEME", "legacy"),
            ("AUTO_COMPLETE", "true"),
        ])
        .unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Memory);
        assert_eq!(config.service.key_scheme, KeyScheme::Legacy);
        assert!(config.service.completion.auto_complete);
    }

    #[test]
    fn rejects_invalid_values() {
        let err = load(&[("RESPONSES_BUCKET", "b"), ("MAX_WRITE_ATTEMPTS", "0")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name, _) if name == "MAX_WRITE_ATTEMPTS"));

        let err = load(&[("RESPONSES_BUCKET", "b"), ("AUTO_COMPLETE", "sometimes")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name, _) if name == "AUTO_COMPLETE"));
    }

    #[test]
    fn presign_expiry_stays_within_the_s3_limit() {
        let config = load(&[("RESPONSES_BUCKET", "b"), ("PRESIGN_MAX_EXPIRY_SECS", "604800")]).unwrap();
        assert_eq!(config.service.presign_max_expiry_secs, MAX_PRESIGN_EXPIRY_SECS);

        let err = load(&[("RESPONSES_BUCKET", "b"), ("PRESIGN_MAX_EXPIRY_SECS", "604801")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name, _) if name == "PRESIGN_MAX_EXPIRY_SECS"));

        let err = load(&[("RESPONSES_BUCKET", "b"), ("PRESIGN_DEFAULT_EXPIRY_SECS", "1000000")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(name, _) if name == "PRESIGN_DEFAULT_EXPIRY_SECS"));
    }
}
