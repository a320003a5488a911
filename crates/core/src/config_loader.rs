use crate::config::AppConfig;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    value::{Dict, Map, Value},
    Figment, Metadata, Profile, Provider,
};
use std::path::Path;

/// Environment variables understood for compatibility with existing
/// deployments, mapped onto their nested configuration keys.
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("ENVIRONMENT", "environment"),
    ("DB_HOST", "database.host"),
    ("DB_PORT", "database.port"),
    ("DB_USER", "database.user"),
    ("DB_PASSWORD", "database.password"),
    ("DB_DATABASE", "database.database"),
    ("TEST_DB_HOST", "test_database.host"),
    ("TEST_DB_PORT", "test_database.port"),
    ("TEST_DB_USER", "test_database.user"),
    ("TEST_DB_PASSWORD", "test_database.password"),
    ("TEST_DB_DATABASE", "test_database.database"),
    ("DB_POOL_SIZE", "pool.pool_size"),
    ("DB_MAX_OVERFLOW", "pool.max_overflow"),
    ("DB_POOL_RECYCLE", "pool.pool_recycle_secs"),
    ("DB_MAX_RETRIES", "retry.max_retries"),
    ("DB_RETRY_DELAY", "retry.retry_delay_secs"),
    ("DB_BACKOFF_FACTOR", "retry.backoff_factor"),
    ("LOG_LEVEL", "logging.level"),
    ("SQL_DEBUG", "logging.sql_debug"),
];

fn legacy_key(name: &str) -> Option<&'static str> {
    let upper = name.to_ascii_uppercase();
    LEGACY_ENV_KEYS
        .iter()
        .find(|(env, _)| *env == upper)
        .map(|(_, key)| *key)
}

/// Environment variables handed to figment as plain strings.
///
/// `Env` guesses value types, so `DB_PASSWORD=007` would arrive as the
/// integer 7. Here every value stays a string and numeric or boolean fields
/// are parsed when the configuration is extracted.
struct RawEnv(Env);

impl Provider for RawEnv {
    fn metadata(&self) -> Metadata {
        self.0.metadata()
    }

    fn data(&self) -> figment::Result<Map<Profile, Dict>> {
        let mut dict = Dict::new();
        for (key, value) in self.0.iter() {
            insert_path(&mut dict, key.as_str(), value);
        }
        Ok(self.0.profile.collect(dict))
    }
}

fn insert_path(dict: &mut Dict, path: &str, value: String) {
    match path.split_once('.') {
        Some((head, rest)) => {
            let entry = dict
                .entry(head.to_string())
                .or_insert_with(|| Value::from(Dict::new()));
            if !matches!(entry, Value::Dict(..)) {
                *entry = Value::from(Dict::new());
            }
            if let Value::Dict(_, child) = entry {
                insert_path(child, rest, value);
            }
        }
        None => {
            dict.insert(path.to_string(), Value::from(value));
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration from `config/Config.toml` and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load() -> Result<AppConfig> {
        Self::load_from(Path::new("config"), None)
    }

    /// Loads configuration with a specific profile overlay
    /// (`config/Config.{profile}.toml`).
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_with_profile(profile: &str) -> Result<AppConfig> {
        Self::load_from(Path::new("config"), Some(profile))
    }

    /// Loads configuration from `dir`, merging defaults, `Config.toml`, the
    /// optional profile file, legacy variables and `FACTOR_` variables, in
    /// that order.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_from(dir: &Path, profile: Option<&str>) -> Result<AppConfig> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(dir.join("Config.toml")));

        if let Some(profile) = profile {
            figment = figment.merge(Toml::file(dir.join(format!("Config.{profile}.toml"))));
        }

        let config: AppConfig = figment
            .merge(RawEnv(
                Env::raw().filter_map(|key| legacy_key(key.as_str()).map(Into::into)),
            ))
            .merge(RawEnv(Env::prefixed("FACTOR_").split("__")))
            .extract_lossy()?;

        tracing::debug!(environment = %config.environment, "Configuration loaded");

        Ok(config)
    }
}
