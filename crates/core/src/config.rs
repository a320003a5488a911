use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: Environment,
    /// Production database.
    pub database: DatabaseConfig,
    pub test_database: DatabaseConfig,
    pub retry: RetryConfig,
    pub pool: PoolConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            database: DatabaseConfig::default(),
            test_database: DatabaseConfig {
                host: "127.0.0.1".to_string(),
                database: "factor_system".to_string(),
                ..DatabaseConfig::default()
            },
            retry: RetryConfig::default(),
            pool: PoolConfig::default(),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl AppConfig {
    /// Returns the database settings selected by the environment.
    #[must_use]
    pub fn active_database(&self) -> &DatabaseConfig {
        match self.environment {
            Environment::Test => &self.test_database,
            Environment::Production => &self.database,
        }
    }
}

/// Selects which database configuration set is used.
///
/// `test` and `testing` (any case) select the test set; every other value
/// selects production.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Environment {
    #[default]
    Test,
    Production,
}

impl From<String> for Environment {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "test" | "testing" => Self::Test,
            _ => Self::Production,
        }
    }
}

impl From<Environment> for String {
    fn from(value: Environment) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Test => write!(f, "test"),
            Self::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub charset: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
}

impl DatabaseConfig {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: "factor_platform".to_string(),
            charset: "utf8mb4".to_string(),
            connect_timeout_secs: 30,
            read_timeout_secs: 30,
            write_timeout_secs: 30,
        }
    }
}

// Keeps the password out of logs.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("charset", &self.charset)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .field("write_timeout_secs", &self.write_timeout_secs)
            .finish()
    }
}

/// Connection establishment retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub retry_delay_secs: f64,
    pub backoff_factor: f64,
}

/// Upper bound on a single retry wait.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(300);

impl RetryConfig {
    /// Wait before the attempt following failed attempt `attempt` (0-based):
    /// `retry_delay_secs * backoff_factor^attempt`, capped at
    /// [`MAX_RETRY_DELAY`]. Negative delays wait zero; NaN or overflowing
    /// delays wait the maximum.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.retry_delay_secs * self.backoff_factor.powi(exponent);
        if secs.is_nan() {
            return MAX_RETRY_DELAY;
        }
        if secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(secs).map_or(MAX_RETRY_DELAY, |d| d.min(MAX_RETRY_DELAY))
    }

    /// Number of connection attempts, never less than one.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_secs: 1.0,
            backoff_factor: 2.0,
        }
    }
}

/// Pool sizing hints. The connection manager does not enforce them; the
/// batch compute command uses `pool_size` as its default worker count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub pool_name: String,
    pub pool_size: u32,
    pub max_overflow: u32,
    pub pool_recycle_secs: u64,
    pub pre_ping: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_name: "factor_platform_pool".to_string(),
            pool_size: 20,
            max_overflow: 30,
            pool_recycle_secs: 3600,
            pre_ping: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub sql_debug: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            sql_debug: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the per-instrument CSV market data tree.
    pub market_data_dir: String,
    /// Root under which computed factor artifacts are written.
    pub results_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            market_data_dir: "data/market".to_string(),
            results_dir: "data/results".to_string(),
        }
    }
}
