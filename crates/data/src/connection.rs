//! Database connection management.
//!
//! A [`ConnectionManager`] is built once from configuration and shared via
//! `Arc`. Each worker takes its own [`WorkerConnection`], a private slot
//! holding at most one physical connection that is probed before reuse and
//! recreated with exponential backoff when it is missing or dead. Workers
//! never share or wait on each other's connections.

use async_trait::async_trait;
use factor_platform_core::{DatabaseConfig, RetryConfig};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{ConnectOptions, Connection};
use std::sync::Arc;
use std::time::Duration;

use crate::error::StoreError;

/// Establishes, probes and closes physical connections.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: Send;

    async fn connect(&self) -> Result<Self::Connection, sqlx::Error>;
    async fn ping(&self, conn: &mut Self::Connection) -> Result<(), sqlx::Error>;
    async fn close(&self, conn: Self::Connection) -> Result<(), sqlx::Error>;
}

/// MySQL connector.
///
/// Every attempt starts from a fresh clone of the base options. New sessions
/// run with autocommit off, so writes only land through explicit
/// transactions.
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    options: MySqlConnectOptions,
    connect_timeout: Duration,
    session_init: String,
}

impl MySqlConnector {
    /// Builds a connector from database settings.
    #[must_use]
    pub fn from_config(config: &DatabaseConfig, sql_debug: bool) -> Self {
        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database)
            .charset(&config.charset);

        if !sql_debug {
            options = options.disable_statement_logging();
        }

        let session_init = format!(
            "SET SESSION autocommit = 0, net_read_timeout = {}, net_write_timeout = {}",
            config.read_timeout_secs, config.write_timeout_secs
        );

        Self {
            options,
            connect_timeout: config.connect_timeout(),
            session_init,
        }
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    type Connection = MySqlConnection;

    async fn connect(&self) -> Result<MySqlConnection, sqlx::Error> {
        let options = self.options.clone();

        let mut conn = tokio::time::timeout(self.connect_timeout, options.connect())
            .await
            .map_err(|_| {
                sqlx::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connect timed out after {:?}", self.connect_timeout),
                ))
            })??;

        sqlx::Executor::execute(&mut conn, sqlx::raw_sql(&self.session_init)).await?;

        Ok(conn)
    }

    async fn ping(&self, conn: &mut MySqlConnection) -> Result<(), sqlx::Error> {
        conn.ping().await
    }

    async fn close(&self, conn: MySqlConnection) -> Result<(), sqlx::Error> {
        conn.close().await
    }
}

/// Shared connection factory: one configuration, many independent connections.
pub struct ConnectionManager<C: Connector = MySqlConnector> {
    connector: C,
    retry: RetryConfig,
}

impl<C: Connector> ConnectionManager<C> {
    /// Creates a manager. Wrap it in `Arc` to hand out worker connections.
    #[must_use]
    pub fn new(connector: C, retry: RetryConfig) -> Self {
        tracing::info!(
            max_retries = retry.attempts(),
            "Connection manager initialized"
        );
        Self { connector, retry }
    }

    #[must_use]
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Creates a private connection slot for the calling worker.
    #[must_use]
    pub fn worker(self: &Arc<Self>) -> WorkerConnection<C> {
        WorkerConnection {
            manager: Arc::clone(self),
            conn: None,
        }
    }

    /// Opens a connection, retrying with exponential backoff.
    ///
    /// # Errors
    /// Returns [`StoreError::Connection`] carrying the last failure once all
    /// attempts are exhausted.
    pub async fn create_with_retry(&self) -> Result<C::Connection, StoreError> {
        let attempts = self.retry.attempts();
        let mut attempt = 0;

        loop {
            match self.connector.connect().await {
                Ok(conn) => {
                    tracing::info!("Database connection created successfully");
                    return Ok(conn);
                }
                Err(source) => {
                    attempt += 1;
                    if attempt >= attempts {
                        tracing::error!(
                            "Database connection attempt {} failed: {}. Giving up",
                            attempt,
                            source
                        );
                        return Err(StoreError::Connection { attempts, source });
                    }

                    let wait = self.retry.delay_for(attempt - 1);
                    tracing::warn!(
                        "Database connection attempt {} failed: {}. Retrying in {:?}...",
                        attempt,
                        source,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

impl ConnectionManager<MySqlConnector> {
    /// Creates a MySQL-backed manager from database and retry settings.
    #[must_use]
    pub fn mysql(database: &DatabaseConfig, retry: RetryConfig, sql_debug: bool) -> Self {
        Self::new(MySqlConnector::from_config(database, sql_debug), retry)
    }
}

/// A worker's private connection slot.
pub struct WorkerConnection<C: Connector = MySqlConnector> {
    manager: Arc<ConnectionManager<C>>,
    conn: Option<C::Connection>,
}

impl<C: Connector> WorkerConnection<C> {
    /// Returns a live connection, creating or recreating it as needed.
    ///
    /// # Errors
    /// Returns [`StoreError::Connection`] if a new connection cannot be
    /// established.
    pub async fn acquire(&mut self) -> Result<&mut C::Connection, StoreError> {
        let cached = match self.conn.take() {
            Some(mut conn) => match self.manager.connector.ping(&mut conn).await {
                Ok(()) => Some(conn),
                Err(e) => {
                    tracing::warn!("Connection ping failed, recreating: {}", e);
                    None
                }
            },
            None => None,
        };

        let conn = match cached {
            Some(conn) => conn,
            None => self.manager.create_with_retry().await?,
        };

        Ok(self.conn.insert(conn))
    }

    /// Closes and clears the cached connection. Safe to call repeatedly.
    pub async fn release(&mut self) {
        if let Some(conn) = self.conn.take() {
            match self.manager.connector.close(conn).await {
                Ok(()) => tracing::info!("Database connection closed"),
                Err(e) => tracing::error!("Error closing database connection: {}", e),
            }
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use tokio::time::Instant;

    /// Fails the first `failures` connects, then hands out numbered connections.
    struct FlakyConnector {
        failures: u32,
        connects: AtomicU32,
        alive: AtomicBool,
        closes: AtomicU32,
        fail_close: bool,
    }

    impl FlakyConnector {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                connects: AtomicU32::new(0),
                alive: AtomicBool::new(true),
                closes: AtomicU32::new(0),
                fail_close: false,
            }
        }
    }

    fn refused(attempt: u32) -> sqlx::Error {
        sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            format!("refused on attempt {attempt}"),
        ))
    }

    #[async_trait]
    impl Connector for FlakyConnector {
        type Connection = u32;

        async fn connect(&self) -> Result<u32, sqlx::Error> {
            let attempt = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.failures {
                return Err(refused(attempt));
            }
            self.alive.store(true, Ordering::SeqCst);
            Ok(attempt)
        }

        async fn ping(&self, _conn: &mut u32) -> Result<(), sqlx::Error> {
            if self.alive.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(sqlx::Error::PoolClosed)
            }
        }

        async fn close(&self, _conn: u32) -> Result<(), sqlx::Error> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                Err(sqlx::Error::PoolClosed)
            } else {
                Ok(())
            }
        }
    }

    fn manager(connector: FlakyConnector) -> Arc<ConnectionManager<FlakyConnector>> {
        Arc::new(ConnectionManager::new(connector, RetryConfig::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_on_third_attempt_after_backoff() {
        let manager = manager(FlakyConnector::new(2));
        let start = Instant::now();

        let conn = manager.create_with_retry().await.unwrap();

        assert_eq!(conn, 3);
        // 1s after the first failure, 2s after the second
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_attempts_surface_last_error() {
        let manager = manager(FlakyConnector::new(3));
        let start = Instant::now();

        let err = manager.create_with_retry().await.unwrap_err();

        match &err {
            StoreError::Connection { attempts, source } => {
                assert_eq!(*attempts, 3);
                assert!(source.to_string().contains("refused on attempt 3"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // No sleep after the final failure
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert_eq!(manager.connector.connects.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_acquire_reuses_live_connection() {
        let manager = manager(FlakyConnector::new(0));
        let mut worker = manager.worker();

        let first = *worker.acquire().await.unwrap();
        let second = *worker.acquire().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(manager.connector.connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_acquire_recreates_dead_connection() {
        let manager = manager(FlakyConnector::new(0));
        let mut worker = manager.worker();

        let first = *worker.acquire().await.unwrap();
        manager.connector.alive.store(false, Ordering::SeqCst);
        let second = *worker.acquire().await.unwrap();

        assert_ne!(first, second);
        assert_eq!(manager.connector.connects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_workers_hold_independent_connections() {
        let manager = manager(FlakyConnector::new(0));
        let mut a = manager.worker();
        let mut b = manager.worker();

        let conn_a = *a.acquire().await.unwrap();
        let conn_b = *b.acquire().await.unwrap();

        assert_ne!(conn_a, conn_b);
        a.release().await;
        assert!(!a.is_connected());
        assert!(b.is_connected());
    }

    #[tokio::test]
    async fn test_release_is_idempotent_and_swallows_close_errors() {
        let mut connector = FlakyConnector::new(0);
        connector.fail_close = true;
        let manager = manager(connector);
        let mut worker = manager.worker();

        worker.release().await;
        worker.acquire().await.unwrap();
        worker.release().await;
        worker.release().await;

        assert!(!worker.is_connected());
        assert_eq!(manager.connector.closes.load(Ordering::SeqCst), 1);
    }
}
