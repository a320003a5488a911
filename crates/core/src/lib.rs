pub mod config;
pub mod config_loader;
pub mod series;
pub mod traits;

pub use config::{
    AppConfig, DatabaseConfig, Environment, LoggingConfig, PoolConfig, RetryConfig,
    StorageConfig, MAX_RETRY_DELAY,
};
pub use config_loader::ConfigLoader;
pub use series::{parse_trading_date, Bar, FactorOutput, FactorPoint, MarketSeries};
pub use traits::{Factor, FactorEngine, MarketDataSource, ResultStorage};
