use clap::{Parser, Subcommand};
use factor_platform_core::{ConfigLoader, LoggingConfig};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{
    ApproveArgs, ComputeArgs, ExistsArgs, LatestArgs, PendingArgs, RecordResultArgs,
    ResultExistsArgs, SubmitArgs, VersionsArgs,
};

#[derive(Parser)]
#[command(name = "factor-cli")]
#[command(about = "Factor catalog management and factor computation", long_about = None)]
struct Cli {
    /// Configuration profile; loads config/Config.<PROFILE>.toml over config/Config.toml
    #[arg(long, global = true, env = "FACTOR_PROFILE")]
    profile: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the factor_info and factor_result tables
    InitDb,
    /// Submit a new factor version for review
    Submit(SubmitArgs),
    /// Approve a pending factor version
    Approve(ApproveArgs),
    /// List all factor names
    Names,
    /// List the versions of a factor in submission order
    Versions(VersionsArgs),
    /// Show the latest approved version of a factor
    Latest(LatestArgs),
    /// List factor versions awaiting approval
    Pending(PendingArgs),
    /// Check whether a factor (or one version of it) exists
    Exists(ExistsArgs),
    /// Record a stored factor result
    RecordResult(RecordResultArgs),
    /// Check whether a factor result has been recorded
    ResultExists(ResultExistsArgs),
    /// Compute (or fetch cached) factor results for instruments on a date
    Compute(ComputeArgs),
}

/// Filter directives used when `RUST_LOG` is not set.
fn default_directives(logging: &LoggingConfig) -> String {
    if logging.sql_debug {
        format!("{},sqlx=debug", logging.level)
    } else {
        logging.level.clone()
    }
}

fn init_tracing(logging: &LoggingConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_directives(logging))),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.profile {
        Some(profile) => ConfigLoader::load_with_profile(profile)?,
        None => ConfigLoader::load()?,
    };
    init_tracing(&config.logging);
    tracing::debug!(
        environment = %config.environment,
        database = %config.active_database().database,
        "configuration loaded"
    );

    let manager = commands::connection_manager(&config);

    match cli.command {
        Commands::InitDb => commands::run_init_db(&manager).await?,
        Commands::Submit(args) => commands::run_submit(args, &manager).await?,
        Commands::Approve(args) => commands::run_approve(args, &manager).await?,
        Commands::Names => commands::run_names(&manager).await?,
        Commands::Versions(args) => commands::run_versions(args, &manager).await?,
        Commands::Latest(args) => commands::run_latest(args, &manager).await?,
        Commands::Pending(args) => commands::run_pending(args, &manager).await?,
        Commands::Exists(args) => commands::run_exists(args, &manager).await?,
        Commands::RecordResult(args) => commands::run_record_result(args, &manager).await?,
        Commands::ResultExists(args) => commands::run_result_exists(args, &manager).await?,
        Commands::Compute(args) => commands::run_compute(args, &config, &manager).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_profile_is_global() {
        let cli = Cli::try_parse_from(["factor-cli", "names", "--profile", "staging"]).unwrap();

        assert_eq!(cli.profile.as_deref(), Some("staging"));
        assert!(matches!(cli.command, Commands::Names));
    }

    #[test]
    fn test_default_directives() {
        let mut logging = LoggingConfig::default();
        assert_eq!(default_directives(&logging), "info");

        logging.sql_debug = true;
        logging.level = "debug".to_string();
        assert_eq!(default_directives(&logging), "debug,sqlx=debug");
    }
}
