//! Read-only catalog queries.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use factor_platform_data::{ConnectionManager, FactorDefinition, FactorStore, PendingFilter};

#[derive(Args, Debug, Clone)]
pub struct VersionsArgs {
    /// Factor name
    #[arg(long)]
    pub name: String,
}

#[derive(Args, Debug, Clone)]
pub struct LatestArgs {
    /// Factor name
    #[arg(long)]
    pub name: String,
}

#[derive(Args, Debug, Clone)]
pub struct PendingArgs {
    /// Only versions of this factor
    #[arg(long)]
    pub name: Option<String>,

    /// Only this version
    #[arg(long)]
    pub version: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ExistsArgs {
    /// Factor name
    #[arg(long)]
    pub name: String,

    /// Narrow the check to one version
    #[arg(long)]
    pub version: Option<String>,
}

fn print_definition(definition: &FactorDefinition) -> Result<()> {
    println!("{}", serde_json::to_string(definition)?);
    Ok(())
}

/// # Errors
/// Returns an error if the database query fails.
pub async fn run_names(manager: &Arc<ConnectionManager>) -> Result<()> {
    let mut store = FactorStore::new(manager);
    let result = store.list_names().await;
    store.close().await;

    for name in result? {
        println!("{name}");
    }
    Ok(())
}

/// # Errors
/// Returns an error if the database query fails.
pub async fn run_versions(args: VersionsArgs, manager: &Arc<ConnectionManager>) -> Result<()> {
    let mut store = FactorStore::new(manager);
    let result = store.list_versions(&args.name).await;
    store.close().await;

    for version in result? {
        println!("{version}");
    }
    Ok(())
}

/// # Errors
/// Returns an error if the factor is unknown or the database query fails.
pub async fn run_latest(args: LatestArgs, manager: &Arc<ConnectionManager>) -> Result<()> {
    let mut store = FactorStore::new(manager);
    let result = store.latest_approved(&args.name).await;
    store.close().await;

    match result? {
        Some(definition) => print_definition(&definition)?,
        None => println!("{} has no approved version", args.name),
    }
    Ok(())
}

/// # Errors
/// Returns an error if the database query fails.
pub async fn run_pending(args: PendingArgs, manager: &Arc<ConnectionManager>) -> Result<()> {
    let filter = PendingFilter {
        name: args.name,
        version: args.version,
    };

    let mut store = FactorStore::new(manager);
    let result = store.pending(&filter).await;
    store.close().await;

    let pending = result?;
    if pending.is_empty() {
        println!("No pending factors");
    }
    for definition in &pending {
        print_definition(definition)?;
    }
    Ok(())
}

/// # Errors
/// Returns an error if the database query fails.
pub async fn run_exists(args: ExistsArgs, manager: &Arc<ConnectionManager>) -> Result<()> {
    let mut store = FactorStore::new(manager);
    let result = store.exists(&args.name, args.version.as_deref()).await;
    store.close().await;

    println!("{}", result?);
    Ok(())
}
