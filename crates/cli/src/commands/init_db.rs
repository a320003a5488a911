use std::sync::Arc;

use anyhow::Result;
use factor_platform_data::{ConnectionManager, FactorStore};

/// Applies the schema migrations to the active database.
///
/// # Errors
/// Returns an error if the connection or a migration fails.
pub async fn run_init_db(manager: &Arc<ConnectionManager>) -> Result<()> {
    let mut store = FactorStore::new(manager);
    let result = store.migrate().await;
    store.close().await;
    result?;

    println!("Factor tables are up to date");
    Ok(())
}
