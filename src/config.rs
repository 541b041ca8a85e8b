use std::sync::Arc;

use anyhow::Result;
use ledger::rates::FrankfurterRateProvider;
use sea_orm::Database;

use crate::schemas::AppState;

/// Initialize application state from a database URL.
pub async fn initialize_app_state_with_url(database_url: &str) -> Result<AppState> {
    tracing::info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;

    let rates = Arc::new(FrankfurterRateProvider::new()?);

    Ok(AppState { db, rates })
}
