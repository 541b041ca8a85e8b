use anyhow::Result;
use chrono::{NaiveDate, Utc};
use sea_orm::Database;
use tracing::{debug, info, warn};

/// One scheduler tick: materialize every recurring transaction due up to
/// `as_of`. Exits non-zero when any template failed so cron can flag it.
pub async fn generate_due(database_url: &str, as_of: Option<NaiveDate>) -> Result<()> {
    let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());
    info!("Running due-generation pass up to {}", as_of);
    debug!("Database URL: {}", database_url);

    let db = Database::connect(database_url).await?;
    let report = ledger::recurrence::run_due_generation(&db, as_of).await?;

    info!(
        "Generated {} transactions, {} templates completed",
        report.generated, report.completed
    );
    if !report.failed.is_empty() {
        for (template_id, message) in &report.failed {
            warn!("Template {} failed: {}", template_id, message);
        }
        anyhow::bail!("{} recurring templates failed to generate", report.failed.len());
    }

    Ok(())
}
