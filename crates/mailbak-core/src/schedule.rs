//! Cron-style repeated runs
//!
//! A 5-field minute/hour/day/month/weekday expression re-runs the
//! backup indefinitely. The next tick is computed after the previous
//! run finishes, so runs never overlap and an overdue tick is simply
//! skipped.

use crate::{run_backup, BackupConfig, BackupError, BackupResult, SessionFactory};
use chrono::Local;
use cron::Schedule;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};

/// Parse a 5-field cron expression
pub fn parse_schedule(expr: &str) -> BackupResult<Schedule> {
    // The cron crate expects a seconds field; pin it to zero
    let normalized = format!("0 {}", expr.trim());
    Schedule::from_str(&normalized)
        .map_err(|e| BackupError::Schedule(format!("invalid cron schedule '{}': {}", expr, e)))
}

/// Run backups on a cron schedule, starting with an immediate run
///
/// Only a parse failure returns; individual run failures are logged
/// and the loop keeps going, since the next run is self-healing.
pub async fn run_scheduled(
    config: &BackupConfig,
    factory: Arc<dyn SessionFactory>,
    expr: &str,
) -> BackupResult<()> {
    config.validate()?;
    let schedule = parse_schedule(expr)?;
    info!("Using schedule: {}", expr);

    info!("Starting initial backup immediately");
    run_and_log(config, factory.clone()).await;

    loop {
        let next = schedule.upcoming(Local).next().ok_or_else(|| {
            BackupError::Schedule(format!("schedule '{}' yields no future runs", expr))
        })?;
        info!("Next scheduled backup at {}", next.to_rfc2822());

        let wait = (next - Local::now()).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;

        info!("Starting scheduled backup");
        run_and_log(config, factory.clone()).await;
    }
}

async fn run_and_log(config: &BackupConfig, factory: Arc<dyn SessionFactory>) {
    match run_backup(config, factory).await {
        Ok(report) => info!(
            "Scheduled run stored {} messages in {:.1}s",
            report.downloaded,
            report.elapsed.as_secs_f64()
        ),
        Err(e) => error!("Backup run failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};

    #[test]
    fn test_five_field_expression_parses() {
        assert!(parse_schedule("*/5 * * * *").is_ok());
        assert!(parse_schedule("0 3 * * 1").is_ok());
        assert!(parse_schedule("  30 2 * * *  ").is_ok());
    }

    #[test]
    fn test_invalid_expression_is_rejected() {
        assert!(matches!(
            parse_schedule("not a schedule"),
            Err(BackupError::Schedule(_))
        ));
        assert!(matches!(
            parse_schedule("* * *"),
            Err(BackupError::Schedule(_))
        ));
    }

    #[test]
    fn test_upcoming_tick_is_in_the_future() {
        let schedule = parse_schedule("*/5 * * * *").unwrap();
        let next = schedule.upcoming(Utc).next().unwrap();
        assert!(next > Utc::now());
        assert!(next <= Utc::now() + ChronoDuration::minutes(5));
        assert_eq!(next.timestamp() % 300, 0);
    }
}
