use crate::app::AppState;
use crate::config::Config;
use crate::consistency;
use crate::quality;
use anyhow::Result;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

/// Korea Standard Time is UTC+9, no daylight saving.
const KST_OFFSET_HOURS: u8 = 9;

/// Initialize and start the scheduler
pub async fn start_scheduler(config: Arc<Config>, state: AppState) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    // Create scheduled jobs for each time in schedule_times
    for time in &config.schedule_times {
        let cron_expr = time_to_cron(time)?;
        info!("Scheduling pipeline run for {} KST (cron: {})", time, cron_expr);

        let state_clone = state.clone();

        let job = Job::new_async(cron_expr.as_str(), move |_uuid, _l| {
            let state = state_clone.clone();

            Box::pin(async move {
                info!("⏰ Scheduled pipeline run triggered");
                if let Err(e) = run_pipeline_job(&state).await {
                    error!("Scheduled pipeline run failed: {}", e);
                }
            })
        })?;

        scheduler.add(job).await?;
    }

    scheduler.start().await?;
    info!("✓ Scheduler started");

    Ok(scheduler)
}

/// Convert time string (HH:MM, Korea time) to a daily UTC cron expression
fn time_to_cron(time: &str) -> Result<String> {
    let parts: Vec<&str> = time.split(':').collect();
    if parts.len() != 2 {
        anyhow::bail!("Invalid time format: {}. Expected HH:MM", time);
    }

    let hour: u8 = parts[0].trim().parse()?;
    let minute: u8 = parts[1].trim().parse()?;
    if hour > 23 || minute > 59 {
        anyhow::bail!("Invalid time: {}. Hour must be 0-23 and minute 0-59", time);
    }

    // For example: 03:00 KST = 18:00 UTC the previous day
    let utc_hour = (hour + 24 - KST_OFFSET_HOURS) % 24;

    // Cron format: "second minute hour day month day_of_week"
    Ok(format!("0 {} {} * * *", minute, utc_hour))
}

/// Translate missing tip variants, then bring thumbnails back in line and log
/// the quality scan.
pub async fn run_pipeline_job(state: &AppState) -> Result<()> {
    info!("Starting pipeline run");

    let summary = state.orchestrator().run_all().await?;
    info!(
        "Tips: {} variants created, {} failures",
        summary.variants_created,
        summary.failure_count()
    );

    let assets = consistency::unify_thumbnails(state.store()).await?;
    info!("Assets: {} thumbnail(s) updated", assets.changes.len());

    let report = quality::scan(state.store()).await?;
    info!("Quality: {} flag(s)", report.flags.len());

    info!("✓ Pipeline run completed successfully");
    Ok(())
}
