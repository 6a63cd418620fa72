use std::str::FromStr;
use std::time::Duration;

use cron::Schedule;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::infrastructure::storage::s3::StorageService;
use crate::state::AppState;

/// Deletes rendered videos older than the retention window on a cron
/// schedule.
pub async fn run_storage_sweeper(state: AppState) {
    let Some(storage) = state.storage.clone() else {
        warn!("Storage not configured; sweeper is idle");
        return;
    };

    let schedule = match Schedule::from_str(&state.config.cleanup_schedule) {
        Ok(schedule) => schedule,
        Err(e) => {
            error!(
                "Invalid cleanup schedule '{}': {}",
                state.config.cleanup_schedule, e
            );
            return;
        }
    };

    info!(
        "🧹 Storage sweeper scheduled ('{}', retention {} days)",
        state.config.cleanup_schedule, state.config.media_retention_days
    );

    loop {
        let Some(next) = schedule.upcoming(chrono::Utc).next() else {
            warn!("Cleanup schedule has no upcoming runs; sweeper stopping");
            return;
        };
        let wait = (next - chrono::Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = state.shutdown.cancelled() => return,
        }

        sweep(&storage, state.config.media_retention_days).await;
    }
}

async fn sweep(storage: &StorageService, retention_days: i64) {
    let cutoff = OffsetDateTime::now_utc() - time::Duration::days(retention_days);
    info!("Sweeping rendered videos older than {}", cutoff);

    let keys = match storage.list_keys_modified_before(cutoff).await {
        Ok(keys) => keys,
        Err(e) => {
            error!("Failed to list expired videos: {}", e);
            return;
        }
    };

    if keys.is_empty() {
        info!("No expired videos to sweep");
        return;
    }

    match storage.delete_objects(&keys).await {
        Ok(deleted) => info!("Swept {} expired video(s)", deleted),
        Err(e) => error!("Failed to delete expired videos: {}", e),
    }
}
