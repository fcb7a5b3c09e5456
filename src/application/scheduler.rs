//! Single-process job scheduler.
//!
//! Runs the recurring jobs: `full_scan` at configured exchange-local
//! hours, interval-triggered `price_check`, `resolution_check`, and
//! `trade_sync`, and a fixed-time `daily_digest`. Each job owns its
//! loop task, so a job never overlaps itself; the scan additionally
//! holds the process-wide single-flight gate. Schedules are recomputed
//! from the merged config at every arm, so config writes reschedule at
//! the next boundary. A failed run is logged and alerted, and the
//! scheduler keeps running. Missed fires are not backfilled, and
//! shutdown does not wait for in-flight jobs.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::application::config::ConfigResolver;
use crate::application::reconciler::TradeReconciler;
use crate::application::scanner::{EstimateMode, Scanner};
use crate::domain::trade::dollars;
use crate::error::Error;
use crate::port::outbound::notifier::{DigestReport, Notifier};
use crate::port::outbound::store::{
    PerformanceStore, RecommendationStore, Store, TradeStore,
};

/// Exchange-local timezone for cron hours.
pub const SCAN_TIMEZONE: Tz = chrono_tz::America::New_York;

/// Poll interval while a job is disabled by config.
const DISABLED_RECHECK: StdDuration = StdDuration::from_secs(300);

/// Everything the jobs need.
#[derive(Clone)]
pub struct SchedulerDeps {
    pub scanner: Scanner,
    pub reconciler: Arc<TradeReconciler>,
    pub config: ConfigResolver,
    pub notifier: Arc<dyn Notifier>,
    pub store: Arc<dyn Store + Send + Sync>,
}

/// Handle over the spawned job tasks.
pub struct Scheduler {
    tasks: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl Scheduler {
    /// Spawn all job loops.
    #[must_use]
    pub fn start(deps: SchedulerDeps) -> Self {
        let (shutdown, _) = watch::channel(false);
        let tasks = vec![
            tokio::spawn(full_scan_loop(deps.clone(), shutdown.subscribe())),
            tokio::spawn(price_check_loop(deps.clone(), shutdown.subscribe())),
            tokio::spawn(resolution_check_loop(deps.clone(), shutdown.subscribe())),
            tokio::spawn(trade_sync_loop(deps.clone(), shutdown.subscribe())),
            tokio::spawn(daily_digest_loop(deps, shutdown.subscribe())),
        ];
        info!("scheduler started");
        Self { tasks, shutdown }
    }

    /// Stop all jobs without waiting for in-flight runs.
    pub fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            task.abort();
        }
        info!("scheduler stopped");
    }
}

/// Next occurrence of any of `hours` (local o'clock) strictly after
/// `now`. Returns `None` when no valid hour is configured.
#[must_use]
pub fn next_scan_time(now: DateTime<Utc>, hours: &[u32], tz: Tz) -> Option<DateTime<Utc>> {
    let mut valid: Vec<u32> = hours.iter().copied().filter(|h| *h < 24).collect();
    if valid.is_empty() {
        return None;
    }
    valid.sort_unstable();
    valid.dedup();

    let local_now = now.with_timezone(&tz);
    for day_offset in 0..=1 {
        let date = (local_now + Duration::days(day_offset)).date_naive();
        for &hour in &valid {
            let Some(naive) = date.and_hms_opt(hour, 0, 0) else {
                continue;
            };
            // DST gaps make some local times nonexistent; skip them.
            let Some(candidate) = tz.from_local_datetime(&naive).earliest() else {
                continue;
            };
            let candidate = candidate.with_timezone(&Utc);
            if candidate > now {
                return Some(candidate);
            }
        }
    }
    None
}

async fn sleep_until(target: DateTime<Utc>, shutdown: &mut watch::Receiver<bool>) -> bool {
    let wait = (target - Utc::now())
        .to_std()
        .unwrap_or(StdDuration::from_secs(0));
    tokio::select! {
        _ = tokio::time::sleep(wait) => true,
        _ = shutdown.changed() => false,
    }
}

async fn interval_sleep(hours: u64, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(StdDuration::from_secs(hours.max(1) * 3600)) => true,
        _ = shutdown.changed() => false,
    }
}

async fn alert_failure(deps: &SchedulerDeps, job: &str, error: &Error) {
    error!(job, error = %error, "scheduled job failed");
    deps.notifier.job_failure(job, &error.to_string()).await;
}

async fn full_scan_loop(deps: SchedulerDeps, mut shutdown: watch::Receiver<bool>) {
    loop {
        let config = deps.config.load().await;
        let Some(next) = next_scan_time(Utc::now(), &config.scan_hours, SCAN_TIMEZONE) else {
            warn!("no valid scan hours configured, rechecking later");
            if !interval_sleep(1, &mut shutdown).await {
                return;
            }
            continue;
        };
        info!(next = %next, "full scan scheduled");
        if !sleep_until(next, &mut shutdown).await {
            return;
        }

        match deps.scanner.execute_scan(EstimateMode::Sync).await {
            Ok(outcome) => info!(
                found = outcome.markets_found,
                researched = outcome.markets_researched,
                recommended = outcome.recommendations_created,
                "scheduled scan completed"
            ),
            // Single-flight: a manual scan is already running.
            Err(Error::ScanInProgress) => {
                warn!("scheduled scan skipped, another scan is running");
            }
            Err(e) => alert_failure(&deps, "full_scan", &e).await,
        }
    }
}

async fn price_check_loop(deps: SchedulerDeps, mut shutdown: watch::Receiver<bool>) {
    loop {
        let config = deps.config.load().await;
        if !config.price_check_enabled {
            tokio::select! {
                _ = tokio::time::sleep(DISABLED_RECHECK) => continue,
                _ = shutdown.changed() => return,
            }
        }
        if !interval_sleep(config.price_check_interval_hours, &mut shutdown).await {
            return;
        }
        match deps.scanner.reestimate_moved().await {
            Ok(count) => info!(re_estimated = count, "price check completed"),
            Err(e) => alert_failure(&deps, "price_check", &e).await,
        }
    }
}

async fn resolution_check_loop(deps: SchedulerDeps, mut shutdown: watch::Receiver<bool>) {
    loop {
        let config = deps.config.load().await;
        if !config.resolution_check_enabled {
            tokio::select! {
                _ = tokio::time::sleep(DISABLED_RECHECK) => continue,
                _ = shutdown.changed() => return,
            }
        }
        if !interval_sleep(config.resolution_check_interval_hours, &mut shutdown).await {
            return;
        }
        match deps.scanner.check_resolutions().await {
            Ok(outcome) => info!(
                checked = outcome.markets_checked,
                resolved = outcome.markets_resolved,
                cancelled = outcome.markets_cancelled,
                "resolution check completed"
            ),
            Err(e) => alert_failure(&deps, "resolution_check", &e).await,
        }
    }
}

async fn trade_sync_loop(deps: SchedulerDeps, mut shutdown: watch::Receiver<bool>) {
    loop {
        let config = deps.config.load().await;
        if !config.trade_sync_enabled {
            tokio::select! {
                _ = tokio::time::sleep(DISABLED_RECHECK) => continue,
                _ = shutdown.changed() => return,
            }
        }
        if !interval_sleep(config.trade_sync_interval_hours, &mut shutdown).await {
            return;
        }
        match deps.reconciler.sync_all().await {
            Ok(counts) => info!(
                created = counts.trades_created,
                updated = counts.trades_updated,
                "trade sync completed"
            ),
            Err(e) => alert_failure(&deps, "trade_sync", &e).await,
        }
    }
}

async fn daily_digest_loop(deps: SchedulerDeps, mut shutdown: watch::Receiver<bool>) {
    loop {
        let config = deps.config.load().await;
        if !config.daily_digest_enabled {
            tokio::select! {
                _ = tokio::time::sleep(DISABLED_RECHECK) => continue,
                _ = shutdown.changed() => return,
            }
        }
        let Some(next) =
            next_scan_time(Utc::now(), &[config.daily_digest_hour], SCAN_TIMEZONE)
        else {
            if !interval_sleep(1, &mut shutdown).await {
                return;
            }
            continue;
        };
        if !sleep_until(next, &mut shutdown).await {
            return;
        }
        match build_digest(&deps).await {
            Ok(digest) => {
                deps.notifier.daily_digest(&digest).await;
                info!("daily digest sent");
            }
            Err(e) => alert_failure(&deps, "daily_digest", &e).await,
        }
    }
}

async fn build_digest(deps: &SchedulerDeps) -> crate::error::Result<DigestReport> {
    let config = deps.config.load().await;
    let open = deps.store.open_trades().await?;
    let exposure = deps.store.total_open_exposure().await?;
    let active = deps.store.active_recommendations().await?;

    let today = Utc::now().date_naive();
    let records = deps.store.performance_records(None).await?;
    let resolved_today: Vec<_> = records
        .iter()
        .filter(|r| r.resolved_at.date_naive() == today)
        .collect();
    let pnl_today = resolved_today.iter().filter_map(|r| r.pnl).sum();

    Ok(DigestReport {
        open_positions: open.len(),
        total_exposure: exposure,
        bankroll: dollars(config.bankroll),
        resolved_today: resolved_today.len(),
        pnl_today,
        active_recommendations: active.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_scan_time_picks_first_future_hour() {
        // 2026-06-15 10:30 Eastern = 14:30 UTC (EDT).
        let now = Utc.with_ymd_and_hms(2026, 6, 15, 14, 30, 0).unwrap();
        let next = next_scan_time(now, &[8, 14], SCAN_TIMEZONE).unwrap();
        // Next arm: 14:00 local = 18:00 UTC same day.
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 6, 15, 18, 0, 0).unwrap());
    }

    #[test]
    fn next_scan_time_rolls_to_tomorrow() {
        // 2026-06-15 20:00 Eastern = 00:00 UTC the 16th.
        let now = Utc.with_ymd_and_hms(2026, 6, 16, 0, 0, 0).unwrap();
        let next = next_scan_time(now, &[8, 14], SCAN_TIMEZONE).unwrap();
        // 08:00 local on the 16th = 12:00 UTC.
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 6, 16, 12, 0, 0).unwrap());
    }

    #[test]
    fn next_scan_time_ignores_invalid_hours() {
        let now = Utc.with_ymd_and_hms(2026, 6, 15, 0, 0, 0).unwrap();
        assert!(next_scan_time(now, &[24, 99], SCAN_TIMEZONE).is_none());
        assert!(next_scan_time(now, &[], SCAN_TIMEZONE).is_none());
        assert!(next_scan_time(now, &[25, 8], SCAN_TIMEZONE).is_some());
    }

    #[test]
    fn next_scan_time_is_strictly_future() {
        // Exactly at an arm: the same hour must not fire again.
        let now = Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap(); // 08:00 EDT
        let next = next_scan_time(now, &[8], SCAN_TIMEZONE).unwrap();
        assert!(next > now);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 6, 16, 12, 0, 0).unwrap());
    }
}
