//! In-process scan progress tracking.
//!
//! One scan runs at a time; `try_start` is the single-flight gate.
//! Readers get snapshot copies, never references into the live state.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Phase of the scan state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Fetching,
    Researching,
    Complete,
    Failed,
}

impl ScanPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Researching => "researching",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

/// Per-market outcome fed back into the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketOutcome {
    Skipped,
    Researched,
    Recommended,
    Errored,
}

#[derive(Debug, Clone)]
struct ProgressState {
    is_running: bool,
    phase: ScanPhase,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    markets_found: usize,
    markets_total: usize,
    markets_processed: usize,
    markets_researched: usize,
    markets_skipped: usize,
    recommendations_created: usize,
    current_market: Option<String>,
    error: Option<String>,
}

impl Default for ProgressState {
    fn default() -> Self {
        Self {
            is_running: false,
            phase: ScanPhase::Idle,
            started_at: None,
            completed_at: None,
            markets_found: 0,
            markets_total: 0,
            markets_processed: 0,
            markets_researched: 0,
            markets_skipped: 0,
            recommendations_created: 0,
            current_market: None,
            error: None,
        }
    }
}

/// Read-only snapshot with derived timing fields.
#[derive(Debug, Clone)]
pub struct ProgressSnapshot {
    pub is_running: bool,
    pub phase: ScanPhase,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub markets_found: usize,
    pub markets_total: usize,
    pub markets_processed: usize,
    pub markets_researched: usize,
    pub markets_skipped: usize,
    pub recommendations_created: usize,
    pub current_market: Option<String>,
    pub error: Option<String>,
    pub elapsed_seconds: Option<f64>,
    pub estimated_remaining_seconds: Option<f64>,
}

/// Summary of the most recent completed scan.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    pub scan_id: String,
    pub markets_found: usize,
    pub markets_researched: usize,
    pub recommendations_created: usize,
    pub trades_placed: usize,
    pub duration_seconds: f64,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Process-wide scan progress tracker.
#[derive(Default)]
pub struct ScanProgress {
    state: Mutex<ProgressState>,
    last_summary: Mutex<Option<ScanSummary>>,
}

impl ScanProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically claim the single scan slot. Returns false when a
    /// scan is already running (the caller reports busy).
    pub fn try_start(&self) -> bool {
        let mut state = self.state.lock();
        if state.is_running {
            return false;
        }
        *state = ProgressState {
            is_running: true,
            phase: ScanPhase::Fetching,
            started_at: Some(Utc::now()),
            ..ProgressState::default()
        };
        true
    }

    /// Record fetch results and move to the researching phase.
    pub fn set_markets_found(&self, from_api: usize, after_filter: usize) {
        let mut state = self.state.lock();
        state.markets_found = from_api;
        state.markets_total = after_filter;
        state.phase = ScanPhase::Researching;
    }

    pub fn market_processing(&self, question: &str) {
        let mut state = self.state.lock();
        state.current_market = Some(question.chars().take(80).collect());
    }

    pub fn market_done(&self, outcome: MarketOutcome) {
        let mut state = self.state.lock();
        state.markets_processed += 1;
        state.current_market = None;
        match outcome {
            MarketOutcome::Skipped => state.markets_skipped += 1,
            MarketOutcome::Researched => state.markets_researched += 1,
            MarketOutcome::Recommended => {
                state.markets_researched += 1;
                state.recommendations_created += 1;
            }
            MarketOutcome::Errored => {}
        }
    }

    /// Update counters while a batch job is in flight.
    pub fn batch_status(&self, total: usize, completed: usize) {
        let mut state = self.state.lock();
        state.phase = ScanPhase::Researching;
        state.current_market = Some(format!("Batch processing... ({completed}/{total} done)"));
        state.markets_processed = completed;
    }

    pub fn complete(&self) {
        let mut state = self.state.lock();
        state.is_running = false;
        state.phase = ScanPhase::Complete;
        state.completed_at = Some(Utc::now());
        state.current_market = None;
    }

    pub fn fail(&self, error: &str) {
        let mut state = self.state.lock();
        state.is_running = false;
        state.phase = ScanPhase::Failed;
        state.completed_at = Some(Utc::now());
        state.error = Some(error.to_string());
        state.current_market = None;
    }

    /// Clear a scan left running by a crashed process. Returns true
    /// when a stale scan was reset.
    pub fn reset_stale(&self, max_age_minutes: i64) -> bool {
        let mut state = self.state.lock();
        if !state.is_running {
            return false;
        }
        match state.started_at {
            Some(started) if Utc::now() - started <= Duration::minutes(max_age_minutes) => {
                false
            }
            _ => {
                state.is_running = false;
                state.phase = ScanPhase::Failed;
                state.error = Some("scan timed out after restart".to_string());
                state.completed_at = Some(Utc::now());
                state.current_market = None;
                true
            }
        }
    }

    /// Snapshot copy with elapsed/ETA derived from the counters.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.state.lock().clone();
        let elapsed_seconds = state.started_at.map(|started| {
            let end = state.completed_at.unwrap_or_else(Utc::now);
            (end - started).num_milliseconds() as f64 / 1000.0
        });
        let estimated_remaining_seconds = match (elapsed_seconds, state.is_running) {
            (Some(elapsed), true)
                if state.markets_processed > 0
                    && state.markets_total > state.markets_processed =>
            {
                let per_market = elapsed / state.markets_processed as f64;
                Some(per_market * (state.markets_total - state.markets_processed) as f64)
            }
            _ => None,
        };

        ProgressSnapshot {
            is_running: state.is_running,
            phase: state.phase,
            started_at: state.started_at,
            completed_at: state.completed_at,
            markets_found: state.markets_found,
            markets_total: state.markets_total,
            markets_processed: state.markets_processed,
            markets_researched: state.markets_researched,
            markets_skipped: state.markets_skipped,
            recommendations_created: state.recommendations_created,
            current_market: state.current_market,
            error: state.error,
            elapsed_seconds,
            estimated_remaining_seconds,
        }
    }

    pub fn save_summary(&self, summary: ScanSummary) {
        *self.last_summary.lock() = Some(summary);
    }

    #[must_use]
    pub fn last_summary(&self) -> Option<ScanSummary> {
        self.last_summary.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_flight() {
        let progress = ScanProgress::new();
        assert!(progress.try_start());
        // Second start while running is rejected.
        assert!(!progress.try_start());
        progress.complete();
        assert!(progress.try_start());
    }

    #[test]
    fn counters_accumulate() {
        let progress = ScanProgress::new();
        progress.try_start();
        progress.set_markets_found(30, 20);
        progress.market_done(MarketOutcome::Skipped);
        progress.market_done(MarketOutcome::Researched);
        progress.market_done(MarketOutcome::Recommended);
        progress.market_done(MarketOutcome::Errored);

        let snap = progress.snapshot();
        assert_eq!(snap.markets_found, 30);
        assert_eq!(snap.markets_total, 20);
        assert_eq!(snap.markets_processed, 4);
        assert_eq!(snap.markets_skipped, 1);
        assert_eq!(snap.markets_researched, 2);
        assert_eq!(snap.recommendations_created, 1);
        assert_eq!(snap.phase, ScanPhase::Researching);
    }

    #[test]
    fn fail_records_error_and_releases_slot() {
        let progress = ScanProgress::new();
        progress.try_start();
        progress.fail("venue unreachable");
        let snap = progress.snapshot();
        assert!(!snap.is_running);
        assert_eq!(snap.phase, ScanPhase::Failed);
        assert_eq!(snap.error.as_deref(), Some("venue unreachable"));
        assert!(progress.try_start());
    }

    #[test]
    fn stale_reset_only_after_threshold() {
        let progress = ScanProgress::new();
        progress.try_start();
        // Fresh scan: not stale.
        assert!(!progress.reset_stale(120));
        assert!(progress.snapshot().is_running);

        // Backdate the start past the threshold.
        progress.state.lock().started_at = Some(Utc::now() - Duration::minutes(180));
        assert!(progress.reset_stale(120));
        let snap = progress.snapshot();
        assert!(!snap.is_running);
        assert_eq!(snap.phase, ScanPhase::Failed);
    }

    #[test]
    fn stale_reset_noop_when_idle() {
        let progress = ScanProgress::new();
        assert!(!progress.reset_stale(120));
    }

    #[test]
    fn eta_derived_from_throughput() {
        let progress = ScanProgress::new();
        progress.try_start();
        progress.set_markets_found(10, 10);
        for _ in 0..5 {
            progress.market_done(MarketOutcome::Researched);
        }
        // Backdate so elapsed is measurable.
        progress.state.lock().started_at = Some(Utc::now() - Duration::seconds(10));
        let snap = progress.snapshot();
        let eta = snap.estimated_remaining_seconds.unwrap();
        // 5 done in ~10s, 5 remaining: ~10s left.
        assert!((eta - 10.0).abs() < 1.5, "eta={eta}");
    }

    #[test]
    fn summary_roundtrip() {
        let progress = ScanProgress::new();
        assert!(progress.last_summary().is_none());
        progress.save_summary(ScanSummary {
            scan_id: "s1".to_string(),
            markets_found: 10,
            ..ScanSummary::default()
        });
        assert_eq!(progress.last_summary().unwrap().markets_found, 10);
    }
}
