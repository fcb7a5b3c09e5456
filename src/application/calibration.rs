//! Calibration feedback derived from resolved forecasts.
//!
//! The output is free text consumed verbatim by the blind estimator;
//! nothing downstream parses it.

use std::sync::Arc;

use crate::domain::performance::{CalibrationBucket, PerformanceRecord};
use crate::error::Result;
use crate::port::outbound::store::{PerformanceStore, Store};

/// Minimum resolved forecasts before feedback is produced.
const MIN_SAMPLES: usize = 5;

/// Minimum bucket size before a bias line is emitted.
const MIN_BUCKET_SAMPLES: usize = 3;

fn brier_label(avg: f64) -> &'static str {
    if avg <= 0.1 {
        "Excellent"
    } else if avg <= 0.15 {
        "Good"
    } else if avg <= 0.2 {
        "Fair"
    } else {
        "Needs improvement"
    }
}

fn bias_label(diff: f64) -> &'static str {
    if diff > 0.05 {
        "overconfident"
    } else if diff < -0.05 {
        "underconfident"
    } else {
        "well-calibrated"
    }
}

/// Build the calibration feedback text from performance rows, or
/// `None` with fewer than [`MIN_SAMPLES`] resolved forecasts.
#[must_use]
pub fn build_feedback(records: &[PerformanceRecord]) -> Option<String> {
    if records.len() < MIN_SAMPLES {
        return None;
    }

    let total = records.len();
    let correct = records
        .iter()
        .filter(|r| r.directionally_correct())
        .count();
    let accuracy = correct as f64 / total as f64;
    let avg_brier =
        records.iter().map(|r| r.brier_score).sum::<f64>() / total as f64;

    let yes_predictions = records.iter().filter(|r| r.ai_probability >= 0.5).count();
    let yes_outcomes = records.iter().filter(|r| r.actual_outcome).count();

    let mut lines = vec![
        format!("Total resolved predictions: {total}"),
        format!("Overall accuracy: {:.0}% ({correct}/{total})", accuracy * 100.0),
        format!(
            "Average Brier score: {avg_brier:.3} ({})",
            brier_label(avg_brier)
        ),
        format!(
            "Direction tendency: You predicted YES {yes_predictions}/{total} times, \
             actual YES outcomes: {yes_outcomes}/{total}"
        ),
    ];

    let buckets: [(&str, f64, f64); 3] = [
        ("low (10-40%)", 0.0, 0.4),
        ("mid (40-60%)", 0.4, 0.6),
        ("high (60-90%)", 0.6, 1.01),
    ];
    for (label, lo, hi) in buckets {
        let rows: Vec<&PerformanceRecord> = records
            .iter()
            .filter(|r| r.ai_probability >= lo && r.ai_probability < hi)
            .collect();
        if rows.len() < MIN_BUCKET_SAMPLES {
            continue;
        }
        let avg_pred =
            rows.iter().map(|r| r.ai_probability).sum::<f64>() / rows.len() as f64;
        let actual_freq = rows.iter().filter(|r| r.actual_outcome).count() as f64
            / rows.len() as f64;
        lines.push(format!(
            "Bucket {label}: predicted avg {:.0}%, actual {:.0}% — {}",
            avg_pred * 100.0,
            actual_freq * 100.0,
            bias_label(avg_pred - actual_freq)
        ));
    }

    Some(lines.join("\n"))
}

/// Ten-bin calibration curve over the given rows.
#[must_use]
pub fn calibration_buckets(records: &[PerformanceRecord]) -> Vec<CalibrationBucket> {
    let mut bins: Vec<Vec<&PerformanceRecord>> = vec![Vec::new(); 10];
    for record in records {
        let idx = ((record.ai_probability * 10.0) as usize).min(9);
        bins[idx].push(record);
    }

    bins.iter()
        .enumerate()
        .filter(|(_, rows)| !rows.is_empty())
        .map(|(i, rows)| {
            let count = rows.len();
            let predicted_avg =
                rows.iter().map(|r| r.ai_probability).sum::<f64>() / count as f64;
            let actual_frequency =
                rows.iter().filter(|r| r.actual_outcome).count() as f64 / count as f64;
            CalibrationBucket {
                bucket_min: i as f64 / 10.0,
                bucket_max: (i + 1) as f64 / 10.0,
                predicted_avg: (predicted_avg * 10_000.0).round() / 10_000.0,
                actual_frequency: (actual_frequency * 10_000.0).round() / 10_000.0,
                count,
            }
        })
        .collect()
}

/// Load feedback for the estimator, optionally category-scoped.
pub async fn feedback_for_category(
    store: &Arc<dyn Store + Send + Sync>,
    category: Option<&str>,
) -> Result<Option<String>> {
    let records = store.performance_records(category).await?;
    Ok(build_feedback(&records))
}
