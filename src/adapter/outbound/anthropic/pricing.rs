//! Per-model price table and cost accounting.

/// USD per million tokens, (input, output).
fn model_rates(model: &str) -> (f64, f64) {
    if model.contains("opus") {
        (15.0, 75.0)
    } else if model.contains("haiku") {
        (1.0, 5.0)
    } else {
        // Sonnet-class default; also the fallback for unknown ids.
        (3.0, 15.0)
    }
}

/// Batch-tier token discount (half price).
const BATCH_DISCOUNT: f64 = 0.5;

/// Estimated cost in USD for one call, rounded to 6 decimals.
#[must_use]
pub fn estimate_cost(model: &str, input_tokens: u64, output_tokens: u64, batch: bool) -> f64 {
    let (input_rate, output_rate) = model_rates(model);
    let mut cost = (input_tokens as f64 * input_rate + output_tokens as f64 * output_rate)
        / 1_000_000.0;
    if batch {
        cost *= BATCH_DISCOUNT;
    }
    (cost * 1_000_000.0).round() / 1_000_000.0
}
