//! EV calculation, Kelly sizing, and performance metrics.
//!
//! Pure math: no I/O, no database access. Every function is
//! deterministic given its inputs.

use crate::domain::estimate::Confidence;
use crate::domain::market::Venue;
use crate::domain::recommendation::Direction;

/// EV threshold for high-confidence estimates.
const EV_THRESHOLD_HIGH: f64 = 0.05;
/// EV threshold for medium-confidence estimates.
const EV_THRESHOLD_MEDIUM: f64 = 0.08;
/// Near-coin-flip estimates need this much EV regardless of confidence.
const EV_THRESHOLD_WEAK: f64 = 0.12;
/// Probability band treated as a weak (near-coin-flip) estimate.
const WEAK_BAND: (f64, f64) = (0.42, 0.58);

/// Better-direction result of an EV comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvResult {
    pub direction: Direction,
    /// Absolute edge: AI probability minus price, signed by direction.
    pub edge: f64,
    /// Edge minus the venue fee on the entered side.
    pub ev: f64,
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Trading fee for the given venue at the given entry price.
///
/// The primary venue charges `0.07 * price * (1 - price)`: highest at
/// 50/50 (1.75%), shrinking toward the extremes.
#[must_use]
pub fn venue_fee(venue: Venue, entry_price: f64) -> f64 {
    match venue {
        Venue::Kalshi => 0.07 * entry_price * (1.0 - entry_price),
    }
}

/// Compare the AI estimate to the market price and return the better
/// positive-EV direction, or `None` if neither side clears zero after
/// fees.
///
/// The YES fee is computed at the YES entry price; the NO fee at the
/// NO entry price (`1 - price_yes`).
#[must_use]
pub fn calculate_ev(ai_probability: f64, market_price: f64, venue: Venue) -> Option<EvResult> {
    let yes_edge = ai_probability - market_price;
    let yes_ev = yes_edge - venue_fee(venue, market_price);

    let no_edge = market_price - ai_probability;
    let no_ev = no_edge - venue_fee(venue, 1.0 - market_price);

    if yes_ev > 0.0 && yes_ev >= no_ev {
        return Some(EvResult {
            direction: Direction::Yes,
            edge: round4(yes_edge),
            ev: round4(yes_ev),
        });
    }

    if no_ev > 0.0 {
        return Some(EvResult {
            direction: Direction::No,
            edge: round4(no_edge),
            ev: round4(no_ev),
        });
    }

    None
}

/// Recommended bet size as a fraction of bankroll.
///
/// Full Kelly is `edge / (1 - price)` for YES and `edge / price` for
/// NO, scaled by the fractional-Kelly multiplier and the confidence
/// multiplier, floored at 0 and capped at `max_bet_fraction`.
/// Zero denominators yield 0.
#[must_use]
pub fn calculate_kelly(
    edge: f64,
    market_price: f64,
    direction: Direction,
    confidence: Confidence,
    kelly_fraction: f64,
    max_bet_fraction: f64,
) -> f64 {
    let full_kelly = match direction {
        Direction::Yes => {
            let denominator = 1.0 - market_price;
            if denominator <= 0.0 {
                return 0.0;
            }
            edge / denominator
        }
        Direction::No => {
            if market_price <= 0.0 {
                return 0.0;
            }
            edge / market_price
        }
    };

    let adjusted = full_kelly * kelly_fraction * confidence.multiplier();
    round4(adjusted.clamp(0.0, max_bet_fraction))
}

/// Brier score of a single forecast. Lower is better; 0 is perfect.
#[must_use]
pub fn brier_score(probability: f64, outcome: bool) -> f64 {
    let outcome_val = if outcome { 1.0 } else { 0.0 };
    round4((probability - outcome_val).powi(2))
}

/// Profit or loss for a resolved binary-option bet, in dollars.
///
/// Standard binary payout: a winning YES wager of `w` at price `p`
/// returns `w * (1 - p) / p`; a winning NO wager returns
/// `w * p / (1 - p)`; a loss forfeits the wager. Fees are subtracted
/// by the caller from the trade's recorded `fees_paid`.
#[must_use]
pub fn calculate_pnl(
    entry_price_yes: f64,
    direction: Direction,
    outcome: bool,
    kelly_fraction_used: f64,
    bankroll: f64,
) -> f64 {
    let wager = kelly_fraction_used * bankroll;

    let pnl = match direction {
        Direction::Yes => {
            if outcome {
                if entry_price_yes <= 0.0 {
                    return 0.0;
                }
                wager * (1.0 - entry_price_yes) / entry_price_yes
            } else {
                -wager
            }
        }
        Direction::No => {
            if outcome {
                -wager
            } else {
                let no_price = 1.0 - entry_price_yes;
                if no_price <= 0.0 {
                    return 0.0;
                }
                wager * entry_price_yes / no_price
            }
        }
    };

    round4(pnl)
}

/// Realized P&L for a closed position of `amount` dollars entered at
/// `entry_price` (the price of the side actually bought).
#[must_use]
pub fn position_pnl(entry_price: f64, amount: f64, won: bool, fees_paid: f64) -> f64 {
    if won {
        if entry_price <= 0.0 {
            return round4(-fees_paid);
        }
        round4(amount * (1.0 - entry_price) / entry_price - fees_paid)
    } else {
        round4(-amount - fees_paid)
    }
}

/// Decide whether the expected value clears the recommendation gate.
///
/// The weak-estimate filter applies first: probabilities in
/// [0.42, 0.58] need EV >= 12% regardless of confidence. Otherwise the
/// gate is confidence-based (low: never; medium: 8%; high: 5%). With
/// no confidence available, a flat `min_edge` threshold applies.
#[must_use]
pub fn should_recommend(
    ev: f64,
    confidence: Option<Confidence>,
    ai_probability: Option<f64>,
    min_edge: f64,
) -> bool {
    if let Some(p) = ai_probability {
        if (WEAK_BAND.0..=WEAK_BAND.1).contains(&p) {
            return ev >= EV_THRESHOLD_WEAK;
        }
    }

    match confidence {
        Some(Confidence::Low) => false,
        Some(Confidence::Medium) => ev >= EV_THRESHOLD_MEDIUM,
        Some(Confidence::High) => ev >= EV_THRESHOLD_HIGH,
        None => ev >= min_edge,
    }
}
