//! Alert message formatting.

use chrono::Utc;

use crate::port::outbound::notifier::{
    DigestReport, RecommendationAlert, ResolutionAlert, ScanStats, TradeAlert,
};

fn bet_label(alert: &RecommendationAlert) -> String {
    match &alert.outcome_label {
        Some(label) => format!("Bet: {label}"),
        None => alert.direction.as_str().to_uppercase(),
    }
}

/// Plain-text block for one recommendation.
#[must_use]
pub fn recommendation_text(alert: &RecommendationAlert) -> String {
    format!(
        "  {}\n  {} | Edge: {:.1}% | EV: {:.1}%\n  AI: {:.0}% vs Market: {:.0}% | Kelly: {:.1}%",
        alert.question,
        bet_label(alert),
        alert.edge * 100.0,
        alert.ev * 100.0,
        alert.ai_probability * 100.0,
        alert.market_price * 100.0,
        alert.kelly_fraction * 100.0,
    )
}

/// Webhook markdown block for one recommendation, linking the market.
#[must_use]
pub fn recommendation_markdown(alert: &RecommendationAlert) -> String {
    let url = format!(
        "https://kalshi.com/markets/{}",
        alert.venue_id.to_lowercase()
    );
    format!(
        "*<{url}|{}>*\n{} | Edge: {:.1}% | EV: {:.1}%\nAI: {:.0}% vs Market: {:.0}% | Kelly: {:.1}%",
        alert.question,
        bet_label(alert),
        alert.edge * 100.0,
        alert.ev * 100.0,
        alert.ai_probability * 100.0,
        alert.market_price * 100.0,
        alert.kelly_fraction * 100.0,
    )
}

/// Email subject + plain-text + HTML for a scan-results alert.
#[must_use]
pub fn scan_email(
    recommendations: &[RecommendationAlert],
    stats: ScanStats,
) -> (String, String, String) {
    let now = Utc::now().format("%b %d, %H:%M UTC");
    let count = recommendations.len();
    let plural = if count == 1 { "" } else { "s" };
    let subject = format!("augur: {count} high-EV bet{plural} found ({now})");

    let blocks: Vec<String> = recommendations.iter().map(recommendation_text).collect();
    let text = format!(
        "augur scan completed at {now}\n\
         Markets found: {} | Researched: {} | Recommendations: {} | Duration: {:.0}s\n\n\
         --- High-EV Recommendations ---\n\n{}",
        stats.markets_found,
        stats.markets_researched,
        stats.recommendations_created,
        stats.duration_seconds,
        blocks.join("\n\n"),
    );

    let mut items = String::new();
    for alert in recommendations {
        let url = format!(
            "https://kalshi.com/markets/{}",
            alert.venue_id.to_lowercase()
        );
        items.push_str(&format!(
            "<div style=\"margin-bottom:16px;padding:12px;background:#1a1a1e;border-radius:8px\">\
             <div style=\"font-weight:600;margin-bottom:4px\">\
             <a href=\"{url}\" style=\"color:#A78BFA\">{}</a></div>\
             <div style=\"color:#a1a1aa;font-size:14px\">\
             {} &middot; Edge: {:.1}% &middot; EV: {:.1}%<br>\
             AI: {:.0}% vs Market: {:.0}% &middot; Kelly: {:.1}%</div></div>",
            alert.question,
            bet_label(alert),
            alert.edge * 100.0,
            alert.ev * 100.0,
            alert.ai_probability * 100.0,
            alert.market_price * 100.0,
            alert.kelly_fraction * 100.0,
        ));
    }
    let html = format!(
        "<div style=\"font-family:sans-serif;background:#0a0a0c;color:#fafafa;padding:24px\">\
         <h2 style=\"margin-top:0\">augur Scan Results</h2>\
         <p style=\"color:#a1a1aa\">Markets: {} found, {} researched, {} recommended ({:.0}s)</p>\
         {items}</div>",
        stats.markets_found,
        stats.markets_researched,
        stats.recommendations_created,
        stats.duration_seconds,
    );

    (subject, text, html)
}

/// Webhook text for a scan-results alert.
#[must_use]
pub fn scan_webhook_text(recommendations: &[RecommendationAlert], stats: ScanStats) -> String {
    let now = Utc::now().format("%b %d, %H:%M UTC");
    let count = recommendations.len();
    let plural = if count == 1 { "" } else { "s" };
    let blocks: Vec<String> = recommendations
        .iter()
        .map(recommendation_markdown)
        .collect();
    format!(
        ":chart_with_upwards_trend: *augur: {count} high-EV bet{plural} found*\n\
         _{now} | {} markets scanned, {} researched, {:.0}s_\n\n{}",
        stats.markets_found,
        stats.markets_researched,
        stats.duration_seconds,
        blocks.join("\n\n"),
    )
}

/// Text for sweep-placed orders (shared by both channels).
#[must_use]
pub fn sweep_text(trades: &[TradeAlert]) -> String {
    let lines: Vec<String> = trades
        .iter()
        .map(|t| {
            format!(
                "  {} — {} {} contracts at {}¢ (${})",
                t.question,
                t.direction.as_str().to_uppercase(),
                t.contracts,
                t.price_cents,
                t.amount,
            )
        })
        .collect();
    format!(
        "augur sweep placed {} order{}:\n{}",
        trades.len(),
        if trades.len() == 1 { "" } else { "s" },
        lines.join("\n"),
    )
}

/// Text for a resolution pass (shared by both channels).
#[must_use]
pub fn resolutions_text(resolved: &[ResolutionAlert]) -> String {
    let lines: Vec<String> = resolved
        .iter()
        .map(|r| {
            let outcome = if r.outcome { "YES" } else { "NO" };
            let pnl = r
                .pnl
                .map(|p| format!(" | P&L: ${p}"))
                .unwrap_or_default();
            format!(
                "  {} — resolved {outcome}{pnl} | Brier: {:.3}",
                r.question, r.brier_score
            )
        })
        .collect();
    format!(
        "augur: {} market{} resolved:\n{}",
        resolved.len(),
        if resolved.len() == 1 { "" } else { "s" },
        lines.join("\n"),
    )
}

/// Text for a job-failure alert.
#[must_use]
pub fn failure_text(job: &str, error: &str) -> String {
    format!(":rotating_light: augur job `{job}` failed: {error}")
}

/// Text for the daily digest.
#[must_use]
pub fn digest_text(digest: &DigestReport) -> String {
    format!(
        "augur daily digest\n\
         Open positions: {} (${} deployed)\n\
         Bankroll: ${}\n\
         Resolved today: {} (P&L ${})\n\
         Active recommendations: {}",
        digest.open_positions,
        digest.total_exposure,
        digest.bankroll,
        digest.resolved_today,
        digest.pnl_today,
        digest.active_recommendations,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::Direction;

    fn alert() -> RecommendationAlert {
        RecommendationAlert {
            question: "Will Detroit win?".to_string(),
            venue_id: "KXNBAGAME-26FEB19DETNYK-DET".to_string(),
            outcome_label: Some("Detroit".to_string()),
            direction: Direction::Yes,
            edge: 0.30,
            ev: 0.2832,
            ai_probability: 0.70,
            market_price: 0.40,
            kelly_fraction: 0.05,
        }
    }

    #[test]
    fn recommendation_text_uses_outcome_label() {
        let text = recommendation_text(&alert());
        assert!(text.contains("Bet: Detroit"));
        assert!(text.contains("Edge: 30.0%"));
        assert!(text.contains("EV: 28.3%"));
        assert!(text.contains("AI: 70% vs Market: 40%"));
    }

    #[test]
    fn recommendation_text_falls_back_to_direction() {
        let mut a = alert();
        a.outcome_label = None;
        assert!(recommendation_text(&a).contains("YES |"));
    }

    #[test]
    fn scan_email_subject_pluralizes() {
        let (one, _, _) = scan_email(&[alert()], ScanStats::default());
        assert!(one.contains("1 high-EV bet found"));
        let (two, _, _) = scan_email(&[alert(), alert()], ScanStats::default());
        assert!(two.contains("2 high-EV bets found"));
    }

    #[test]
    fn webhook_text_links_market() {
        let text = scan_webhook_text(&[alert()], ScanStats::default());
        assert!(text.contains("https://kalshi.com/markets/kxnbagame-26feb19detnyk-det"));
    }

    #[test]
    fn failure_text_names_job() {
        let text = failure_text("full_scan", "boom");
        assert!(text.contains("full_scan"));
        assert!(text.contains("boom"));
    }
}
