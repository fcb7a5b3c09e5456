//! Market category detection.
//!
//! Classification key is the series prefix: the first dash-segment of
//! the venue's event ticker. Prefix tables are matched longest-first
//! so `KXNBAGAME` wins over `KXNBA`. Title keywords and the "X vs Y"
//! pattern cover series the tables miss. A hard reject list beats
//! everything and keeps weather/crypto/awards markets out of the
//! sports and economics buckets.

/// Series-ticker prefixes mapped to sport labels. Longest prefixes
/// first within a shared stem.
const SPORT_PREFIXES: &[(&str, &str)] = &[
    ("KXNBAGAME", "NBA"),
    ("KXNBASERIES", "NBA"),
    ("KXNBA", "NBA"),
    ("KXNFLGAME", "NFL"),
    ("KXNFL", "NFL"),
    ("KXNCAAMBB", "NCAA Basketball"),
    ("KXNCAAWBB", "NCAA Basketball"),
    ("KXNCAAFB", "NCAA Football"),
    ("KXMLBGAME", "MLB"),
    ("KXMLB", "MLB"),
    ("KXNHLGAME", "NHL"),
    ("KXNHL", "NHL"),
    ("KXEPLGAME", "Soccer"),
    ("KXUCLGAME", "Soccer"),
    ("KXLALIGAGAME", "Soccer"),
    ("KXSERIEAGAME", "Soccer"),
    ("KXBUNDESGAME", "Soccer"),
    ("KXUFC", "MMA"),
    ("KXATPMATCH", "Tennis"),
    ("KXWTAMATCH", "Tennis"),
    ("KXTENNIS", "Tennis"),
    ("KXPGA", "Golf"),
    ("KXF1RACE", "Formula 1"),
];

/// Series-ticker prefixes mapped to economic indicator labels.
const ECON_PREFIXES: &[(&str, &str)] = &[
    ("KXGDPUS", "GDP"),
    ("KXGDP", "GDP"),
    ("KXCPICORE", "CPI"),
    ("KXCPIYOY", "CPI"),
    ("KXCPI", "CPI"),
    ("KXFEDDECISION", "Fed Rate"),
    ("KXFEDFUNDS", "Fed Rate"),
    ("KXFED", "Fed Rate"),
    ("KXPAYROLLS", "Unemployment"),
    ("KXUNRATE", "Unemployment"),
    ("KXU3", "Unemployment"),
    ("KXPCE", "PCE"),
    ("KXRECESSION", "Recession"),
];

/// Title keywords that force rejection from sports/economics buckets.
const HARD_REJECT_KEYWORDS: &[&str] = &[
    "weather",
    "temperature",
    "high temp",
    "rainfall",
    "snowfall",
    "bitcoin",
    "btc",
    "ethereum",
    "eth price",
    "dogecoin",
    "solana",
    "billboard",
    "grammy",
    "oscar",
    "emmy",
    "spotify",
    "box office",
];

/// Sport keywords for fallback matching in titles/subtitles.
const SPORT_KEYWORDS: &[(&str, &str)] = &[
    ("nba", "NBA"),
    ("nfl", "NFL"),
    ("ncaa basketball", "NCAA Basketball"),
    ("march madness", "NCAA Basketball"),
    ("mlb", "MLB"),
    ("nhl", "NHL"),
    ("premier league", "Soccer"),
    ("champions league", "Soccer"),
    ("la liga", "Soccer"),
    ("serie a", "Soccer"),
    ("bundesliga", "Soccer"),
    ("ufc", "MMA"),
    ("atp", "Tennis"),
    ("wta", "Tennis"),
    ("wimbledon", "Tennis"),
    ("grand prix", "Formula 1"),
];

/// Economic indicator keywords for fallback matching.
const ECON_KEYWORDS: &[(&str, &str)] = &[
    ("gdp", "GDP"),
    ("cpi", "CPI"),
    ("inflation", "CPI"),
    ("fed funds", "Fed Rate"),
    ("federal reserve", "Fed Rate"),
    ("rate cut", "Fed Rate"),
    ("rate hike", "Fed Rate"),
    ("unemployment", "Unemployment"),
    ("nonfarm payrolls", "Unemployment"),
    ("jobs report", "Unemployment"),
    ("recession", "Recession"),
];

/// Detected classification of a market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketCategory {
    Sport(String),
    Economics(String),
    Other,
}

impl MarketCategory {
    /// Label stored on the market row.
    #[must_use]
    pub fn label(&self) -> Option<String> {
        match self {
            Self::Sport(sport) => Some(sport.clone()),
            Self::Economics(indicator) => Some(indicator.clone()),
            Self::Other => None,
        }
    }

    /// Coarse bucket name used for category filters and the volume
    /// waiver ("sports" / "economics").
    #[must_use]
    pub fn bucket(&self) -> Option<&'static str> {
        match self {
            Self::Sport(_) => Some("sports"),
            Self::Economics(_) => Some("economics"),
            Self::Other => None,
        }
    }
}

/// First dash-segment of an event ticker, uppercased.
#[must_use]
pub fn series_prefix(event_ticker: &str) -> String {
    event_ticker
        .split('-')
        .next()
        .unwrap_or(event_ticker)
        .to_ascii_uppercase()
}

fn longest_prefix_match(prefix: &str, table: &[(&str, &str)]) -> Option<String> {
    table
        .iter()
        .filter(|(candidate, _)| prefix.starts_with(candidate))
        .max_by_key(|(candidate, _)| candidate.len())
        .map(|(_, label)| (*label).to_string())
}

fn hard_rejected(text: &str) -> bool {
    HARD_REJECT_KEYWORDS.iter().any(|kw| text.contains(kw))
}

/// Looks like a head-to-head sports matchup ("X vs Y" / "X vs. Y").
fn versus_pattern(text: &str) -> bool {
    text.split_whitespace()
        .any(|word| matches!(word, "vs" | "vs." | "v." | "@"))
}

/// Classify a market from its event ticker and title text.
#[must_use]
pub fn classify(event_ticker: &str, title: &str, subtitle: &str) -> MarketCategory {
    let text = format!("{title} {subtitle}").to_lowercase();
    if hard_rejected(&text) {
        return MarketCategory::Other;
    }

    let prefix = series_prefix(event_ticker);
    if let Some(sport) = longest_prefix_match(&prefix, SPORT_PREFIXES) {
        return MarketCategory::Sport(sport);
    }
    if let Some(indicator) = longest_prefix_match(&prefix, ECON_PREFIXES) {
        return MarketCategory::Economics(indicator);
    }

    for (keyword, sport) in SPORT_KEYWORDS {
        if text.contains(keyword) {
            return MarketCategory::Sport((*sport).to_string());
        }
    }
    for (keyword, indicator) in ECON_KEYWORDS {
        if text.contains(keyword) {
            return MarketCategory::Economics((*indicator).to_string());
        }
    }

    if versus_pattern(&text) {
        return MarketCategory::Sport("Sports".to_string());
    }

    MarketCategory::Other
}

/// Parlay/combo detection: multi-leg contracts whose title encodes
/// several outcomes. Single-leg titles never start with a yes/no
/// prefix, and legitimate commas don't carry them either.
#[must_use]
pub fn is_parlay(title: &str) -> bool {
    let lower = title.trim().to_lowercase();
    if lower.starts_with("yes ") || lower.starts_with("no ") {
        return true;
    }

    let segments: Vec<&str> = lower.split(',').collect();
    if segments.len() < 2 {
        return false;
    }
    let prefixed = segments
        .iter()
        .filter(|s| {
            let s = s.trim();
            s.starts_with("yes ") || s.starts_with("no ")
        })
        .count();
    prefixed >= 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_prefix_takes_first_segment() {
        assert_eq!(series_prefix("KXNBAGAME-26FEB19DETNYK-DET"), "KXNBAGAME");
        assert_eq!(series_prefix("kxcpi-26mar"), "KXCPI");
        assert_eq!(series_prefix("NODASH"), "NODASH");
    }

    #[test]
    fn prefix_classification_is_longest_first() {
        // KXNBAGAME must match the game series, not the bare KXNBA stem.
        assert_eq!(
            classify("KXNBAGAME-26FEB19DETNYK-DET", "Detroit at New York", ""),
            MarketCategory::Sport("NBA".to_string())
        );
        assert_eq!(
            classify("KXCPIYOY-26MAR", "CPI year over year", ""),
            MarketCategory::Economics("CPI".to_string())
        );
    }

    #[test]
    fn keyword_fallback_when_prefix_unknown() {
        assert_eq!(
            classify("KXSOMENEW-26", "Will the Fed announce a rate cut?", ""),
            MarketCategory::Economics("Fed Rate".to_string())
        );
        assert_eq!(
            classify("KXWEIRD-26", "Champions League winner", ""),
            MarketCategory::Sport("Soccer".to_string())
        );
    }

    #[test]
    fn versus_pattern_catches_unknown_sports() {
        assert_eq!(
            classify("KXUNKNOWN-26", "Tigers vs Sharks championship", ""),
            MarketCategory::Sport("Sports".to_string())
        );
    }

    #[test]
    fn hard_reject_wins_over_everything() {
        assert_eq!(
            classify("KXNBAGAME-26", "NBA star tops Billboard chart", ""),
            MarketCategory::Other
        );
        assert_eq!(
            classify("KXHIGHNY-26", "Highest temperature in NYC", ""),
            MarketCategory::Other
        );
        assert_eq!(
            classify("KXBTC-26", "Bitcoin above $100k", ""),
            MarketCategory::Other
        );
    }

    #[test]
    fn parlay_detection() {
        assert!(is_parlay("yes Chiefs, yes Lakers"));
        assert!(is_parlay("Yes Chiefs win"));
        assert!(is_parlay("no CPI above 3%, no rate cut, yes GDP up"));
        assert!(!is_parlay("Will the Chiefs win the Super Bowl?"));
        assert!(!is_parlay("CPI above 3%, seasonally adjusted"));
    }

    #[test]
    fn category_buckets() {
        assert_eq!(
            MarketCategory::Sport("NBA".to_string()).bucket(),
            Some("sports")
        );
        assert_eq!(
            MarketCategory::Economics("GDP".to_string()).bucket(),
            Some("economics")
        );
        assert_eq!(MarketCategory::Other.bucket(), None);
    }
}
