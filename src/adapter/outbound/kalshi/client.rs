//! Venue trade-API client.
//!
//! Speaks the exchange's HTTPS protocol: cursor-paginated market
//! listings with close-window pushdown, portfolio reads, resolution
//! checks, and limit-buy order placement. All requests go through the
//! shared retry layer; signed requests regenerate their signature per
//! attempt.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use reqwest::RequestBuilder;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::adapter::outbound::http;
use crate::domain::market::{NormalizedMarket, Venue};
use crate::domain::recommendation::Direction;
use crate::domain::trade::dollars;
use crate::error::{Error, Result};
use crate::port::outbound::exchange::{
    Balance, Exchange, Fill, MarketQuery, OrderAck, OrderRequest, Resolution, VenueOrder,
    VenuePosition,
};

use super::auth::{BearerSession, RsaSigner};
use super::category::{classify, is_parlay, series_prefix, MarketCategory};
use super::dto::{
    BalanceResponse, CreateOrderRequest, CreateOrderResponse, FillsResponse, MarketEnvelope,
    MarketsPage, OrdersResponse, PositionsResponse, RawMarket,
};

/// Hard cap on listing pages per fetch, bounding API cost.
const MAX_PAGES: usize = 50;

/// Per-page listing limit accepted by the venue.
const PAGE_LIMIT: usize = 100;

/// Concurrent in-flight requests during batch resolution checks.
const RESOLUTION_CONCURRENCY: usize = 8;

/// Authentication configured for the client. RSA signing takes
/// precedence when both are available; only RSA-signed sessions may
/// place orders.
pub enum KalshiAuth {
    Rsa(RsaSigner),
    Bearer(BearerSession),
    None,
}

/// Client for the venue's trade API.
pub struct KalshiClient {
    http: reqwest::Client,
    base_url: String,
    /// Path part of the base URL, prepended to signed paths.
    path_prefix: String,
    auth: KalshiAuth,
}

fn path_prefix_of(base_url: &str) -> String {
    let rest = match base_url.find("://") {
        Some(idx) => &base_url[idx + 3..],
        None => base_url,
    };
    match rest.find('/') {
        Some(idx) => rest[idx..].trim_end_matches('/').to_string(),
        None => String::new(),
    }
}

impl KalshiClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, auth: KalshiAuth) -> Self {
        let base_url = base_url.into();
        let base_url = base_url.trim_end_matches('/').to_string();
        let path_prefix = path_prefix_of(&base_url);
        Self {
            http: http::client(),
            base_url,
            path_prefix,
            auth,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Pre-resolve the bearer token so per-attempt request builders
    /// stay synchronous; RSA signs inline per attempt instead.
    async fn bearer_token(&self) -> Result<Option<String>> {
        match &self.auth {
            KalshiAuth::Bearer(session) => {
                Ok(Some(session.token(&self.http, &self.base_url).await?))
            }
            _ => Ok(None),
        }
    }

    fn authorize(
        &self,
        builder: RequestBuilder,
        method: &str,
        path: &str,
        bearer: &Option<String>,
    ) -> Result<RequestBuilder> {
        match &self.auth {
            KalshiAuth::Rsa(signer) => {
                let timestamp_ms = Utc::now().timestamp_millis();
                let signed_path = format!("{}{path}", self.path_prefix);
                let signature = signer.sign(timestamp_ms, method, &signed_path)?;
                Ok(builder
                    .header("ACCESS-KEY", signer.api_key_id())
                    .header("ACCESS-SIGNATURE", signature)
                    .header("ACCESS-TIMESTAMP", timestamp_ms.to_string()))
            }
            KalshiAuth::Bearer(_) => {
                let token = bearer
                    .as_ref()
                    .ok_or_else(|| Error::Auth("bearer token not resolved".to_string()))?;
                Ok(builder.header("Authorization", format!("Bearer {token}")))
            }
            KalshiAuth::None => Err(Error::Auth(
                "venue credentials not configured".to_string(),
            )),
        }
    }

    async fn get_json<T>(&self, path: &str, query: Vec<(String, String)>) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let bearer = self.bearer_token().await?;
        let url = self.url(path);
        http::json_with_retry(|| {
            let builder = self.http.get(&url).query(&query);
            self.authorize(builder, "GET", path, &bearer)
        })
        .await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: serde::Serialize,
        T: serde::de::DeserializeOwned,
    {
        let bearer = self.bearer_token().await?;
        let url = self.url(path);
        http::json_with_retry(|| {
            let builder = self.http.post(&url).json(body);
            self.authorize(builder, "POST", path, &bearer)
        })
        .await
    }

    /// Best available YES price in cents: last trade, then bid/ask
    /// midpoint, then ask, then bid. All four zero means no price.
    fn price_cents(raw: &RawMarket) -> i64 {
        if raw.last_price > 0 {
            return raw.last_price;
        }
        if raw.yes_bid > 0 && raw.yes_ask > 0 {
            return (raw.yes_bid + raw.yes_ask) / 2;
        }
        if raw.yes_ask > 0 {
            return raw.yes_ask;
        }
        raw.yes_bid.max(0)
    }

    fn parse_close(raw: &RawMarket) -> Option<DateTime<Utc>> {
        let candidate = raw
            .close_time
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(raw.expiration_time.as_deref().filter(|s| !s.is_empty()))?;
        DateTime::parse_from_rfc3339(candidate)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    fn normalize_market(raw: &RawMarket) -> NormalizedMarket {
        let ticker_for_prefix = if raw.event_ticker.is_empty() {
            &raw.ticker
        } else {
            &raw.event_ticker
        };
        let category = classify(ticker_for_prefix, &raw.title, &raw.subtitle);

        let (sport, economic_indicator) = match &category {
            MarketCategory::Sport(s) => (Some(s.clone()), None),
            MarketCategory::Economics(e) => (None, Some(e.clone())),
            MarketCategory::Other => (None, None),
        };
        let label = category.label().or_else(|| {
            (!raw.category.is_empty()).then(|| raw.category.clone())
        });

        let question = if raw.title.is_empty() {
            raw.subtitle.clone()
        } else {
            raw.title.clone()
        };

        NormalizedMarket {
            venue: Venue::Kalshi,
            venue_id: raw.ticker.clone(),
            question,
            description: (!raw.rules_primary.is_empty()).then(|| raw.rules_primary.clone()),
            resolution_criteria: (!raw.rules_primary.is_empty())
                .then(|| raw.rules_primary.clone()),
            category: label,
            sport,
            economic_indicator,
            close_at: Self::parse_close(raw),
            outcome_label: (!raw.yes_sub_title.is_empty()).then(|| raw.yes_sub_title.clone()),
            price_yes: Self::price_cents(raw) as f64 / 100.0,
            volume: raw.volume,
            liquidity: raw.open_interest,
            event_ticker: (!raw.event_ticker.is_empty()).then(|| raw.event_ticker.clone()),
        }
    }

    /// Post-filters applied after normalization. The volume threshold
    /// is waived for sports and economics, where thin early books are
    /// common and the close-window filter already bounds staleness.
    fn passes_filters(market: &NormalizedMarket, raw: &RawMarket, query: &MarketQuery) -> bool {
        if is_parlay(&raw.title) {
            debug!(ticker = %raw.ticker, "skipping parlay/combo market");
            return false;
        }

        let bucket = classify(
            market.event_ticker.as_deref().unwrap_or(&market.venue_id),
            &raw.title,
            &raw.subtitle,
        )
        .bucket();

        if let Some(categories) = &query.categories {
            match bucket {
                Some(bucket) if categories.contains(bucket) => {}
                _ => return false,
            }
        }

        let volume_waived = matches!(bucket, Some("sports") | Some("economics"));
        if !volume_waived && market.volume < query.min_volume {
            return false;
        }

        true
    }

    fn resolution_of(raw: &RawMarket) -> Resolution {
        let finalized = matches!(raw.status.as_str(), "finalized" | "settled");
        if !finalized {
            return Resolution::default();
        }
        match raw.result.as_str() {
            "yes" => Resolution {
                resolved: true,
                outcome: Some(true),
                cancelled: false,
            },
            "no" => Resolution {
                resolved: true,
                outcome: Some(false),
                cancelled: false,
            },
            // Finalized with an indeterminate result: voided.
            _ => Resolution {
                resolved: false,
                outcome: None,
                cancelled: true,
            },
        }
    }
}

#[async_trait]
impl Exchange for KalshiClient {
    fn venue(&self) -> Venue {
        Venue::Kalshi
    }

    fn is_configured(&self) -> bool {
        !matches!(self.auth, KalshiAuth::None)
    }

    fn supports_trading(&self) -> bool {
        matches!(self.auth, KalshiAuth::Rsa(_))
    }

    async fn fetch_markets(&self, query: &MarketQuery) -> Result<Vec<NormalizedMarket>> {
        let mut markets: Vec<NormalizedMarket> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        while markets.len() < query.limit && pages < MAX_PAGES {
            let remaining = query.limit - markets.len();
            let mut params: Vec<(String, String)> = vec![
                ("status".to_string(), "open".to_string()),
                ("limit".to_string(), PAGE_LIMIT.min(remaining.max(1)).to_string()),
            ];
            if let Some(cursor) = &cursor {
                params.push(("cursor".to_string(), cursor.clone()));
            }
            if let Some(min_close_ts) = query.min_close_ts {
                params.push(("min_close_ts".to_string(), min_close_ts.to_string()));
            }
            if let Some(max_close_ts) = query.max_close_ts {
                params.push(("max_close_ts".to_string(), max_close_ts.to_string()));
            }

            debug!(cursor = ?cursor, page = pages, "fetching markets page");
            let page: MarketsPage = self.get_json("/markets", params).await?;
            if page.markets.is_empty() {
                debug!("empty page, stopping pagination");
                break;
            }

            for raw in &page.markets {
                let market = Self::normalize_market(raw);
                if !Self::passes_filters(&market, raw, query) {
                    continue;
                }
                markets.push(market);
                if markets.len() >= query.limit {
                    break;
                }
            }

            cursor = page.cursor.filter(|c| !c.is_empty());
            if cursor.is_none() {
                break;
            }
            pages += 1;
        }

        info!(
            count = markets.len(),
            min_volume = query.min_volume,
            "fetched markets"
        );
        Ok(markets)
    }

    async fn check_resolution(&self, venue_id: &str) -> Option<Resolution> {
        let path = format!("/markets/{venue_id}");
        match self.get_json::<MarketEnvelope>(&path, Vec::new()).await {
            Ok(envelope) => Some(Self::resolution_of(&envelope.market)),
            Err(e) => {
                warn!(ticker = venue_id, error = %e, "resolution check failed");
                None
            }
        }
    }

    async fn check_resolutions_batch(
        &self,
        venue_ids: &[String],
    ) -> HashMap<String, Resolution> {
        let results: Vec<(String, Option<Resolution>)> = stream::iter(venue_ids.to_vec())
            .map(|id| async move {
                let resolution = self.check_resolution(&id).await;
                (id, resolution)
            })
            .buffer_unordered(RESOLUTION_CONCURRENCY)
            .collect()
            .await;

        results
            .into_iter()
            .filter_map(|(id, resolution)| resolution.map(|r| (id, r)))
            .collect()
    }

    async fn fetch_fills(&self, limit: usize) -> Result<Vec<Fill>> {
        let response: FillsResponse = self
            .get_json(
                "/portfolio/fills",
                vec![("limit".to_string(), limit.to_string())],
            )
            .await?;

        Ok(response
            .fills
            .into_iter()
            .filter_map(|raw| {
                let side = Direction::parse(&raw.side)?;
                Some(Fill {
                    fill_id: raw.fill_id,
                    ticker: raw.ticker,
                    side,
                    action: raw.action,
                    count: raw.count,
                    yes_price: raw.yes_price as f64 / 100.0,
                    no_price: raw.no_price as f64 / 100.0,
                    fee_cost: dollars(raw.fee_cost as f64 / 100.0),
                    created_at: raw.created_time.as_deref().and_then(|s| {
                        DateTime::parse_from_rfc3339(s)
                            .ok()
                            .map(|dt| dt.with_timezone(&Utc))
                    }),
                })
            })
            .collect())
    }

    async fn fetch_positions(&self) -> Result<Vec<VenuePosition>> {
        let response: PositionsResponse =
            self.get_json("/portfolio/positions", Vec::new()).await?;
        Ok(response
            .market_positions
            .into_iter()
            .map(|raw| VenuePosition {
                ticker: raw.ticker,
                market_exposure: raw.market_exposure,
                resting_orders_count: raw.resting_orders_count,
            })
            .collect())
    }

    async fn fetch_orders(&self, status: Option<&str>) -> Result<Vec<VenueOrder>> {
        let mut params = Vec::new();
        if let Some(status) = status {
            params.push(("status".to_string(), status.to_string()));
        }
        let response: OrdersResponse = self.get_json("/portfolio/orders", params).await?;
        Ok(response
            .orders
            .into_iter()
            .filter_map(|raw| {
                let side = Direction::parse(&raw.side)?;
                Some(VenueOrder {
                    order_id: raw.order_id,
                    ticker: raw.ticker,
                    side,
                    status: raw.status,
                    yes_price: raw.yes_price,
                    count: raw.count,
                    remaining_count: raw.remaining_count,
                })
            })
            .collect())
    }

    async fn fetch_balance(&self) -> Result<Balance> {
        let response: BalanceResponse = self.get_json("/portfolio/balance", Vec::new()).await?;
        Ok(Balance {
            cash: Decimal::from(response.balance) / Decimal::from(100),
            portfolio_value: Decimal::from(response.portfolio_value) / Decimal::from(100),
        })
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderAck> {
        if !self.supports_trading() {
            return Err(Error::Execution(
                "order placement requires RSA-signed credentials".to_string(),
            ));
        }
        if !(1..=99).contains(&order.yes_price_cents) {
            return Err(Error::Execution(format!(
                "yes_price must be 1..=99 cents, got {}",
                order.yes_price_cents
            )));
        }
        if order.count < 1 {
            return Err(Error::Execution(format!(
                "order count must be positive, got {}",
                order.count
            )));
        }

        let body = CreateOrderRequest {
            ticker: &order.ticker,
            action: "buy",
            side: order.side.as_str(),
            count: order.count,
            order_type: "limit",
            yes_price: order.yes_price_cents,
        };
        let response: CreateOrderResponse =
            self.post_json("/portfolio/orders", &body).await?;

        info!(
            ticker = %order.ticker,
            side = %order.side,
            count = order.count,
            yes_price = order.yes_price_cents,
            order_id = %response.order.order_id,
            status = %response.order.status,
            "order placed"
        );
        Ok(OrderAck {
            order_id: response.order.order_id,
            status: response.order.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(last: i64, bid: i64, ask: i64) -> RawMarket {
        RawMarket {
            last_price: last,
            yes_bid: bid,
            yes_ask: ask,
            ..RawMarket::default()
        }
    }

    #[test]
    fn price_prefers_last_then_midpoint_then_ask_then_bid() {
        assert_eq!(KalshiClient::price_cents(&raw(42, 10, 20)), 42);
        assert_eq!(KalshiClient::price_cents(&raw(0, 40, 44)), 42);
        assert_eq!(KalshiClient::price_cents(&raw(0, 0, 37)), 37);
        assert_eq!(KalshiClient::price_cents(&raw(0, 33, 0)), 33);
        assert_eq!(KalshiClient::price_cents(&raw(0, 0, 0)), 0);
    }

    #[test]
    fn normalize_converts_cents_and_labels() {
        let raw = RawMarket {
            ticker: "KXNBAGAME-26FEB19DETNYK-DET".to_string(),
            event_ticker: "KXNBAGAME-26FEB19DETNYK".to_string(),
            title: "Detroit at New York".to_string(),
            yes_sub_title: "Detroit".to_string(),
            rules_primary: "If Detroit wins the game".to_string(),
            close_time: Some("2026-02-20T03:00:00Z".to_string()),
            last_price: 42,
            volume: 125_000.0,
            open_interest: 40_000.0,
            ..RawMarket::default()
        };
        let market = KalshiClient::normalize_market(&raw);
        assert!((market.price_yes - 0.42).abs() < 1e-9);
        assert_eq!(market.sport.as_deref(), Some("NBA"));
        assert_eq!(market.category.as_deref(), Some("NBA"));
        assert_eq!(market.outcome_label.as_deref(), Some("Detroit"));
        assert!(market.close_at.is_some());
        assert!(market.has_price());
    }

    #[test]
    fn all_zero_prices_mean_no_price() {
        let market = KalshiClient::normalize_market(&raw(0, 0, 0));
        assert!(!market.has_price());
    }

    #[test]
    fn volume_filter_waived_for_sports() {
        let query = MarketQuery {
            limit: 10,
            min_volume: 10_000.0,
            ..MarketQuery::default()
        };
        let sports_raw = RawMarket {
            ticker: "KXNBAGAME-26FEB19DETNYK-DET".to_string(),
            event_ticker: "KXNBAGAME-26FEB19DETNYK".to_string(),
            title: "Detroit at New York".to_string(),
            volume: 500.0,
            last_price: 42,
            ..RawMarket::default()
        };
        let sports = KalshiClient::normalize_market(&sports_raw);
        assert!(KalshiClient::passes_filters(&sports, &sports_raw, &query));

        let other_raw = RawMarket {
            ticker: "KXSOMETHING-26".to_string(),
            title: "Some niche question".to_string(),
            volume: 500.0,
            last_price: 42,
            ..RawMarket::default()
        };
        let other = KalshiClient::normalize_market(&other_raw);
        assert!(!KalshiClient::passes_filters(&other, &other_raw, &query));
    }

    #[test]
    fn parlay_markets_rejected() {
        let query = MarketQuery {
            limit: 10,
            min_volume: 0.0,
            ..MarketQuery::default()
        };
        let raw = RawMarket {
            ticker: "KXNBAGAME-26FEB19-X".to_string(),
            title: "yes Pistons, yes Knicks".to_string(),
            volume: 1_000_000.0,
            last_price: 20,
            ..RawMarket::default()
        };
        let market = KalshiClient::normalize_market(&raw);
        assert!(!KalshiClient::passes_filters(&market, &raw, &query));
    }

    #[test]
    fn category_inclusion_filter() {
        let query = MarketQuery {
            limit: 10,
            min_volume: 0.0,
            categories: Some(
                ["economics".to_string()].into_iter().collect(),
            ),
            ..MarketQuery::default()
        };
        let econ_raw = RawMarket {
            ticker: "KXCPI-26MAR".to_string(),
            title: "CPI above 3%?".to_string(),
            last_price: 30,
            ..RawMarket::default()
        };
        let econ = KalshiClient::normalize_market(&econ_raw);
        assert!(KalshiClient::passes_filters(&econ, &econ_raw, &query));

        let nba_raw = RawMarket {
            ticker: "KXNBAGAME-26FEB19DETNYK-DET".to_string(),
            event_ticker: "KXNBAGAME-26FEB19DETNYK".to_string(),
            title: "Detroit at New York".to_string(),
            last_price: 42,
            ..RawMarket::default()
        };
        let nba = KalshiClient::normalize_market(&nba_raw);
        assert!(!KalshiClient::passes_filters(&nba, &nba_raw, &query));
    }

    #[test]
    fn resolution_mapping() {
        let mut raw = RawMarket {
            status: "finalized".to_string(),
            result: "yes".to_string(),
            ..RawMarket::default()
        };
        let r = KalshiClient::resolution_of(&raw);
        assert!(r.resolved && r.outcome == Some(true) && !r.cancelled);

        raw.result = "no".to_string();
        let r = KalshiClient::resolution_of(&raw);
        assert!(r.resolved && r.outcome == Some(false));

        raw.result = String::new();
        let r = KalshiClient::resolution_of(&raw);
        assert!(!r.resolved && r.cancelled);

        raw.status = "open".to_string();
        let r = KalshiClient::resolution_of(&raw);
        assert!(!r.resolved && !r.cancelled);
    }

    #[test]
    fn path_prefix_derivation() {
        assert_eq!(
            path_prefix_of("https://api.elections.kalshi.com/trade-api/v2"),
            "/trade-api/v2"
        );
        assert_eq!(path_prefix_of("https://example.com"), "");
    }
}
