//! Wire types for the venue's trade API.

use serde::{Deserialize, Serialize};

#[derive(Deserialize, Debug, Clone)]
pub struct MarketsPage {
    #[serde(default)]
    pub markets: Vec<RawMarket>,
    #[serde(default)]
    pub cursor: Option<String>,
}

/// Raw market object. Prices are integer cents (0-100).
#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawMarket {
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub event_ticker: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub yes_sub_title: String,
    #[serde(default)]
    pub rules_primary: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub close_time: Option<String>,
    #[serde(default)]
    pub expiration_time: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub last_price: i64,
    #[serde(default)]
    pub yes_bid: i64,
    #[serde(default)]
    pub yes_ask: i64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub open_interest: f64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MarketEnvelope {
    pub market: RawMarket,
}

#[derive(Deserialize, Debug, Clone)]
pub struct FillsResponse {
    #[serde(default)]
    pub fills: Vec<RawFill>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawFill {
    #[serde(default)]
    pub fill_id: String,
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub yes_price: i64,
    #[serde(default)]
    pub no_price: i64,
    #[serde(default)]
    pub fee_cost: i64,
    #[serde(default)]
    pub created_time: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PositionsResponse {
    #[serde(default)]
    pub market_positions: Vec<RawPosition>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawPosition {
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub market_exposure: i64,
    #[serde(default)]
    pub resting_orders_count: i64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct OrdersResponse {
    #[serde(default)]
    pub orders: Vec<RawOrder>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct RawOrder {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub yes_price: i64,
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub remaining_count: i64,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct BalanceResponse {
    /// Cash balance in cents.
    #[serde(default)]
    pub balance: i64,
    /// Portfolio value in cents.
    #[serde(default)]
    pub portfolio_value: i64,
}

#[derive(Serialize, Debug, Clone)]
pub struct CreateOrderRequest<'a> {
    pub ticker: &'a str,
    pub action: &'a str,
    pub side: &'a str,
    pub count: i64,
    #[serde(rename = "type")]
    pub order_type: &'a str,
    pub yes_price: i64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct CreateOrderResponse {
    pub order: CreatedOrder,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct CreatedOrder {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markets_page_deserializes() {
        let json = r#"{
            "markets": [{
                "ticker": "KXNBAGAME-26FEB19DETNYK-DET",
                "event_ticker": "KXNBAGAME-26FEB19DETNYK",
                "title": "Detroit at New York",
                "yes_sub_title": "Detroit",
                "rules_primary": "If Detroit wins the game against New York",
                "close_time": "2026-02-20T03:00:00Z",
                "status": "open",
                "last_price": 42,
                "yes_bid": 41,
                "yes_ask": 43,
                "volume": 125000,
                "open_interest": 40000
            }],
            "cursor": "abc123"
        }"#;
        let page: MarketsPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.markets.len(), 1);
        assert_eq!(page.cursor.as_deref(), Some("abc123"));
        assert_eq!(page.markets[0].last_price, 42);
    }

    #[test]
    fn markets_page_tolerates_missing_fields() {
        let page: MarketsPage = serde_json::from_str(r#"{"markets": [{}]}"#).unwrap();
        assert_eq!(page.markets[0].last_price, 0);
        assert!(page.cursor.is_none());
    }

    #[test]
    fn order_request_serializes_wire_shape() {
        let req = CreateOrderRequest {
            ticker: "KXCPI-26MAR",
            action: "buy",
            side: "yes",
            count: 125,
            order_type: "limit",
            yes_price: 40,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["action"], "buy");
        assert_eq!(json["type"], "limit");
        assert_eq!(json["yes_price"], 40);
    }

    #[test]
    fn order_response_extracts_order_id() {
        let json = r#"{"order": {"order_id": "ord_1", "status": "resting"}}"#;
        let resp: CreateOrderResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.order.order_id, "ord_1");
        assert_eq!(resp.order.status, "resting");
    }
}
