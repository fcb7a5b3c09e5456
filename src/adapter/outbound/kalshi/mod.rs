//! Kalshi exchange adapter.

pub mod auth;
pub mod category;
pub mod client;
pub mod dto;

pub use auth::{normalize_pem, BearerSession, RsaSigner};
pub use client::{KalshiAuth, KalshiClient};
