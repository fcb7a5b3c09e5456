//! augur - AI-assisted edge detection and automated trading for binary
//! prediction markets.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── domain/        # Pure domain types
//! ├── port/          # Trait seams between core and adapters
//! ├── adapter/       # Venue, model provider, SQLite, notifier
//! ├── application/   # Calculator, scanner, reconciler, scheduler
//! └── cli/           # Command-line inbound adapter
//! ```
//!
//! The pipeline: the scheduler triggers a scan; the scanner fetches
//! markets from the venue, snapshots prices, produces price-blind
//! probability estimates, compares them to market prices under the
//! fee model, sizes positions with fractional Kelly, and optionally
//! places limit orders. A resolution pass settles outcomes and feeds
//! calibration statistics back into future estimates.

pub mod adapter;
pub mod application;
pub mod cli;
pub mod domain;
pub mod error;
pub mod port;
