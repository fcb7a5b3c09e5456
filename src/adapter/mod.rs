//! Adapters binding the ports to concrete backends.

pub mod outbound;
