//! Port definitions (hexagonal seams).

pub mod outbound;
