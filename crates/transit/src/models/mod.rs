//! Transit data models and types.

pub mod departure;
pub mod types;

// Re-exports for convenience
pub use departure::{normalize, parse_timestamp, NormalizedDeparture, DIRECTION_PLACEHOLDER};
pub use types::{ResolvedStop, Result, TransitError};
