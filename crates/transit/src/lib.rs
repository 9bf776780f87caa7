//! # led-board-transit
//!
//! Departure data model for the LED departure board.
//!
//! ## Features
//!
//! - **Defensive normalization**: heterogeneous upstream records become one
//!   canonical [`NormalizedDeparture`] shape, never failing a batch
//! - **Board filtering**: look-ahead window, reporting-lag tolerance, stale
//!   realtime sanity check and cancellation remarks
//! - **Pluggable networking**: implement [`DataFetcher`] to supply JSON
//!
//! ## Example
//!
//! ```
//! use led_board_transit::prelude::*;
//! use chrono::{TimeDelta, TimeZone, Utc};
//!
//! let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
//! let raw: api_types::RawDeparture = serde_json::from_str(
//!     r#"{"when": "2024-05-01T12:04:00+02:00", "line": {"name": "M10"}, "direction": "Turmstr."}"#,
//! ).unwrap();
//!
//! let board = FilterPolicy::default().apply([normalize(&raw)], now);
//! assert_eq!(board.len(), 1);
//! assert_eq!(minutes_until(board[0].when.unwrap(), now), 4);
//! assert_eq!(now + TimeDelta::minutes(4), board[0].when.unwrap());
//! ```

pub mod filter;
pub mod identifiers;
pub mod models;
pub mod network;

// Re-exports for convenience
pub mod prelude {
    pub use crate::filter::{
        is_cancellation_remark, minutes_until, FilterPolicy, Rejection, CANCELLATION_PHRASES,
    };
    pub use crate::identifiers::*;
    pub use crate::models::{departure::*, types::*};
    pub use crate::network::traits::*;
}

pub use prelude::*;
