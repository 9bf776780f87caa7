//! Departure pipeline, layout and LED rendering for the departure board.

pub mod board;
pub mod config;
pub mod display;
pub mod source;

// Re-export transit from the transit crate
pub use led_board_transit as transit;

pub use board::{BoardController, BoardFrame, BoardPhase, BoardState, RefreshOutcome};
pub use config::{BoardConfig, ConfigError, Viewport};
