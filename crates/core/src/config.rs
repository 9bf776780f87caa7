//! Board configuration.
//!
//! A single immutable value handed to the controller at construction. Only
//! the stop query and the viewport change at runtime, and those are owned by
//! the controller.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use led_board_transit::{EndpointIdentifier, FilterPolicy};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::display::led::LedStyle;

pub const DEFAULT_ENDPOINTS: [&str; 2] = [
    "https://v6.bvg.transport.rest",
    "https://v6.vbb.transport.rest",
];

/// Upper bound for every minute-valued time window (one day).
pub const MAX_WINDOW_MINUTES: i64 = 24 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Size of the board surface, in CSS pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 480.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoardConfig {
    /// Stop name to display. Nothing is fetched until this is set.
    pub stop_query: Option<String>,
    pub max_rows: usize,
    /// The board height is divided into this many dot rows.
    pub dot_baseline_rows: u32,
    pub look_ahead_minutes: i64,
    pub refresh_interval_ms: u64,
    /// Font size multiplier applied when drawing glyphs.
    pub text_boost: f64,
    pub led_scale: f64,
    /// Glow alpha, clamped to [0.4, 1.0].
    pub attenuate_glow: f64,
    /// Upstream base URLs, tried in order.
    pub endpoints: Vec<String>,

    pub past_tolerance_minutes: i64,
    pub stale_realtime_minutes: i64,
    pub max_stale_deviation_minutes: i64,

    /// Marquee speed in pixels per second.
    pub scroll_speed: f64,
    /// Destinations wider than the column minus this margin scroll.
    pub scroll_activation_margin: f64,

    pub suggestion_debounce_ms: u64,
    pub request_timeout_ms: u64,

    pub viewport: Viewport,
    pub led_style: LedStyle,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            stop_query: None,
            max_rows: 5,
            dot_baseline_rows: 6,
            look_ahead_minutes: 60,
            refresh_interval_ms: 30_000,
            text_boost: 1.21,
            led_scale: 0.7,
            attenuate_glow: 0.9,
            endpoints: DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
            past_tolerance_minutes: 5,
            stale_realtime_minutes: 10,
            max_stale_deviation_minutes: 15,
            scroll_speed: 150.0,
            scroll_activation_margin: 100.0,
            suggestion_debounce_ms: 300,
            request_timeout_ms: 10_000,
            viewport: Viewport::default(),
            led_style: LedStyle::default(),
        }
    }
}

impl BoardConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.into(),
            }
        }

        if self.max_rows == 0 {
            return Err(invalid("max_rows", "must be at least 1"));
        }
        if self.dot_baseline_rows == 0 {
            return Err(invalid("dot_baseline_rows", "must be at least 1"));
        }
        if !(1..=MAX_WINDOW_MINUTES).contains(&self.look_ahead_minutes) {
            return Err(invalid(
                "look_ahead_minutes",
                format!("{} is outside [1, {MAX_WINDOW_MINUTES}]", self.look_ahead_minutes),
            ));
        }
        for (field, value) in [
            ("past_tolerance_minutes", self.past_tolerance_minutes),
            ("stale_realtime_minutes", self.stale_realtime_minutes),
            ("max_stale_deviation_minutes", self.max_stale_deviation_minutes),
        ] {
            if !(0..=MAX_WINDOW_MINUTES).contains(&value) {
                return Err(invalid(field, format!("{value} is outside [0, {MAX_WINDOW_MINUTES}]")));
            }
        }
        if self.refresh_interval_ms == 0 {
            return Err(invalid("refresh_interval_ms", "must be positive"));
        }
        for (field, value) in [
            ("text_boost", self.text_boost),
            ("led_scale", self.led_scale),
            ("scroll_speed", self.scroll_speed),
            ("viewport.width", self.viewport.width),
            ("viewport.height", self.viewport.height),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(field, format!("{value} is not a positive number")));
            }
        }
        if !(0.4..=1.0).contains(&self.attenuate_glow) {
            return Err(invalid(
                "attenuate_glow",
                format!("{} is outside [0.4, 1.0]", self.attenuate_glow),
            ));
        }
        if self.endpoints.is_empty() {
            return Err(invalid("endpoints", "at least one endpoint is required"));
        }
        for endpoint in &self.endpoints {
            let url = Url::parse(endpoint).map_err(|err| invalid("endpoints", format!("{endpoint}: {err}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(invalid("endpoints", format!("{endpoint}: not an http(s) URL")));
            }
        }
        Ok(())
    }

    /// The stop query with surrounding whitespace removed; blank counts as unset.
    pub fn initial_stop_query(&self) -> Option<String> {
        self.stop_query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_owned)
    }

    pub fn endpoint_ids(&self) -> Vec<EndpointIdentifier> {
        self.endpoints.iter().map(EndpointIdentifier::new).collect()
    }

    pub fn filter_policy(&self) -> FilterPolicy {
        FilterPolicy {
            look_ahead: TimeDelta::minutes(self.look_ahead_minutes),
            past_tolerance: TimeDelta::minutes(self.past_tolerance_minutes),
            stale_realtime_after: TimeDelta::minutes(self.stale_realtime_minutes),
            max_stale_deviation: TimeDelta::minutes(self.max_stale_deviation_minutes),
            max_rows: self.max_rows,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn suggestion_debounce(&self) -> Duration {
        Duration::from_millis(self.suggestion_debounce_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
