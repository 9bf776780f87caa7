//! Column sizing and per-row layout decisions.

use chrono::{DateTime, Utc};
use led_board_transit::{minutes_until, NormalizedDeparture};
use serde::Serialize;

use crate::config::BoardConfig;
use crate::display::metrics::{TextMetrics, DEFAULT_FONT_FACTOR};

// ============================================================================
// Constants
// ============================================================================

/// Widest line code the board reserves room for.
pub const LINE_CODE_SAMPLE: &str = "WWWW";
pub const ETA_SAMPLE: &str = "888";
pub const UNIT_LABEL: &str = "Min";
pub const LINE_CODE_PLACEHOLDER: &str = "—";
pub const MAX_LINE_CODE_CHARS: usize = 4;

pub const COLUMN_PADDING: f64 = 8.0;
pub const ETA_TOKEN_GAP: f64 = 4.0;
pub const COLUMN_GAPS: f64 = 6.0;
pub const MIN_DESTINATION_WIDTH: f64 = 100.0;
/// Inset kept free on both sides of static destination text.
pub const DESTINATION_INSET: f64 = 2.0;

pub const MARQUEE_REPETITIONS: usize = 100;
const MARQUEE_GAP_CHARS: usize = 58;
const MARQUEE_TAIL: f64 = 100.0;

/// No-break spaces between marquee repetitions.
pub fn marquee_separator() -> String {
    "\u{00A0}".repeat(MARQUEE_GAP_CHARS)
}

// ============================================================================
// Types
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LayoutGeometry {
    pub row_height: f64,
    pub dot_height: f64,
    pub font_size: f64,
    pub line_column_width: f64,
    pub eta_column_width: f64,
    pub destination_width: f64,
    pub unit_width: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Marquee {
    /// The destination repeated with separators.
    pub text: String,
    pub total_width: f64,
    pub svg_width: f64,
    pub duration_secs: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DestinationLayout {
    Static { text: String },
    Scrolling(Marquee),
}

impl DestinationLayout {
    pub fn is_scrolling(&self) -> bool {
        matches!(self, DestinationLayout::Scrolling(_))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RowLayout {
    pub line_code: String,
    pub destination: DestinationLayout,
    pub minutes: u32,
    /// Departing now; the row blinks.
    pub arriving_now: bool,
}

/// Tunables of the layout, taken from [`BoardConfig`].
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutParams {
    pub max_rows: usize,
    pub dot_baseline_rows: u32,
    pub font_factor: f64,
    pub text_boost: f64,
    pub scroll_speed: f64,
    pub scroll_activation_margin: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self::from_config(&BoardConfig::default())
    }
}

impl LayoutParams {
    pub fn from_config(config: &BoardConfig) -> Self {
        Self {
            max_rows: config.max_rows,
            dot_baseline_rows: config.dot_baseline_rows,
            font_factor: DEFAULT_FONT_FACTOR,
            text_boost: config.text_boost,
            scroll_speed: config.scroll_speed,
            scroll_activation_margin: config.scroll_activation_margin,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Clone, Debug, Default)]
pub struct LayoutEngine {
    metrics: TextMetrics,
    params: LayoutParams,
}

impl LayoutEngine {
    pub fn new(metrics: TextMetrics, params: LayoutParams) -> Self {
        Self { metrics, params }
    }

    pub fn metrics(&self) -> &TextMetrics {
        &self.metrics
    }

    pub fn params(&self) -> &LayoutParams {
        &self.params
    }

    /// Size at which glyphs are actually drawn.
    pub fn boosted_size(&self, font_size: f64) -> f64 {
        (font_size * self.params.text_boost).floor()
    }

    pub fn compute_geometry(&self, container_width: f64, container_height: f64) -> LayoutGeometry {
        let dot_height = (container_height / self.params.dot_baseline_rows.max(1) as f64).floor();
        let font_size = TextMetrics::font_size_for(dot_height, self.params.font_factor);
        let boosted = self.boosted_size(font_size);
        let row_height = (container_height / self.params.max_rows.max(1) as f64).ceil();

        let line_column_width = self.metrics.measure_width(LINE_CODE_SAMPLE, boosted) + COLUMN_PADDING;
        let unit_width = (self.metrics.measure_width(UNIT_LABEL, boosted) + 2.0).max((font_size * 2.8).floor());
        let eta_column_width =
            self.metrics.measure_width(ETA_SAMPLE, boosted) + unit_width + ETA_TOKEN_GAP + COLUMN_PADDING;
        let destination_width =
            (container_width - line_column_width - eta_column_width - COLUMN_GAPS).max(MIN_DESTINATION_WIDTH);

        LayoutGeometry {
            row_height,
            dot_height,
            font_size,
            line_column_width,
            eta_column_width,
            destination_width,
            unit_width,
        }
    }

    /// Static when the text fits the column minus the scroll margin,
    /// otherwise an endless marquee.
    pub fn layout_destination(&self, text: &str, destination_width: f64, font_size: f64) -> DestinationLayout {
        let boosted = self.boosted_size(font_size);
        let measured = self.metrics.measure_width(text, boosted);

        if measured <= destination_width - self.params.scroll_activation_margin {
            let fitted = self
                .metrics
                .truncate_to_width(text, boosted, destination_width - DESTINATION_INSET);
            return DestinationLayout::Static {
                text: fitted.to_owned(),
            };
        }

        let segment = format!("{text}{}", marquee_separator());
        let repeated = segment.repeat(MARQUEE_REPETITIONS);
        let total_width = self.metrics.measure_width(&repeated, boosted);
        DestinationLayout::Scrolling(Marquee {
            text: repeated,
            total_width,
            svg_width: (destination_width * 2.0).max(total_width + MARQUEE_TAIL),
            duration_secs: total_width / self.params.scroll_speed,
        })
    }

    pub fn layout_row(
        &self,
        departure: &NormalizedDeparture,
        geometry: &LayoutGeometry,
        now: DateTime<Utc>,
    ) -> RowLayout {
        let minutes = departure.when.map_or(0, |when| minutes_until(when, now));
        RowLayout {
            line_code: line_code(&departure.line),
            destination: self.layout_destination(&departure.direction, geometry.destination_width, geometry.font_size),
            minutes,
            arriving_now: minutes == 0,
        }
    }
}

/// Up to four ASCII letters/digits of the line name.
pub fn line_code(line: &str) -> String {
    let code: String = line
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(MAX_LINE_CODE_CHARS)
        .collect();
    if code.is_empty() {
        LINE_CODE_PLACEHOLDER.to_owned()
    } else {
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::metrics::{FontWeight, TextMeasurer};
    use approx::assert_relative_eq;
    use chrono::{TimeDelta, TimeZone};
    use unicode_segmentation::UnicodeSegmentation;

    struct FixedAdvance(f64);

    impl TextMeasurer for FixedAdvance {
        fn measure(&self, text: &str, _size: f64, _weight: FontWeight) -> f64 {
            text.graphemes(true).count() as f64 * self.0
        }
    }

    fn engine() -> LayoutEngine {
        LayoutEngine::new(TextMetrics::new(FixedAdvance(10.0)), LayoutParams::default())
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_compute_geometry() {
        let geometry = engine().compute_geometry(1280.0, 480.0);
        assert_eq!(
            geometry,
            LayoutGeometry {
                row_height: 96.0,
                dot_height: 80.0,
                font_size: 62.0,
                line_column_width: 48.0,
                eta_column_width: 215.0,
                destination_width: 1011.0,
                unit_width: 173.0,
            }
        );
    }

    #[test]
    fn test_narrow_container_keeps_minimum_destination() {
        let geometry = engine().compute_geometry(200.0, 480.0);
        assert_eq!(geometry.destination_width, MIN_DESTINATION_WIDTH);
        assert_eq!(engine().compute_geometry(200.0, 481.0).row_height, 97.0);
    }

    #[test]
    fn test_marquee_activation() {
        let engine = engine();

        let long = "A".repeat(50);
        let layout = engine.layout_destination(&long, 300.0, 62.0);
        let DestinationLayout::Scrolling(marquee) = layout else {
            panic!("expected scrolling layout");
        };
        // (50 + 58) graphemes per segment, 100 segments
        assert_relative_eq!(marquee.total_width, 108_000.0);
        assert_relative_eq!(marquee.svg_width, 108_100.0);
        assert_relative_eq!(marquee.duration_secs, 720.0);
        assert!(marquee.text.starts_with(&long));
        assert_eq!(marquee.text.matches(&long).count(), MARQUEE_REPETITIONS);

        let short = "B".repeat(15);
        assert_eq!(
            engine.layout_destination(&short, 300.0, 62.0),
            DestinationLayout::Static { text: short.clone() }
        );

        // Exactly at the threshold stays static
        let tie = "C".repeat(20);
        assert!(!engine.layout_destination(&tie, 300.0, 62.0).is_scrolling());
    }

    #[test]
    fn test_static_text_truncated_to_column() {
        let params = LayoutParams {
            scroll_activation_margin: -1000.0,
            ..LayoutParams::default()
        };
        let engine = LayoutEngine::new(TextMetrics::new(FixedAdvance(10.0)), params);
        let layout = engine.layout_destination("S+U Hauptbahnhof", 100.0, 62.0);
        // 100 - 2 leaves room for 9 graphemes
        assert_eq!(
            layout,
            DestinationLayout::Static {
                text: "S+U Haupt".into()
            }
        );
    }

    #[test]
    fn test_layout_row() {
        let engine = engine();
        let geometry = engine.compute_geometry(1280.0, 480.0);
        let departure = NormalizedDeparture {
            when: Some(now() + TimeDelta::minutes(4)),
            planned_when: None,
            line: "M10".into(),
            direction: "Turmstr.".into(),
            cancelled: false,
            delay: 0,
            remarks: Vec::new(),
            realtime_updated_at: None,
        };

        let row = engine.layout_row(&departure, &geometry, now());
        assert_eq!(row.line_code, "M10");
        assert_eq!(row.minutes, 4);
        assert!(!row.arriving_now);
        assert_eq!(
            row.destination,
            DestinationLayout::Static {
                text: "Turmstr.".into()
            }
        );

        let due = NormalizedDeparture {
            when: Some(now() + TimeDelta::seconds(20)),
            ..departure
        };
        assert!(engine.layout_row(&due, &geometry, now()).arriving_now);
    }

    #[test]
    fn test_line_code() {
        assert_eq!(line_code("M10"), "M10");
        assert_eq!(line_code("S 41"), "S41");
        assert_eq!(line_code("RE 1234"), "RE12");
        assert_eq!(line_code("Bus X9!"), "BusX");
        assert_eq!(line_code("ÜÖ"), LINE_CODE_PLACEHOLDER);
        assert_eq!(line_code(""), LINE_CODE_PLACEHOLDER);
    }
}
