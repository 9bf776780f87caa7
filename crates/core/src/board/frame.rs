//! Rendered output of one refresh cycle.

use crate::display::led::LedSvg;
use crate::display::layout::LayoutGeometry;

pub const NETWORK_ERROR_MESSAGE: &str = "❌ API/Netzwerkfehler · Network error ❌";
pub const NETWORK_ERROR_HINT: &str = "Verbindung prüfen · Check connection";
pub const MISSING_STOP_MESSAGE: &str = "❌ Haltestelle fehlt · No stop selected ❌";
pub const MISSING_STOP_HINT: &str = "Haltestelle wählen · Choose a stop";
pub const NO_DEPARTURES_MESSAGE: &str = "Keine weiteren Fahrten · No further departures";

#[derive(Clone, Debug, PartialEq)]
pub enum RenderedDestination {
    Static(LedSvg),
    /// Marquee strip, animated over `duration_secs` across `total_width`.
    Scrolling {
        svg: LedSvg,
        total_width: f64,
        duration_secs: f64,
    },
}

impl RenderedDestination {
    pub fn svg(&self) -> &LedSvg {
        match self {
            RenderedDestination::Static(svg) => svg,
            RenderedDestination::Scrolling { svg, .. } => svg,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderedRow {
    pub line: String,
    pub line_code: String,
    pub direction: String,
    pub minutes: u32,
    pub arriving_now: bool,
    pub line_svg: LedSvg,
    pub destination: RenderedDestination,
    pub eta_svg: LedSvg,
    pub unit_svg: LedSvg,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum BoardFrame {
    /// Nothing rendered yet.
    #[default]
    Blank,
    Rows {
        station: String,
        geometry: LayoutGeometry,
        rows: Vec<RenderedRow>,
    },
    NoDepartures {
        station: String,
        geometry: LayoutGeometry,
        placeholder: LedSvg,
    },
    /// Full-board message replacing all rows.
    Message { lines: Vec<String>, is_error: bool },
}

impl BoardFrame {
    pub fn network_error() -> Self {
        BoardFrame::Message {
            lines: vec![NETWORK_ERROR_MESSAGE.to_owned(), NETWORK_ERROR_HINT.to_owned()],
            is_error: true,
        }
    }

    pub fn missing_stop() -> Self {
        BoardFrame::Message {
            lines: vec![MISSING_STOP_MESSAGE.to_owned(), MISSING_STOP_HINT.to_owned()],
            is_error: true,
        }
    }

    pub fn station(&self) -> Option<&str> {
        match self {
            BoardFrame::Rows { station, .. } | BoardFrame::NoDepartures { station, .. } => Some(station),
            BoardFrame::Blank | BoardFrame::Message { .. } => None,
        }
    }

    pub fn geometry(&self) -> Option<&LayoutGeometry> {
        match self {
            BoardFrame::Rows { geometry, .. } | BoardFrame::NoDepartures { geometry, .. } => Some(geometry),
            BoardFrame::Blank | BoardFrame::Message { .. } => None,
        }
    }

    pub fn rows(&self) -> &[RenderedRow] {
        match self {
            BoardFrame::Rows { rows, .. } => rows,
            _ => &[],
        }
    }
}
