//! The board controller: one stop, refreshed on demand.

pub mod frame;
pub mod state;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use led_board_transit::{normalize, DataFetcher, FilterPolicy, NormalizedDeparture, TransitError};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::{BoardConfig, Viewport};
use crate::display::layout::{
    DestinationLayout, LayoutEngine, LayoutGeometry, LayoutParams, COLUMN_PADDING, DESTINATION_INSET,
    ETA_TOKEN_GAP, UNIT_LABEL,
};
use crate::display::led::{LedRenderer, LedSvg, RenderOptions};
use crate::display::metrics::TextMetrics;
use crate::source::DepartureSource;

pub use frame::{BoardFrame, RenderedDestination, RenderedRow};
pub use state::{BoardPhase, BoardState};

#[derive(Debug)]
pub enum RefreshOutcome {
    /// Another refresh was still running.
    Skipped,
    Rendered { rows: usize },
    NoDepartures,
    Failed(TransitError),
}

/// Held for the duration of one refresh; released on every exit path.
struct RefreshGuard<'a>(&'a AtomicBool);

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct BoardController {
    config: BoardConfig,
    source: Arc<DepartureSource>,
    layout: LayoutEngine,
    renderer: LedRenderer,
    policy: FilterPolicy,

    refreshing: AtomicBool,
    stop_query: RwLock<Option<String>>,
    viewport: RwLock<Viewport>,
    state: RwLock<BoardState>,
    frame: RwLock<Arc<BoardFrame>>,
}

impl BoardController {
    pub fn new(config: BoardConfig, fetcher: Arc<dyn DataFetcher>) -> Self {
        let source = Arc::new(DepartureSource::from_config(&config, fetcher));
        Self::with_parts(config, source, TextMetrics::default())
    }

    pub fn with_parts(config: BoardConfig, source: Arc<DepartureSource>, metrics: TextMetrics) -> Self {
        Self {
            layout: LayoutEngine::new(metrics, LayoutParams::from_config(&config)),
            renderer: LedRenderer::from_config(&config),
            policy: config.filter_policy(),
            refreshing: AtomicBool::new(false),
            stop_query: RwLock::new(config.initial_stop_query()),
            viewport: RwLock::new(config.viewport),
            state: RwLock::new(BoardState::default()),
            frame: RwLock::new(Arc::new(BoardFrame::Blank)),
            source,
            config,
        }
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn source(&self) -> &Arc<DepartureSource> {
        &self.source
    }

    pub async fn stop_query(&self) -> Option<String> {
        self.stop_query.read().await.clone()
    }

    /// Returns whether the query changed. Blank and unchanged values are ignored.
    pub async fn set_stop_query(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return false;
        }

        let mut current = self.stop_query.write().await;
        if current.as_deref() == Some(query) {
            return false;
        }
        info!(stop = query, "stop changed");
        *current = Some(query.to_owned());
        true
    }

    pub async fn viewport(&self) -> Viewport {
        *self.viewport.read().await
    }

    pub async fn set_viewport(&self, viewport: Viewport) -> bool {
        let mut current = self.viewport.write().await;
        if *current == viewport {
            return false;
        }
        debug!(width = viewport.width, height = viewport.height, "viewport resized");
        *current = viewport;
        true
    }

    pub async fn state(&self) -> BoardState {
        *self.state.read().await
    }

    pub async fn frame(&self) -> Arc<BoardFrame> {
        Arc::clone(&*self.frame.read().await)
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        self.refresh_at(Utc::now()).await
    }

    pub async fn refresh_at(&self, now: DateTime<Utc>) -> RefreshOutcome {
        let Some(_guard) = RefreshGuard::acquire(&self.refreshing) else {
            debug!("refresh already in progress, skipping");
            return RefreshOutcome::Skipped;
        };

        let Some(query) = self.stop_query().await else {
            warn!("no stop configured");
            self.publish(BoardFrame::missing_stop()).await;
            self.state.write().await.fail();
            return RefreshOutcome::Failed(TransitError::EmptyQuery);
        };

        let viewport = self.viewport().await;
        let geometry = self.layout.compute_geometry(viewport.width, viewport.height);

        self.state.write().await.begin_loading();
        let batch = match self.source.load_departures(&query).await {
            Ok(batch) => batch,
            Err(err) => {
                error!(stop = %query, %err, "refresh failed");
                self.publish(BoardFrame::network_error()).await;
                self.state.write().await.fail();
                return RefreshOutcome::Failed(err);
            }
        };

        let departures = self.policy.apply(batch.departures.iter().map(normalize), now);
        let station = batch.stop.name;
        let (frame, outcome) = if departures.is_empty() {
            let frame = BoardFrame::NoDepartures {
                placeholder: self.render_placeholder(&geometry),
                station,
                geometry,
            };
            (frame, RefreshOutcome::NoDepartures)
        } else {
            let rows: Vec<RenderedRow> = departures
                .iter()
                .map(|departure| self.render_row(departure, &geometry, now))
                .collect();
            let outcome = RefreshOutcome::Rendered { rows: rows.len() };
            (BoardFrame::Rows { station, geometry, rows }, outcome)
        };

        self.publish(frame).await;
        self.state.write().await.succeed(now);
        info!(stop = %query, ?outcome, "board refreshed");
        outcome
    }

    async fn publish(&self, frame: BoardFrame) {
        *self.frame.write().await = Arc::new(frame);
    }

    fn render_row(&self, departure: &NormalizedDeparture, geometry: &LayoutGeometry, now: DateTime<Utc>) -> RenderedRow {
        let layout = self.layout.layout_row(departure, geometry, now);
        let height = geometry.dot_height;
        let size = geometry.font_size;

        let line_width = geometry.line_column_width - COLUMN_PADDING;
        let line_svg = self
            .renderer
            .render(&layout.line_code, line_width, height, size, RenderOptions::left(line_width));

        let destination = match layout.destination {
            DestinationLayout::Static { text } => RenderedDestination::Static(self.renderer.render(
                &text,
                geometry.destination_width,
                height,
                size,
                RenderOptions::left(geometry.destination_width - DESTINATION_INSET),
            )),
            DestinationLayout::Scrolling(marquee) => RenderedDestination::Scrolling {
                svg: self.renderer.render(
                    &marquee.text,
                    marquee.svg_width,
                    height,
                    size,
                    RenderOptions::left(marquee.svg_width),
                ),
                total_width: marquee.total_width,
                duration_secs: marquee.duration_secs,
            },
        };

        let number_width = geometry.eta_column_width - geometry.unit_width - ETA_TOKEN_GAP;
        let eta_svg = self.renderer.render(
            &layout.minutes.to_string(),
            number_width,
            height,
            size,
            RenderOptions::right(number_width - 2.0),
        );
        let unit_svg = self.renderer.render(
            UNIT_LABEL,
            geometry.unit_width,
            height,
            size,
            RenderOptions::left(geometry.unit_width - 2.0),
        );

        RenderedRow {
            line: departure.line.clone(),
            line_code: layout.line_code,
            direction: departure.direction.clone(),
            minutes: layout.minutes,
            arriving_now: layout.arriving_now,
            line_svg,
            destination,
            eta_svg,
            unit_svg,
        }
    }

    fn render_placeholder(&self, geometry: &LayoutGeometry) -> LedSvg {
        let available = geometry.destination_width - DESTINATION_INSET;
        let text = self.layout.metrics().truncate_to_width(
            frame::NO_DEPARTURES_MESSAGE,
            self.layout.boosted_size(geometry.font_size),
            available,
        );
        self.renderer.render(
            text,
            geometry.destination_width,
            geometry.dot_height,
            geometry.font_size,
            RenderOptions::left(available),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::mock::MockFetcher;
    use chrono::TimeZone;
    use serde_json::{json, Value};
    use tokio::sync::Semaphore;

    const A: &str = "https://a.test";
    const B: &str = "https://b.test";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn config() -> BoardConfig {
        BoardConfig {
            stop_query: Some("Alexanderplatz".into()),
            endpoints: vec![A.into(), B.into()],
            ..BoardConfig::default()
        }
    }

    fn alexanderplatz() -> Value {
        json!([{"type": "stop", "id": "900100003", "name": "S+U Alexanderplatz"}])
    }

    fn controller(config: BoardConfig, fetcher: MockFetcher) -> (Arc<BoardController>, Arc<MockFetcher>) {
        let fetcher = Arc::new(fetcher);
        (Arc::new(BoardController::new(config, fetcher.clone())), fetcher)
    }

    #[tokio::test]
    async fn test_renders_upcoming_departure() {
        let (controller, _) = controller(
            config(),
            MockFetcher::new()
                .json(&format!("{A}/locations"), alexanderplatz())
                .json(
                    &format!("{A}/stops/"),
                    json!([
                        {"when": "2024-05-01T12:04:00+02:00", "line": {"name": "M10"}, "direction": "Turmstr."},
                        {
                            "when": "2024-05-01T12:06:00+02:00",
                            "line": {"name": "M10"},
                            "direction": "Hauptbahnhof",
                            "remarks": [{"text": "Fahrt entfällt"}],
                        },
                        {"when": "2024-05-01T13:30:00+02:00", "line": {"name": "M10"}, "direction": "Warschauer Str."},
                    ]),
                ),
        );
        assert_eq!(*controller.frame().await, BoardFrame::Blank);

        let outcome = controller.refresh_at(now()).await;
        assert!(matches!(outcome, RefreshOutcome::Rendered { rows: 1 }));

        let frame = controller.frame().await;
        assert_eq!(frame.station(), Some("S+U Alexanderplatz"));
        let [row] = frame.rows() else {
            panic!("expected one row, got {frame:?}");
        };
        assert_eq!(row.minutes, 4);
        assert_eq!(row.line_code, "M10");
        assert!(!row.arriving_now);
        assert!(row.line_svg.markup.contains(">M10</text>"));
        assert!(row.eta_svg.markup.contains(">4</text>"));
        assert!(row.unit_svg.markup.contains(">Min</text>"));
        let RenderedDestination::Static(destination) = &row.destination else {
            panic!("expected a static destination");
        };
        assert!(destination.markup.contains(">Turmstr.</text>"));

        let state = controller.state().await;
        assert_eq!(state.phase, BoardPhase::Idle);
        assert_eq!(state.last_refresh_at, Some(now()));
    }

    #[tokio::test]
    async fn test_row_svgs_have_distinct_scopes() {
        let (controller, _) = controller(
            config(),
            MockFetcher::new().json(&format!("{A}/locations"), alexanderplatz()).json(
                &format!("{A}/stops/"),
                json!([
                    {"when": "2024-05-01T12:01:00+02:00", "line": {"name": "U2"}, "direction": "Pankow"},
                    {"when": "2024-05-01T12:03:00+02:00", "line": {"name": "U5"}, "direction": "Hönow"},
                ]),
            ),
        );
        controller.refresh_at(now()).await;

        let frame = controller.frame().await;
        let mut scopes: Vec<&str> = frame
            .rows()
            .iter()
            .flat_map(|row| [&row.line_svg, row.destination.svg(), &row.eta_svg, &row.unit_svg])
            .map(|svg| svg.scope.as_str())
            .collect();
        let total = scopes.len();
        scopes.sort_unstable();
        scopes.dedup();
        assert_eq!(total, 8);
        assert_eq!(scopes.len(), total);
    }

    #[tokio::test]
    async fn test_long_destination_scrolls() {
        let long = "S+U Berlin Hauptbahnhof über Alexanderplatz, Jannowitzbrücke und Ostbahnhof";
        let (controller, _) = controller(
            BoardConfig {
                viewport: Viewport { width: 800.0, height: 480.0 },
                ..config()
            },
            MockFetcher::new().json(&format!("{A}/locations"), alexanderplatz()).json(
                &format!("{A}/stops/"),
                json!([{"when": "2024-05-01T12:02:00+02:00", "line": {"name": "RE1"}, "direction": long}]),
            ),
        );
        controller.refresh_at(now()).await;

        let frame = controller.frame().await;
        let RenderedDestination::Scrolling { svg, total_width, duration_secs } = &frame.rows()[0].destination else {
            panic!("expected a scrolling destination");
        };
        assert!(*total_width > 0.0);
        assert!((duration_secs - total_width / 150.0).abs() < 1e-9);
        assert!(svg.width >= *total_width);
    }

    #[tokio::test]
    async fn test_no_departures_placeholder() {
        let (controller, _) = controller(
            BoardConfig {
                viewport: Viewport { width: 2560.0, height: 480.0 },
                ..config()
            },
            MockFetcher::new().json(&format!("{A}/locations"), alexanderplatz()).json(
                &format!("{A}/stops/"),
                json!([{"when": "2024-05-01T14:00:00+02:00", "line": {"name": "M10"}, "direction": "Turmstr."}]),
            ),
        );

        let outcome = controller.refresh_at(now()).await;
        assert!(matches!(outcome, RefreshOutcome::NoDepartures));
        let frame = controller.frame().await;
        let BoardFrame::NoDepartures { station, placeholder, .. } = &*frame else {
            panic!("expected placeholder frame");
        };
        assert_eq!(station, "S+U Alexanderplatz");
        assert!(placeholder.markup.contains(frame::NO_DEPARTURES_MESSAGE));
        assert!(!controller.state().await.has_error());
    }

    #[tokio::test]
    async fn test_total_outage_shows_network_error() {
        let (controller, _) = controller(
            config(),
            MockFetcher::new()
                .status(&format!("{A}/"), 503)
                .status(&format!("{B}/"), 500),
        );

        let outcome = controller.refresh_at(now()).await;
        assert!(matches!(
            outcome,
            RefreshOutcome::Failed(TransitError::AllSourcesFailed { attempted: 2 })
        ));
        assert_eq!(*controller.frame().await, BoardFrame::network_error());

        let state = controller.state().await;
        assert!(state.has_error());
        assert_eq!(state.last_refresh_at, None);
    }

    #[tokio::test]
    async fn test_falls_back_to_second_endpoint() {
        let (controller, fetcher) = controller(
            config(),
            MockFetcher::new()
                .json(&format!("{A}/locations"), alexanderplatz())
                .json(&format!("{A}/stops/"), json!([]))
                .json(&format!("{B}/locations"), alexanderplatz())
                .json(
                    &format!("{B}/stops/"),
                    json!([
                        {"when": "2024-05-01T12:01:00+02:00", "line": {"name": "U2"}, "direction": "Pankow"},
                        {"when": "2024-05-01T12:02:00+02:00", "line": {"name": "U5"}, "direction": "Hönow"},
                        {"when": "2024-05-01T12:03:00+02:00", "line": {"name": "U8"}, "direction": "Wittenau"},
                    ]),
                ),
        );

        let outcome = controller.refresh_at(now()).await;
        assert!(matches!(outcome, RefreshOutcome::Rendered { rows: 3 }));
        assert!(fetcher.requested(B));
    }

    #[tokio::test]
    async fn test_missing_stop_never_fetches() {
        let (controller, fetcher) = controller(
            BoardConfig {
                stop_query: Some("   ".into()),
                ..config()
            },
            MockFetcher::new(),
        );

        let outcome = controller.refresh_at(now()).await;
        assert!(matches!(outcome, RefreshOutcome::Failed(TransitError::EmptyQuery)));
        assert_eq!(*controller.frame().await, BoardFrame::missing_stop());
        assert!(controller.state().await.has_error());
        assert!(fetcher.requests().is_empty());
        assert!(!controller.is_refreshing());
    }

    #[tokio::test]
    async fn test_refresh_while_loading_is_skipped() {
        let gate = Arc::new(Semaphore::new(0));
        let (controller, _) = controller(
            config(),
            MockFetcher::new()
                .json(&format!("{A}/locations"), alexanderplatz())
                .json(
                    &format!("{A}/stops/"),
                    json!([{"when": "2024-05-01T12:04:00+02:00", "line": {"name": "M10"}, "direction": "Turmstr."}]),
                )
                .gated(gate.clone()),
        );

        let first = tokio::spawn({
            let controller = controller.clone();
            async move { controller.refresh_at(now()).await }
        });
        while !controller.state().await.is_loading() {
            tokio::task::yield_now().await;
        }

        assert!(matches!(controller.refresh_at(now()).await, RefreshOutcome::Skipped));

        gate.add_permits(8);
        let outcome = first.await.unwrap();
        assert!(matches!(outcome, RefreshOutcome::Rendered { rows: 1 }));
        assert!(!controller.is_refreshing());
    }

    #[tokio::test]
    async fn test_set_stop_query() {
        let (controller, _) = controller(config(), MockFetcher::new());

        assert!(!controller.set_stop_query("  ").await);
        assert!(!controller.set_stop_query(" Alexanderplatz ").await);
        assert!(controller.set_stop_query("Zoologischer Garten").await);
        assert_eq!(controller.stop_query().await.as_deref(), Some("Zoologischer Garten"));
    }

    #[tokio::test]
    async fn test_set_viewport() {
        let (controller, _) = controller(config(), MockFetcher::new());
        assert!(!controller.set_viewport(Viewport::default()).await);
        assert!(controller.set_viewport(Viewport { width: 640.0, height: 240.0 }).await);
        assert_eq!(controller.viewport().await.height, 240.0);
    }
}
