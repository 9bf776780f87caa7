//! HTML document around the rendered board.

use std::fmt;

use led_board_core::board::{BoardFrame, RenderedDestination, RenderedRow};
use led_board_core::config::Viewport;
use led_board_core::display::layout::LayoutGeometry;
use led_board_core::display::led::escape_text;

const STYLE: &str = r#"
:root { color-scheme: dark; }
body { margin: 0; background: #000; color: #ffaa00; font-family: 'Helvetica Neue', Arial, sans-serif; }
.station { padding: 8px 12px; font-size: 18px; letter-spacing: 0.05em; text-transform: uppercase; }
.controls { display: flex; gap: 6px; padding: 0 12px 8px; }
.controls input { flex: 1; background: #111; color: inherit; border: 1px solid #563800; padding: 4px 8px; }
.controls button { background: #563800; color: #ffe6a3; border: 0; padding: 4px 12px; }
.board { background: #050302; overflow: hidden; }
.departure-row { display: flex; gap: 3px; align-items: center; overflow: hidden; }
.departure-row__line, .departure-row__eta { flex: none; display: flex; }
.departure-row__destination { flex: none; position: relative; overflow: hidden; }
.scrolling-content { width: max-content; animation-name: marquee; animation-timing-function: linear; animation-iteration-count: infinite; }
@keyframes marquee { from { transform: translateX(0); } to { transform: translateX(var(--scroll-distance)); } }
.arriving-now { animation: blink 0.6s steps(2, start) infinite; }
@keyframes blink { to { visibility: hidden; } }
.led-message { padding: 24px; font-size: 28px; font-weight: 900; text-align: center; white-space: pre-line; }
.led-message--error { color: #ff5a36; }
"#;

const SCRIPT: &str = r#"
const input = document.getElementById('stop');
const list = document.getElementById('stop-suggestions');
input.addEventListener('input', () => {
  fetch('/suggestions?q=' + encodeURIComponent(input.value))
    .then(r => r.json())
    .then(result => {
      if (result.superseded) return;
      list.replaceChildren(...result.suggestions.map(s => Object.assign(document.createElement('option'), { value: s.name })));
    });
});
async function post(path, body) {
  await fetch(path, { method: 'POST', headers: { 'Content-Type': 'application/json' }, body: JSON.stringify(body) });
  location.reload();
}
document.getElementById('controls').addEventListener('submit', e => {
  e.preventDefault();
  if (input.value.trim()) post('/stop', { stop: input.value.trim() });
});
const board = document.getElementById('board');
const reported = { width: Number(document.body.dataset.width), height: Number(document.body.dataset.height) };
const size = { width: Math.floor(window.innerWidth), height: Math.floor(window.innerHeight - board.offsetTop) };
if (size.width > 0 && size.height > 0 && (size.width !== reported.width || size.height !== reported.height)) {
  post('/viewport', size);
}
"#;

/// Complete document, reloading itself every `refresh_secs`.
///
/// The page reports its size back through `POST /viewport` when it differs
/// from `viewport`.
pub fn render_page(frame: &BoardFrame, stop_query: Option<&str>, viewport: Viewport, refresh_secs: u64) -> String {
    Page {
        frame,
        stop_query,
        viewport,
        refresh_secs,
    }
    .to_string()
}

/// The `#board` element alone.
pub fn render_board(frame: &BoardFrame) -> String {
    Board(frame).to_string()
}

struct Page<'a> {
    frame: &'a BoardFrame,
    stop_query: Option<&'a str>,
    viewport: Viewport,
    refresh_secs: u64,
}

impl fmt::Display for Page<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let station = self.frame.station().or(self.stop_query).unwrap_or("");
        write!(
            f,
            concat!(
                "<!DOCTYPE html>\n",
                r#"<html lang="de"><head><meta charset="utf-8">"#,
                r#"<meta name="viewport" content="width=device-width, initial-scale=1">"#,
                r#"<meta http-equiv="refresh" content="{refresh}">"#,
                "<title>{title}</title><style>{style}</style></head>",
                r#"<body data-width="{width}" data-height="{height}">"#,
                r#"<header class="station">{station}</header>"#,
                r#"<form class="controls" id="controls">"#,
                r#"<input id="stop" list="stop-suggestions" autocomplete="off" placeholder="Haltestelle · Stop" value="{query}">"#,
                r#"<datalist id="stop-suggestions"></datalist><button type="submit">OK</button></form>"#,
            ),
            refresh = self.refresh_secs,
            title = escape_text(if station.is_empty() { "Abfahrten" } else { station }),
            style = STYLE,
            width = self.viewport.width,
            height = self.viewport.height,
            station = escape_text(station),
            query = escape_attribute(self.stop_query.unwrap_or("")),
        )?;
        write!(f, "{}<script>{SCRIPT}</script></body></html>", Board(self.frame))
    }
}

struct Board<'a>(&'a BoardFrame);

impl fmt::Display for Board<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(r#"<div class="board" id="board">"#)?;

        match self.0 {
            BoardFrame::Blank => {}
            BoardFrame::Rows { geometry, rows, .. } => {
                for row in rows {
                    write_row(f, row, geometry)?;
                }
            }
            BoardFrame::NoDepartures {
                geometry, placeholder, ..
            } => {
                write!(
                    f,
                    concat!(
                        r#"<div class="departure-row" style="height:{row}px">"#,
                        r#"<div class="departure-row__line" style="width:{line}px"></div>"#,
                        r#"<div class="departure-row__destination" style="width:{dest}px">{svg}</div>"#,
                        "</div>",
                    ),
                    row = geometry.row_height,
                    line = geometry.line_column_width,
                    dest = geometry.destination_width,
                    svg = placeholder,
                )?;
            }
            BoardFrame::Message { lines, is_error } => {
                let class = if *is_error { "led-message led-message--error" } else { "led-message" };
                let text: Vec<_> = lines.iter().map(|line| escape_text(line)).collect();
                write!(f, r#"<div class="{class}">{}</div>"#, text.join("\n"))?;
            }
        }

        f.write_str("</div>")
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, row: &RenderedRow, geometry: &LayoutGeometry) -> fmt::Result {
    let class = if row.arriving_now { "departure-row arriving-now" } else { "departure-row" };
    write!(
        f,
        concat!(
            r#"<div class="{class}" style="height:{row}px" title="{title}">"#,
            r#"<div class="departure-row__line" style="width:{line}px">{line_svg}</div>"#,
        ),
        class = class,
        row = geometry.row_height,
        title = escape_attribute(&format!("{} {}", row.line, row.direction)),
        line = geometry.line_column_width,
        line_svg = row.line_svg,
    )?;

    match &row.destination {
        RenderedDestination::Static(svg) => write!(
            f,
            r#"<div class="departure-row__destination" style="width:{}px">{svg}</div>"#,
            geometry.destination_width
        )?,
        RenderedDestination::Scrolling {
            svg,
            total_width,
            duration_secs,
        } => write!(
            f,
            concat!(
                r#"<div class="departure-row__destination scrollable" style="width:{dest}px">"#,
                r#"<div class="scrolling-content" style="--scroll-distance:-{distance}px;animation-duration:{duration:.2}s">{svg}</div>"#,
                "</div>",
            ),
            dest = geometry.destination_width,
            distance = total_width,
            duration = duration_secs,
            svg = svg,
        )?,
    }

    write!(
        f,
        concat!(
            r#"<div class="departure-row__eta" style="width:{eta}px">"#,
            "<div>{number}</div><div>{unit}</div></div></div>",
        ),
        eta = geometry.eta_column_width,
        number = row.eta_svg,
        unit = row.unit_svg,
    )
}

fn escape_attribute(text: &str) -> String {
    escape_text(text).replace('"', "&quot;")
}
