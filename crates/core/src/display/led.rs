//! Dot-matrix LED rendering to inline SVG.
//!
//! A grid of radial-gradient lamps covers the whole box. A mask built from
//! the (slightly dilated) glyph outlines keeps only the lamps under the text
//! lit, and a blur/merge filter adds bloom around them.

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::config::BoardConfig;
use crate::display::metrics::FontWeight;

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    /// Anchors on the right edge so numbers line up on their last digit.
    Right,
}

impl Align {
    fn text_anchor(self) -> &'static str {
        match self {
            Align::Left => "start",
            Align::Right => "end",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RenderOptions {
    pub align: Align,
    /// Visible width, independent of the nominal box width.
    pub clip_width: Option<f64>,
}

impl RenderOptions {
    pub fn left(clip_width: f64) -> Self {
        Self {
            align: Align::Left,
            clip_width: Some(clip_width),
        }
    }

    pub fn right(clip_width: f64) -> Self {
        Self {
            align: Align::Right,
            clip_width: Some(clip_width),
        }
    }
}

/// Colors and typeface of the lamps.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedStyle {
    pub font_family: String,
    /// Lamp center
    pub hot_color: String,
    pub glow_color: String,
    /// Lamp rim
    pub edge_color: String,
}

impl Default for LedStyle {
    fn default() -> Self {
        Self {
            font_family: "'Helvetica Neue', Arial, sans-serif".into(),
            hot_color: "#ffe6a3".into(),
            glow_color: "#ffaa00".into(),
            edge_color: "#563800".into(),
        }
    }
}

/// Lamp geometry derived from the row height.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LampGrid {
    pub pitch: u32,
    pub radius: u32,
    pub padding: u32,
}

impl LampGrid {
    pub fn for_height(height: f64, led_scale: f64) -> Self {
        let base_pitch = (height / 10.0).floor().max(4.0);
        let pitch = (base_pitch * led_scale).floor().max(3.0) as u32;
        let radius = ((pitch as f64 * 0.40).floor() as u32).max(2);
        let padding = (pitch as f64 * 0.85).floor() as u32;
        Self {
            pitch,
            radius,
            padding,
        }
    }

    pub fn dilation_radius(&self) -> u32 {
        (self.radius as f64 * 0.28).floor() as u32
    }

    pub fn blur_deviation(&self) -> f64 {
        (self.radius as f64 * 0.28).max(0.4)
    }
}

/// A rendered, self-contained SVG fragment.
#[derive(Clone, Debug, PartialEq)]
pub struct LedSvg {
    pub markup: String,
    pub width: f64,
    pub height: f64,
    /// Prefix of every element id inside `markup`.
    pub scope: String,
}

impl fmt::Display for LedSvg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.markup)
    }
}

/// Shared by every renderer, so ids never repeat within a process.
static NEXT_SCOPE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug)]
pub struct LedRenderer {
    style: LedStyle,
    led_scale: f64,
    attenuate_glow: f64,
    text_boost: f64,
}

impl LedRenderer {
    pub fn new(style: LedStyle, led_scale: f64, attenuate_glow: f64, text_boost: f64) -> Self {
        Self {
            style,
            led_scale,
            attenuate_glow,
            text_boost,
        }
    }

    pub fn from_config(config: &BoardConfig) -> Self {
        Self::new(
            config.led_style.clone(),
            config.led_scale,
            config.attenuate_glow,
            config.text_boost,
        )
    }

    pub fn glow(&self) -> f64 {
        self.attenuate_glow.clamp(0.4, 1.0)
    }

    /// Render with a fresh id scope.
    pub fn render(
        &self,
        text: &str,
        width: f64,
        height: f64,
        font_size: f64,
        options: RenderOptions,
    ) -> LedSvg {
        let scope = format!("led-{}", NEXT_SCOPE.fetch_add(1, Ordering::Relaxed));
        self.render_scoped(&scope, text, width, height, font_size, options)
    }

    /// Render with a caller-supplied id scope. Output depends only on the
    /// arguments and the renderer settings.
    pub fn render_scoped(
        &self,
        scope: &str,
        text: &str,
        width: f64,
        height: f64,
        font_size: f64,
        options: RenderOptions,
    ) -> LedSvg {
        let grid = LampGrid::for_height(height, self.led_scale);
        let padding = grid.padding as f64;
        let glyph_size = (font_size * self.text_boost).floor();
        let clip_width = options.clip_width.unwrap_or(width - padding * 2.0).max(10.0);
        let (text_x, clip_x) = match options.align {
            Align::Left => (padding, 0.0),
            Align::Right => (width - padding, width - clip_width - padding),
        };
        let baseline = height * 0.72;
        let style = &self.style;

        let markup = format!(
            concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {width} {height}" width="{width}" height="{height}" preserveAspectRatio="xMidYMid meet" style="display:block">"#,
                "<defs>",
                r#"<pattern id="{scope}-dots" patternUnits="userSpaceOnUse" width="{pitch}" height="{pitch}">"#,
                r#"<radialGradient id="{scope}-g" cx="50%" cy="50%" r="50%">"#,
                r#"<stop offset="0%" stop-color="{hot}"/>"#,
                r#"<stop offset="55%" stop-color="{glow_color}"/>"#,
                r#"<stop offset="100%" stop-color="{edge}"/>"#,
                "</radialGradient>",
                r#"<circle cx="{r}" cy="{r}" r="{r}" fill="url(#{scope}-g)"/>"#,
                "</pattern>",
                r#"<filter id="{scope}-dilate"><feMorphology operator="dilate" radius="{dilate}"/></filter>"#,
                r#"<filter id="{scope}-glow" x="-12%" y="-12%" width="124%" height="124%">"#,
                r#"<feGaussianBlur stdDeviation="{blur}" result="b"/>"#,
                r#"<feComponentTransfer><feFuncA type="linear" slope="{glow}"/></feComponentTransfer>"#,
                r#"<feMerge><feMergeNode in="b"/><feMergeNode in="SourceGraphic"/></feMerge>"#,
                "</filter>",
                r#"<clipPath id="{scope}-clip"><rect x="{clip_x}" y="0" width="{clip_width}" height="{height}"/></clipPath>"#,
                r#"<mask id="{scope}-mask"><rect width="100%" height="100%" fill="black"/>"#,
                r#"<g filter="url(#{scope}-dilate)" clip-path="url(#{scope}-clip)">"#,
                r#"<text x="{x}" y="{y}" text-anchor="{anchor}" font-family="{family}" font-weight="{weight}" font-size="{size}" fill="white" letter-spacing="-0.01em">{text}</text>"#,
                "</g></mask></defs>",
                r#"<rect width="100%" height="100%" fill="url(#{scope}-dots)" mask="url(#{scope}-mask)" filter="url(#{scope}-glow)"/>"#,
                "</svg>",
            ),
            width = width,
            height = height,
            scope = scope,
            pitch = grid.pitch,
            hot = style.hot_color,
            glow_color = style.glow_color,
            edge = style.edge_color,
            r = grid.radius,
            dilate = grid.dilation_radius(),
            blur = grid.blur_deviation(),
            glow = self.glow(),
            clip_x = clip_x,
            clip_width = clip_width,
            x = text_x,
            y = baseline,
            anchor = options.align.text_anchor(),
            family = escape_attribute(&style.font_family),
            weight = FontWeight::Heavy.css_weight(),
            size = glyph_size,
            text = escape_text(text),
        );

        LedSvg {
            markup,
            width,
            height,
            scope: scope.to_owned(),
        }
    }
}

/// Escape `&`, `<` and `>` for embedding in SVG/HTML text content.
pub fn escape_text(text: &str) -> Cow<'_, str> {
    if !text.contains(['&', '<', '>']) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

fn escape_attribute(text: &str) -> Cow<'_, str> {
    match escape_text(text) {
        Cow::Borrowed(t) if !t.contains('"') => Cow::Borrowed(t),
        escaped => Cow::Owned(escaped.replace('"', "&quot;")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> LedRenderer {
        LedRenderer::new(LedStyle::default(), 0.7, 0.9, 1.21)
    }

    #[test]
    fn test_lamp_grid_from_height() {
        // floor(80 / 10) = 8, floor(8 * 0.7) = 5
        let grid = LampGrid::for_height(80.0, 0.7);
        assert_eq!(grid, LampGrid { pitch: 5, radius: 2, padding: 4 });
        assert_eq!(grid.dilation_radius(), 0);
        assert_eq!(grid.blur_deviation(), 0.56);

        // Small rows fall back to the minimum pitch
        let small = LampGrid::for_height(20.0, 0.7);
        assert_eq!(small.pitch, 3);
        assert_eq!(small.radius, 2);

        let large = LampGrid::for_height(300.0, 1.0);
        assert_eq!(large, LampGrid { pitch: 30, radius: 12, padding: 25 });
        assert_eq!(large.dilation_radius(), 3);
    }

    #[test]
    fn test_glow_is_clamped() {
        assert_eq!(LedRenderer::new(LedStyle::default(), 0.7, 0.1, 1.21).glow(), 0.4);
        assert_eq!(LedRenderer::new(LedStyle::default(), 0.7, 3.0, 1.21).glow(), 1.0);
        assert_eq!(renderer().glow(), 0.9);
    }

    #[test]
    fn test_render_left_aligned() {
        let svg = renderer().render_scoped("row", "Turmstr.", 300.0, 80.0, 62.0, RenderOptions::left(298.0));
        let markup = &svg.markup;

        assert!(markup.starts_with("<svg "));
        assert!(markup.ends_with("</svg>"));
        assert!(markup.contains(r#"viewBox="0 0 300 80""#));
        assert!(markup.contains(r#"<pattern id="row-dots" patternUnits="userSpaceOnUse" width="5" height="5">"#));
        assert!(markup.contains(r#"<circle cx="2" cy="2" r="2" fill="url(#row-g)"/>"#));
        assert!(markup.contains(r#"stdDeviation="0.56""#));
        assert!(markup.contains(r#"slope="0.9""#));
        assert!(markup.contains(r#"<rect x="0" y="0" width="298" height="80"/>"#));
        // floor(62 * 1.21) = 75
        assert!(markup.contains(r#"<text x="4" y=""#));
        assert!(markup.contains(r#"text-anchor="start""#));
        assert!(markup.contains(r#"font-size="75""#));
        assert!(markup.contains(">Turmstr.</text>"));
    }

    #[test]
    fn test_render_right_aligned() {
        let svg = renderer().render_scoped("eta", "12", 100.0, 80.0, 62.0, RenderOptions::right(98.0));
        // x = width - padding, clip = width - clip - padding
        assert!(svg.markup.contains(r#"<text x="96" "#));
        assert!(svg.markup.contains(r#"text-anchor="end""#));
        assert!(svg.markup.contains(r#"<rect x="-2" y="0" width="98" height="80"/>"#));
    }

    #[test]
    fn test_default_clip_width() {
        let svg = renderer().render_scoped("c", "A", 100.0, 80.0, 62.0, RenderOptions::default());
        // 100 - 2 * 4
        assert!(svg.markup.contains(r#"width="92" height="80"/></clipPath>"#));

        let narrow = renderer().render_scoped("c", "A", 12.0, 80.0, 62.0, RenderOptions::default());
        assert!(narrow.markup.contains(r#"width="10" height="80"/></clipPath>"#));
    }

    #[test]
    fn test_text_is_escaped() {
        let svg = renderer().render_scoped("x", "S+U <Hbf> & Co", 300.0, 80.0, 62.0, RenderOptions::default());
        assert!(svg.markup.contains(">S+U &lt;Hbf&gt; &amp; Co</text>"));
        assert_eq!(escape_text("Turmstr."), Cow::Borrowed("Turmstr."));
    }

    #[test]
    fn test_scoped_render_is_reproducible() {
        let a = renderer().render_scoped("golden", "M10", 60.0, 80.0, 62.0, RenderOptions::left(52.0));
        let b = renderer().render_scoped("golden", "M10", 60.0, 80.0, 62.0, RenderOptions::left(52.0));
        assert_eq!(a, b);
    }

    #[test]
    fn test_each_render_gets_unique_scope() {
        let renderer = renderer();
        let first = renderer.render("M10", 60.0, 80.0, 62.0, RenderOptions::default());
        let second = renderer.render("M10", 60.0, 80.0, 62.0, RenderOptions::default());

        assert_ne!(first.scope, second.scope);
        assert!(second.markup.contains(&format!(r#"id="{}-dots""#, second.scope)));
        assert!(!second.markup.contains(&format!(r#"id="{}-dots""#, first.scope)));
    }

    #[test]
    fn test_separate_renderers_never_share_scopes() {
        let board = renderer();
        let page = renderer();
        let first = board.render("M10", 60.0, 80.0, 62.0, RenderOptions::default());
        let second = page.render("M10", 60.0, 80.0, 62.0, RenderOptions::default());

        assert_ne!(first.scope, second.scope);
    }
}
