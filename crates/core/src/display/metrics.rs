//! Text measurement and fitting.
//!
//! Widths come from a per-glyph-class em model instead of a rasterized font,
//! so measurement is deterministic and needs no font files. Anything that
//! measures more precisely can be plugged in through [`TextMeasurer`].

use std::sync::Arc;

use unicode_segmentation::UnicodeSegmentation;

/// Default share of the available height used as font size.
pub const DEFAULT_FONT_FACTOR: f64 = 0.78;

/// Smallest font size the board will use.
pub const MIN_FONT_SIZE: f64 = 10.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum FontWeight {
    Regular,
    Bold,
    #[default]
    Heavy,
}

impl FontWeight {
    /// CSS numeric weight
    pub fn css_weight(self) -> u16 {
        match self {
            FontWeight::Regular => 400,
            FontWeight::Bold => 700,
            FontWeight::Heavy => 900,
        }
    }

    fn widening(self) -> f64 {
        match self {
            FontWeight::Regular => 1.0,
            FontWeight::Bold => 1.04,
            FontWeight::Heavy => 1.08,
        }
    }
}

/// Measures the rendered width of a string.
///
/// Implementations must be deterministic and monotone: a prefix never
/// measures wider than the full string.
pub trait TextMeasurer: Send + Sync {
    fn measure(&self, text: &str, size: f64, weight: FontWeight) -> f64;
}

/// Em-width model of a heavy proportional sans-serif face.
#[derive(Clone, Copy, Debug, Default)]
pub struct GlyphMetrics;

impl TextMeasurer for GlyphMetrics {
    fn measure(&self, text: &str, size: f64, weight: FontWeight) -> f64 {
        let em_sum: f64 = text.chars().map(glyph_em_width).sum();
        em_sum * size * weight.widening()
    }
}

fn glyph_em_width(ch: char) -> f64 {
    match ch {
        ' ' | '\u{00A0}' => 0.28,
        '\t' => 1.12,
        'i' | 'l' | 'I' | 'j' | '|' | '!' => 0.26,
        '.' | ',' | ':' | ';' | '\'' | '"' | '`' => 0.26,
        '-' | '\u{2010}'..='\u{2013}' => 0.36,
        '\u{2014}' => 1.0,
        '(' | ')' | '[' | ']' | '{' | '}' | '/' => 0.33,
        'f' | 't' | 'r' => 0.36,
        'm' | 'w' | 'M' | 'W' | '@' | '%' => 0.86,
        '&' | '#' | 'ß' => 0.66,
        c if c.is_ascii_digit() => 0.56,
        c if c.is_ascii_uppercase() => 0.68,
        c if c.is_ascii_lowercase() => 0.56,
        c if c.is_whitespace() => 0.28,
        c if c.is_ascii_punctuation() => 0.44,
        // Combining marks sit on the previous glyph
        '\u{0300}'..='\u{036F}' => 0.0,
        // CJK, emoji and other wide symbols
        c if (c as u32) >= 0x2E80 => 1.0,
        c if c.is_uppercase() => 0.68,
        _ => 0.58,
    }
}

/// Measuring, sizing and truncation on top of a [`TextMeasurer`].
#[derive(Clone)]
pub struct TextMetrics {
    measurer: Arc<dyn TextMeasurer>,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self::new(GlyphMetrics)
    }
}

impl std::fmt::Debug for TextMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextMetrics").finish_non_exhaustive()
    }
}

impl TextMetrics {
    pub fn new(measurer: impl TextMeasurer + 'static) -> Self {
        Self {
            measurer: Arc::new(measurer),
        }
    }

    /// Width at the board's default (heavy) weight.
    pub fn measure_width(&self, text: &str, size: f64) -> f64 {
        self.measure_width_with(text, size, FontWeight::Heavy)
    }

    pub fn measure_width_with(&self, text: &str, size: f64, weight: FontWeight) -> f64 {
        self.measurer.measure(text, size, weight)
    }

    /// `floor(available_height * factor)`, at least [`MIN_FONT_SIZE`].
    pub fn font_size_for(available_height: f64, factor: f64) -> f64 {
        (available_height * factor).floor().max(MIN_FONT_SIZE)
    }

    /// Longest prefix of `text` (in grapheme clusters) that fits `max_width`.
    ///
    /// Returns `text` itself when it fits. Otherwise binary-searches the prefix
    /// length, using at most `ceil(log2(len))` further measurements.
    pub fn truncate_to_width<'t>(&self, text: &'t str, size: f64, max_width: f64) -> &'t str {
        if self.measure_width(text, size) <= max_width {
            return text;
        }

        let ends: Vec<usize> = text
            .grapheme_indices(true)
            .map(|(start, grapheme)| start + grapheme.len())
            .collect();
        let prefix = |count: usize| match count {
            0 => "",
            n => &text[..ends[n - 1]],
        };

        // Invariant: prefix(low) is the best known fit, prefix(high + 1) overflows.
        let mut low = 0;
        let mut high = ends.len().saturating_sub(1);
        while low < high {
            let mid = (low + high).div_ceil(2);
            if self.measure_width(prefix(mid), size) <= max_width {
                low = mid;
            } else {
                high = mid - 1;
            }
        }

        prefix(low)
    }
}
