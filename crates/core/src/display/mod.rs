pub mod layout;
pub mod led;
pub mod metrics;

pub use layout::{DestinationLayout, LayoutEngine, LayoutGeometry, LayoutParams, Marquee, RowLayout};
pub use led::{Align, LedRenderer, LedStyle, LedSvg, RenderOptions};
pub use metrics::{FontWeight, GlyphMetrics, TextMeasurer, TextMetrics};
