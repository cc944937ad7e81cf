//! Ticket and Bill Rendering
//!
//! Turns a job description into one printer byte stream:
//! - Layout: tickets and bills to tagged text lines (or markup)
//! - Codec: text lines to ESC/POS
//! - Raster: markup to a packed monochrome bitmap
//! - Cache: rasterized artifacts keyed by content fingerprint

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod layout;
pub mod pipeline;
pub mod profile;
pub mod raster;
pub mod types;

pub use cache::{CacheCleanupResult, CacheEntry, CacheStats, ContentCache, canonicalize, fingerprint};
pub use config::{BillColumns, CacheSettings, RasterSettings, RenderConfig};
pub use error::{CacheError, RasterFailure, RenderError, RenderResult};
pub use layout::{LayoutEngine, LineRole, TextLine, column_widths, render_markup, wrap_text};
pub use pipeline::RenderPipeline;
pub use profile::{FontSize, FontSizeCodes, MIN_CHARS_PER_LINE, PaperProfile, PaperWidth, ProfileTable};
pub use raster::{DEFAULT_BROWSER, HeadlessBrowser, MarkupRenderer, Rasterizer, RenderedArtifact};
pub use types::*;
