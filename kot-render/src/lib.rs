//! # kot-render
//!
//! Rendering core of the kitchen/bill print agent.
//!
//! ```text
//! kot-render/src/
//! ├── printing/      # layout, codec, rasterizer, content cache, pipeline
//! ├── core/          # agent configuration
//! └── utils/         # logging, money formatting
//! ```
//!
//! A job (`ticket` or `bill`, paper width, `text` or `image` mode) goes in,
//! one opaque ESC/POS byte stream comes out. Delivery is `kot-printer`'s
//! `NetworkPrinter`.

pub mod core;
pub mod printing;
pub mod utils;

pub use crate::core::AgentConfig;
pub use printing::{
    ContentCache, ContentType, HeadlessBrowser, Job, MarkupRenderer, PaperWidth, Rasterizer,
    RenderConfig, RenderError, RenderMode, RenderPipeline, RenderResult, RenderedArtifact,
};
pub use utils::logger::{cleanup_old_logs, init_logger, init_logger_with_file};
