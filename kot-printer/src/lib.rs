//! # kot-printer
//!
//! ESC/POS device codec for receipt and kitchen printers.
//!
//! ## Scope
//!
//! This crate handles HOW bytes reach the printer:
//! - ESC/POS directive table and command building
//! - Column-width and charset handling (UTF-8 passthrough or GBK)
//! - Monochrome bitmap packing and GS v 0 raster framing
//! - Cut detection and per-model cut selection
//! - Network printing (TCP port 9100)
//!
//! WHAT to print (ticket and bill layouts, rasterizing markup, caching)
//! lives in `kot-render`.
//!
//! ## Example
//!
//! ```ignore
//! use kot_printer::{Charset, EscPosBuilder, NetworkPrinter, Printer, PrinterModel};
//!
//! let mut builder = EscPosBuilder::new(48, Charset::Utf8);
//! builder.center();
//! builder.size(0x11);
//! builder.line("KOT #42");
//! builder.reset_size();
//! builder.divider('=');
//! builder.finish(PrinterModel::Generic, 4);
//!
//! let printer = NetworkPrinter::new("192.168.1.100", 9100)?;
//! printer.print(&builder.build()).await?;
//! ```

mod encoding;
mod error;
mod escpos;
mod printer;
mod raster;

// Re-exports
pub use encoding::{Charset, char_width, pad_left_keep, pad_width, printable, text_width, truncate_width};
pub use error::{PrintError, PrintResult};
pub use escpos::{Align, CutKind, Directive, EscPosBuilder, PrinterModel, contains_cut};
pub use printer::{DEFAULT_PORT, NetworkPrinter, Printer};
pub use raster::{INK_THRESHOLD, RasterImage, is_ink, row_stride};
