//! ESC/POS directive table and command builder
//!
//! Every control sequence the renderers emit comes from [`Directive`], so the
//! byte values live in exactly one place.

use serde::{Deserialize, Serialize};

use crate::encoding::{Charset, printable, text_width};
use crate::raster::RasterImage;

const ESC: u8 = 0x1B;
const GS: u8 = 0x1D;

/// Horizontal alignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

/// Paper cut variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutKind {
    /// GS V 0
    Full,
    /// GS V 1 - leaves a small connection
    Partial,
    /// GS V 66 n - feed n lines, then full cut
    FeedThenFull(u8),
}

/// Closed set of printer directives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// ESC @
    Init,
    /// ESC a n
    Align(Align),
    /// ESC E n
    Bold(bool),
    /// GS ! n - character size code taken from the paper profile
    Size(u8),
    /// ESC d n - print and feed n lines
    Feed(u8),
    /// GS V ...
    Cut(CutKind),
    /// ESC B n t - buzzer, `times` beeps of `duration` x 100ms
    Beep { times: u8, duration: u8 },
    /// GS v 0 m - raster bit image, normal density
    RasterImage,
}

impl Directive {
    /// Fixed byte sequence for this directive
    pub fn bytes(self) -> Vec<u8> {
        match self {
            Directive::Init => vec![ESC, 0x40],
            Directive::Align(Align::Left) => vec![ESC, 0x61, 0x00],
            Directive::Align(Align::Center) => vec![ESC, 0x61, 0x01],
            Directive::Align(Align::Right) => vec![ESC, 0x61, 0x02],
            Directive::Bold(on) => vec![ESC, 0x45, on as u8],
            Directive::Size(code) => vec![GS, 0x21, code],
            Directive::Feed(lines) => vec![ESC, 0x64, lines],
            Directive::Cut(CutKind::Full) => vec![GS, 0x56, 0x00],
            Directive::Cut(CutKind::Partial) => vec![GS, 0x56, 0x01],
            Directive::Cut(CutKind::FeedThenFull(lines)) => vec![GS, 0x56, 0x42, lines],
            Directive::Beep { times, duration } => vec![ESC, 0x42, times, duration],
            Directive::RasterImage => vec![GS, 0x76, 0x30, 0x00],
        }
    }
}

/// Declared printer model, each with exactly one cut command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinterModel {
    /// Explicit line feed, then GS V 0
    #[default]
    Generic,
    /// GS V 66 n: the printer manages the cutter-to-head distance itself
    Epson,
    /// Explicit line feed, then GS V 1
    PartialCut,
}

impl PrinterModel {
    /// Parse a model name as used in configuration
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" => Some(Self::Generic),
            "epson" => Some(Self::Epson),
            "partial_cut" | "partial" => Some(Self::PartialCut),
            _ => None,
        }
    }

    /// Directives that close a job: clear the head, then cut once
    pub fn closing_directives(self, feed_lines: u8) -> Vec<Directive> {
        match self {
            PrinterModel::Generic => vec![Directive::Feed(feed_lines), Directive::Cut(CutKind::Full)],
            PrinterModel::Epson => vec![Directive::Cut(CutKind::FeedThenFull(feed_lines))],
            PrinterModel::PartialCut => {
                vec![Directive::Feed(feed_lines), Directive::Cut(CutKind::Partial)]
            }
        }
    }
}

/// Scan a byte stream for any known cut sequence
///
/// Recognises GS V 0/1/48/49 and GS V 65/66 n.
pub fn contains_cut(bytes: &[u8]) -> bool {
    bytes.windows(3).enumerate().any(|(i, w)| {
        if w[0] != GS || w[1] != 0x56 {
            return false;
        }
        match w[2] {
            0x00 | 0x01 | 0x30 | 0x31 => true,
            0x41 | 0x42 => i + 3 < bytes.len(),
            _ => false,
        }
    })
}

/// ESC/POS command builder
///
/// Builds ESC/POS byte sequences for thermal printers. Text is encoded
/// with the builder's charset as it is written, so raster payloads and
/// command bytes are never touched by the text encoder.
pub struct EscPosBuilder {
    buf: Vec<u8>,
    width: usize,
    charset: Charset,
    has_cut: bool,
}

impl EscPosBuilder {
    /// Create a new builder with the specified paper width in characters
    pub fn new(width: usize, charset: Charset) -> Self {
        let mut buf = Vec::with_capacity(4096);
        buf.extend_from_slice(&Directive::Init.bytes());
        buf.extend_from_slice(charset.preamble());
        Self {
            buf,
            width,
            charset,
            has_cut: false,
        }
    }

    /// Get the configured paper width
    pub fn width(&self) -> usize {
        self.width
    }

    /// Whether a cut has already been written
    pub fn has_cut(&self) -> bool {
        self.has_cut
    }

    /// Emit one directive
    pub fn directive(&mut self, d: Directive) -> &mut Self {
        if matches!(d, Directive::Cut(_)) {
            self.has_cut = true;
        }
        self.buf.extend_from_slice(&d.bytes());
        self
    }

    // === Text Output ===

    /// Write text in the builder's charset, control characters blanked
    pub fn text(&mut self, s: &str) -> &mut Self {
        let encoded = self.charset.encode(&printable(s));
        self.buf.extend_from_slice(&encoded);
        self
    }

    /// Write text followed by newline
    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(b'\n');
        self
    }

    /// Write empty line
    pub fn newline(&mut self) -> &mut Self {
        self.buf.push(b'\n');
        self
    }

    /// Print and feed n lines
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        self.directive(Directive::Feed(lines))
    }

    // === Alignment ===

    pub fn align(&mut self, align: Align) -> &mut Self {
        self.directive(Directive::Align(align))
    }

    pub fn center(&mut self) -> &mut Self {
        self.align(Align::Center)
    }

    pub fn left(&mut self) -> &mut Self {
        self.align(Align::Left)
    }

    // === Text Style ===

    pub fn bold(&mut self) -> &mut Self {
        self.directive(Directive::Bold(true))
    }

    pub fn bold_off(&mut self) -> &mut Self {
        self.directive(Directive::Bold(false))
    }

    /// Select character size (GS ! n)
    pub fn size(&mut self, code: u8) -> &mut Self {
        self.directive(Directive::Size(code))
    }

    /// Reset to normal size
    pub fn reset_size(&mut self) -> &mut Self {
        self.directive(Directive::Size(0x00))
    }

    // === Separators ===

    /// Print a full-width run of one character
    pub fn divider(&mut self, ch: char) -> &mut Self {
        let run: String = std::iter::repeat_n(ch, self.width).collect();
        self.line(&run)
    }

    // === Layout Helpers ===

    /// Print left and right text on the same line
    ///
    /// Left text is left-aligned, right text is right-aligned,
    /// with spaces filling the gap.
    pub fn line_lr(&mut self, left: &str, right: &str) -> &mut Self {
        let lw = text_width(left);
        let rw = text_width(right);

        if lw + rw >= self.width {
            self.text(left);
            self.text(" ");
            self.line(right)
        } else {
            let spaces = self.width - lw - rw;
            self.text(left);
            self.text(&" ".repeat(spaces));
            self.line(right)
        }
    }

    // === Peripherals ===

    /// Sound the buzzer
    pub fn beep(&mut self, times: u8, duration: u8) -> &mut Self {
        self.directive(Directive::Beep { times, duration })
    }

    // === Images ===

    /// Write a framed raster image (GS v 0) followed by a line feed
    pub fn raster(&mut self, image: &RasterImage) -> &mut Self {
        self.buf.extend_from_slice(&image.frame());
        self.buf.push(b'\n');
        self
    }

    // === Raw Commands ===

    /// Write raw bytes directly
    ///
    /// Raw content is scanned for cut sequences so a pre-cut payload is
    /// never cut twice.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        if contains_cut(bytes) {
            self.has_cut = true;
        }
        self.buf.extend_from_slice(bytes);
        self
    }

    // === Build ===

    /// Close the job: feed and cut exactly once, using the model's cut
    ///
    /// Skipped when the content already carries a cut.
    pub fn finish(&mut self, model: PrinterModel, feed_lines: u8) -> &mut Self {
        if self.has_cut {
            tracing::debug!("content already contains a cut, not appending another");
            return self;
        }
        for d in model.closing_directives(feed_lines) {
            self.directive(d);
        }
        self
    }

    /// Build the final byte buffer
    pub fn build(mut self) -> Vec<u8> {
        self.buf.extend_from_slice(self.charset.epilogue());
        self.buf
    }
}

impl Default for EscPosBuilder {
    fn default() -> Self {
        Self::new(48, Charset::Utf8)
    }
}
