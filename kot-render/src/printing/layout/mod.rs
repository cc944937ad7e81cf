//! Layout engine
//!
//! Maps a ticket or bill plus a paper profile onto an ordered list of
//! [`TextLine`]s. Text mode feeds those lines to the ESC/POS codec; image
//! mode renders the same lines into HTML for the rasterizer. Both modes
//! share this one code path, the render mode only picks the sink.

mod bill;
mod markup;
mod ticket;

use kot_printer::{Align, char_width, pad_left_keep, pad_width, printable, text_width};

use super::config::RenderConfig;
use super::error::RenderResult;
use super::profile::{FontSize, PaperProfile};
use super::types::JobContent;

pub use markup::render_markup;

/// What a line is, for the markup sink and for inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineRole {
    Title,
    Header,
    Divider,
    ColumnHeader,
    Item,
    ItemContinuation,
    Summary,
    Total,
    Note,
    Footer,
}

/// One rendered line with its directives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
    pub text: String,
    pub align: Align,
    pub size: FontSize,
    pub bold: bool,
    pub role: LineRole,
}

impl TextLine {
    /// Control characters in `text` are blanked, for both sinks
    pub fn new(text: impl Into<String>, role: LineRole) -> Self {
        let text = text.into();
        Self {
            text: printable(&text).into_owned(),
            align: Align::Left,
            size: FontSize::Normal,
            bold: false,
            role,
        }
    }

    pub fn centered(mut self) -> Self {
        self.align = Align::Center;
        self
    }

    pub fn sized(mut self, size: FontSize) -> Self {
        self.size = size;
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }
}

/// Ratio-based layout over one paper profile
pub struct LayoutEngine<'a> {
    config: &'a RenderConfig,
    profile: &'a PaperProfile,
}

impl<'a> LayoutEngine<'a> {
    /// Validates the profile; a malformed profile is a configuration error
    pub fn new(config: &'a RenderConfig, profile: &'a PaperProfile) -> RenderResult<Self> {
        profile.validate()?;
        Ok(Self { config, profile })
    }

    pub fn profile(&self) -> &PaperProfile {
        self.profile
    }

    pub fn layout(&self, content: &JobContent) -> Vec<TextLine> {
        match content {
            JobContent::Ticket(ticket) => self.ticket(ticket),
            JobContent::Bill(bill) => self.bill(bill),
        }
    }

    /// Characters available at a font size
    fn width_at(&self, size: FontSize) -> usize {
        self.profile.chars_at(size)
    }

    fn divider(&self, ch: char) -> TextLine {
        let run: String = std::iter::repeat_n(ch, self.profile.chars_per_line).collect();
        TextLine::new(run, LineRole::Divider)
    }

    /// Word-wrapped lines of one block, each tagged the same way
    fn wrapped(&self, text: &str, size: FontSize, role: LineRole) -> Vec<TextLine> {
        wrap_text(text, self.width_at(size))
            .into_iter()
            .map(|t| TextLine::new(t, role).sized(size))
            .collect()
    }

    /// Left and right text on one line, gap filled with spaces
    fn pair(&self, left: &str, right: &str, size: FontSize, role: LineRole) -> TextLine {
        let width = self.width_at(size);
        let lw = text_width(left);
        let rw = text_width(right);
        let text = if lw + rw >= width {
            format!("{} {}", left, right)
        } else {
            format!("{}{}{}", left, " ".repeat(width - lw - rw), right)
        };
        TextLine::new(text, role).sized(size)
    }

    /// Header field with a right-hand value; when both do not fit, the
    /// field wraps and the value gets its own right-aligned line
    fn header_pair(&self, left: &str, right: &str) -> Vec<TextLine> {
        let width = self.width_at(FontSize::Normal);
        if text_width(left) + text_width(right) < width {
            return vec![self.pair(left, right, FontSize::Normal, LineRole::Header)];
        }
        let mut lines = self.wrapped(left, FontSize::Normal, LineRole::Header);
        if !right.trim().is_empty() {
            lines.extend(
                wrap_text(right, width)
                    .into_iter()
                    .map(|t| TextLine::new(pad_left_keep(&t, width), LineRole::Header)),
            );
        }
        lines
    }
}

/// Word-wrap to a cell width
///
/// Greedy on whitespace-separated words; a single word longer than the
/// width is hard-split. Always returns at least one (possibly empty) line.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0;

    for word in text.split_whitespace() {
        let word_width = text_width(word);

        if word_width > width {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0;
            }
            // Only the tail piece can share a line with the next word
            let mut pieces = hard_split(word, width);
            if let Some(tail) = pieces.pop() {
                lines.extend(pieces);
                current_width = text_width(&tail);
                current = tail;
            }
            continue;
        }

        let needed = if current.is_empty() {
            word_width
        } else {
            current_width + 1 + word_width
        };
        if needed > width {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_width = word_width;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_width = needed;
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn hard_split(word: &str, width: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut piece = String::new();
    let mut piece_width = 0;
    for c in word.chars() {
        let cw = char_width(c);
        if piece_width + cw > width && !piece.is_empty() {
            pieces.push(std::mem::take(&mut piece));
            piece_width = 0;
        }
        piece.push(c);
        piece_width += cw;
    }
    if !piece.is_empty() {
        pieces.push(piece);
    }
    pieces
}

/// Split `total` cells across columns proportionally to `weights`
///
/// `gaps` single-space separators are reserved first. Floor division,
/// leftover cells go to the first column; every column gets at least one.
pub fn column_widths(total: usize, weights: &[u16], gaps: usize) -> Vec<usize> {
    let usable = total.saturating_sub(gaps);
    let sum: usize = weights.iter().map(|w| *w as usize).sum::<usize>().max(1);
    let mut widths: Vec<usize> = weights
        .iter()
        .map(|w| (usable * *w as usize / sum).max(1))
        .collect();
    let assigned: usize = widths.iter().sum();
    if let Some(first) = widths.first_mut()
        && assigned < usable
    {
        *first += usable - assigned;
    }
    widths
}

/// Left-aligned cell, padded to width
pub(crate) fn cell(s: &str, width: usize) -> String {
    pad_width(s, width, false)
}
