//! Text encoding and column-width utilities
//!
//! Thermal printers lay text out in fixed cells: ASCII takes one cell,
//! CJK ideographs take two. The GBK byte length of a string matches that
//! cell count, so widths are measured in GBK bytes regardless of the
//! charset the printer is finally fed.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Character set the printer expects for text bytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Charset {
    /// Pass UTF-8 through untouched (ASCII-only printers, UTF-8 capable firmware)
    #[default]
    Utf8,
    /// Chinese printers in GBK mode
    Gbk,
}

impl Charset {
    /// Parse a charset name as used in configuration
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Some(Self::Utf8),
            "gbk" | "gb2312" => Some(Self::Gbk),
            _ => None,
        }
    }

    /// Bytes emitted right after printer initialization
    pub fn preamble(self) -> &'static [u8] {
        match self {
            Self::Utf8 => &[],
            // FS & (Chinese mode) + FS C 1 (GBK code page)
            Self::Gbk => &[0x1C, 0x26, 0x1C, 0x43, 0x01],
        }
    }

    /// Bytes emitted at the very end of a job
    pub fn epilogue(self) -> &'static [u8] {
        match self {
            Self::Utf8 => &[],
            // FS . - exit Chinese mode
            Self::Gbk => &[0x1C, 0x2E],
        }
    }

    /// Encode a piece of text for this charset
    pub fn encode(self, s: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => s.as_bytes().to_vec(),
            Self::Gbk => encode_gbk(s),
        }
    }
}

/// Replace control characters with spaces
///
/// Producer text must never reach the printer as commands (an embedded
/// `GS V` would cut mid-job). Each control character is one cell wide,
/// as is the space replacing it, so column geometry is unchanged.
pub fn printable(s: &str) -> Cow<'_, str> {
    if s.chars().any(char::is_control) {
        Cow::Owned(
            s.chars()
                .map(|c| if c.is_control() { ' ' } else { c })
                .collect(),
        )
    } else {
        Cow::Borrowed(s)
    }
}

/// Get the printed cell width of a string
///
/// Chinese characters are 2 cells wide, ASCII is 1.
pub fn text_width(s: &str) -> usize {
    let (cow, _, _) = encoding_rs::GBK.encode(s);
    cow.len()
}

/// Cell width of a single character
pub fn char_width(c: char) -> usize {
    let mut tmp = [0u8; 4];
    text_width(c.encode_utf8(&mut tmp))
}

/// Truncate a string to fit within a cell width
pub fn truncate_width(s: &str, max_width: usize) -> String {
    let mut width = 0;
    let mut result = String::new();
    for c in s.chars() {
        let char_len = char_width(c);
        if width + char_len > max_width {
            break;
        }
        result.push(c);
        width += char_len;
    }
    result
}

/// Pad a string to a specific cell width
///
/// If the string is longer than the width, it will be truncated.
pub fn pad_width(s: &str, width: usize, align_right: bool) -> String {
    let current_width = text_width(s);
    if current_width >= width {
        return truncate_width(s, width);
    }
    let spaces = width - current_width;
    if align_right {
        format!("{}{}", " ".repeat(spaces), s)
    } else {
        format!("{}{}", s, " ".repeat(spaces))
    }
}

/// Right-align a string in a cell width without ever cutting it
///
/// Used for amounts: an overflowing number is printed whole.
pub fn pad_left_keep(s: &str, width: usize) -> String {
    let current_width = text_width(s);
    if current_width >= width {
        return s.to_string();
    }
    format!("{}{}", " ".repeat(width - current_width), s)
}

/// Encode text to GBK, routing the Euro sign through code page PC858
fn encode_gbk(s: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(s.len() * 2);
    let parts: Vec<&str> = s.split('€').collect();

    for (idx, part) in parts.iter().enumerate() {
        if !part.is_empty() {
            let (gbk, _, _) = encoding_rs::GBK.encode(part);
            result.extend_from_slice(&gbk);
        }
        if idx < parts.len() - 1 {
            // Exit Chinese -> PC858 -> Euro -> Enter Chinese
            result.extend_from_slice(&[0x1C, 0x2E, 0x1B, 0x74, 19, 0xD5, 0x1C, 0x26]);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_width() {
        assert_eq!(text_width("hello"), 5);
        assert_eq!(text_width("你好"), 4);
        assert_eq!(text_width("AB中文CD"), 8);
    }

    #[test]
    fn test_truncate_width() {
        assert_eq!(truncate_width("hello world", 5), "hello");
        assert_eq!(truncate_width("你好世界", 4), "你好");
        assert_eq!(truncate_width("AB中文", 4), "AB中");
    }

    #[test]
    fn test_pad_width() {
        assert_eq!(pad_width("hi", 5, false), "hi   ");
        assert_eq!(pad_width("hi", 5, true), "   hi");
        assert_eq!(pad_width("hello world", 5, false), "hello");
    }

    #[test]
    fn test_pad_left_keep_never_truncates() {
        assert_eq!(pad_left_keep("1.50", 6), "  1.50");
        assert_eq!(pad_left_keep("12345.50", 6), "12345.50");
    }

    #[test]
    fn test_printable_blanks_control_characters() {
        assert!(matches!(printable("Paneer Tikka"), Cow::Borrowed(_)));
        assert_eq!(printable("Naan\x1dV\x00"), "Naan V ");
        assert_eq!(printable("two\nlines\t"), "two lines ");
        assert_eq!(text_width(&printable("a\x1bb")), text_width("a\x1bb"));
    }

    #[test]
    fn test_charset_utf8_passthrough() {
        assert_eq!(Charset::Utf8.encode("Paneer"), b"Paneer".to_vec());
        assert!(Charset::Utf8.preamble().is_empty());
    }

    #[test]
    fn test_charset_gbk_euro() {
        let bytes = Charset::Gbk.encode("1€");
        assert_eq!(bytes[0], b'1');
        assert!(bytes.windows(2).any(|w| w == [0x74, 19]));
        assert_eq!(Charset::Gbk.encode("你好").len(), 4);
    }

    #[test]
    fn test_charset_parse() {
        assert_eq!(Charset::parse("GBK"), Some(Charset::Gbk));
        assert_eq!(Charset::parse("utf-8"), Some(Charset::Utf8));
        assert_eq!(Charset::parse("latin1"), None);
    }
}
