//! HTML sink for image mode
//!
//! The same [`TextLine`]s the text codec prints are rendered into a
//! fixed-width monospace page, so both modes share one layout.

use askama::Template;
use kot_printer::Align;

use super::{LineRole, TextLine};
use crate::printing::error::RenderResult;
use crate::printing::profile::{FontSize, PaperProfile};

/// Advance width of a monospace glyph relative to its font size
const GLYPH_ASPECT: f32 = 0.6;
const LINE_HEIGHT: f32 = 1.25;

struct MarkupLine {
    class: String,
    text: String,
}

#[derive(Template)]
#[template(path = "receipt.html")]
struct ReceiptTemplate<'a> {
    page_width: String,
    font_px: String,
    large_font_px: String,
    line_px: String,
    tall_px: String,
    lines: &'a [MarkupLine],
}

/// Render layout lines as an HTML page sized to the profile
///
/// `scale` is the device scale factor the renderer applies, so the CSS page
/// width is `pixel_width / scale` and the captured bitmap comes out at
/// `pixel_width` pixels.
pub fn render_markup(lines: &[TextLine], profile: &PaperProfile, scale: f32) -> RenderResult<String> {
    let page_width = profile.pixel_width as f32 / scale;
    let font_px = page_width / (profile.chars_per_line as f32 * GLYPH_ASPECT);
    let line_px = font_px * LINE_HEIGHT;

    let markup_lines: Vec<MarkupLine> = lines
        .iter()
        .map(|line| MarkupLine {
            class: line_class(line),
            text: line.text.clone(),
        })
        .collect();

    let template = ReceiptTemplate {
        page_width: format!("{:.2}", page_width),
        font_px: format!("{:.2}", font_px),
        large_font_px: format!("{:.2}", font_px * 2.0),
        line_px: format!("{:.2}", line_px),
        tall_px: format!("{:.2}", line_px * 2.0),
        lines: &markup_lines,
    };
    Ok(template.render()?)
}

fn line_class(line: &TextLine) -> String {
    let mut class = String::from("line");
    match line.align {
        Align::Left => {}
        Align::Center => class.push_str(" center"),
        Align::Right => class.push_str(" right"),
    }
    match line.size {
        FontSize::Normal => {}
        FontSize::Medium => class.push_str(" medium"),
        FontSize::Large => class.push_str(" large"),
    }
    if line.bold {
        class.push_str(" bold");
    }
    if line.role == LineRole::Divider {
        class.push_str(" divider");
    }
    class
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_escapes_and_classes() {
        let lines = vec![
            TextLine::new("Fish & Chips <hot>", LineRole::Title)
                .centered()
                .sized(FontSize::Large)
                .bold(),
            TextLine::new("--------", LineRole::Divider),
        ];
        let html = render_markup(&lines, &PaperProfile::new(576, 48), 1.0).unwrap();

        assert!(html.contains("width: 576.00px"));
        assert!(html.contains("Fish &#38; Chips &#60;hot&#62;") || html.contains("Fish &amp; Chips &lt;hot&gt;"));
        assert!(html.contains(r#"class="line center large bold""#));
        assert!(html.contains(r#"class="line divider""#));
    }

    #[test]
    fn test_markup_page_width_follows_scale() {
        let html = render_markup(&[], &PaperProfile::new(384, 32), 2.0).unwrap();
        assert!(html.contains("width: 192.00px"));
    }
}
