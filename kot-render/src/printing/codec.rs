//! Text-mode emission: layout lines to ESC/POS bytes
//!
//! Directives go immediately before the text they modify and are reset
//! right after it, so bold and size never leak into the next line.
//! Alignment is the exception: it is only re-emitted when it changes.

use kot_printer::{Align, EscPosBuilder};

use super::layout::TextLine;
use super::profile::{FontSize, PaperProfile};

pub fn write_lines(builder: &mut EscPosBuilder, lines: &[TextLine], profile: &PaperProfile) {
    let mut align = Align::Left;
    builder.left();

    for line in lines {
        if line.align != align {
            builder.align(line.align);
            align = line.align;
        }

        let sized = line.size != FontSize::Normal;
        if sized {
            builder.size(profile.font_size_codes.code(line.size));
        }
        if line.bold {
            builder.bold();
        }

        builder.line(&line.text);

        if line.bold {
            builder.bold_off();
        }
        if sized {
            builder.size(profile.font_size_codes.normal);
        }
    }

    if align != Align::Left {
        builder.left();
    }
}
