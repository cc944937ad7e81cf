//! Kitchen order ticket layout

use kot_printer::{pad_left_keep, pad_width};

use super::{LayoutEngine, LineRole, TextLine, cell, wrap_text};
use crate::printing::profile::FontSize;
use crate::printing::types::OrderTicket;

/// Quantity column, right-aligned, including its leading gap
const QTY_WIDTH: usize = 5;
/// Status indicator column, right-aligned, including its leading gap
const STATUS_WIDTH: usize = 3;

impl LayoutEngine<'_> {
    pub(super) fn ticket(&self, ticket: &OrderTicket) -> Vec<TextLine> {
        let header = &ticket.header;
        let major = self.config.major_divider;
        let minor = self.config.minor_divider;
        let mut lines = Vec::new();

        // Restaurant and ticket banner
        lines.extend(
            self.wrapped(&header.restaurant_name, FontSize::Large, LineRole::Title)
                .into_iter()
                .map(|l| l.centered().bold()),
        );
        let banner = format!("{} #{}", header.ticket_type, header.ticket_number);
        lines.extend(
            self.wrapped(&banner, FontSize::Medium, LineRole::Title)
                .into_iter()
                .map(|l| l.centered().bold()),
        );
        lines.push(self.divider(major));

        lines.extend(self.header_pair(&format!("Order: {}", header.order_label), &header.timestamp));
        lines.extend(self.wrapped(
            &format!("Customer: {}", header.customer_name),
            FontSize::Normal,
            LineRole::Header,
        ));
        if let Some(staff) = header.staff_name.as_deref().filter(|s| !s.trim().is_empty()) {
            lines.extend(self.wrapped(&format!("Staff: {}", staff), FontSize::Normal, LineRole::Header));
        }
        lines.push(self.divider(minor));

        // Column header, same geometry as the item rows
        let item_size = FontSize::Medium;
        let name_width = self.ticket_name_width(item_size);
        lines.push(
            TextLine::new(
                format!(
                    "{}{}{}",
                    cell("Item", name_width),
                    pad_width("Qty", QTY_WIDTH, true),
                    pad_width("St", STATUS_WIDTH, true),
                ),
                LineRole::ColumnHeader,
            )
            .bold(),
        );
        lines.push(self.divider(minor));

        for item in &ticket.items {
            let indicator = item.status().indicator();
            let mut name_rows = wrap_text(&item.name, name_width).into_iter();
            let first = name_rows.next().unwrap_or_default();
            lines.push(
                TextLine::new(
                    format!(
                        "{}{}{}",
                        cell(&first, name_width),
                        pad_left_keep(&item.quantity.to_string(), QTY_WIDTH),
                        pad_width(indicator, STATUS_WIDTH, true),
                    ),
                    LineRole::Item,
                )
                .sized(item_size)
                .bold(),
            );
            for rest in name_rows {
                lines.push(TextLine::new(rest, LineRole::ItemContinuation).sized(item_size));
            }
        }
        lines.push(self.divider(minor));

        lines.push(
            self.pair(
                "Total Items",
                &ticket.total_item_count().to_string(),
                FontSize::Normal,
                LineRole::Summary,
            )
            .bold(),
        );

        if let Some(note) = ticket.note.as_deref().filter(|n| !n.trim().is_empty()) {
            lines.push(self.divider(minor));
            lines.extend(self.wrapped(&format!("Note: {}", note), FontSize::Normal, LineRole::Note));
        }

        lines
    }

    /// Name column: whatever the fixed quantity and status columns leave
    fn ticket_name_width(&self, size: FontSize) -> usize {
        self.width_at(size)
            .saturating_sub(QTY_WIDTH + STATUS_WIDTH)
            .max(1)
    }
}
