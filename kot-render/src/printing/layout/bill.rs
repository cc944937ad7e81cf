//! Customer bill layout

use kot_printer::pad_left_keep;

use super::{LayoutEngine, LineRole, TextLine, cell, column_widths, wrap_text};
use crate::printing::profile::FontSize;
use crate::printing::types::Bill;
use crate::utils::money::{format_amount, format_decimal, format_rate, format_signed, line_total, to_decimal};

/// Separators between the four item columns
const COLUMN_GAPS: usize = 3;
/// Narrowest quantity column; three digits print without pushing the row
const MIN_QTY_WIDTH: usize = 3;

impl LayoutEngine<'_> {
    pub(super) fn bill(&self, bill: &Bill) -> Vec<TextLine> {
        let header = &bill.header;
        let summary = &bill.summary;
        let major = self.config.major_divider;
        let minor = self.config.minor_divider;
        let mut lines = Vec::new();

        if !summary.is_consistent() {
            tracing::warn!(
                invoice = %header.invoice_number,
                declared = summary.total,
                expected = %summary.expected_total(),
                discrepancy = %summary.discrepancy(),
                "Bill summary is inconsistent, printing declared values"
            );
        }

        // Shop header
        lines.extend(
            self.wrapped(&header.restaurant_name, FontSize::Large, LineRole::Title)
                .into_iter()
                .map(|l| l.centered().bold()),
        );
        if let Some(address) = header.address.as_deref().filter(|a| !a.trim().is_empty()) {
            lines.extend(
                self.wrapped(address, FontSize::Normal, LineRole::Header)
                    .into_iter()
                    .map(TextLine::centered),
            );
        }
        if let Some(tax_id) = header.tax_id.as_deref().filter(|t| !t.trim().is_empty()) {
            lines.extend(
                self.wrapped(&format!("GSTIN: {}", tax_id), FontSize::Normal, LineRole::Header)
                    .into_iter()
                    .map(TextLine::centered),
            );
        }
        lines.push(self.divider(major));

        lines.extend(self.header_pair(
            &format!("Invoice: {}", header.invoice_number),
            &header.timestamp,
        ));
        lines.extend(self.wrapped(
            &format!("Customer: {}", header.customer_name),
            FontSize::Normal,
            LineRole::Header,
        ));
        lines.extend(self.wrapped(
            &format!("Order: {}", header.order_label),
            FontSize::Normal,
            LineRole::Header,
        ));
        lines.push(self.divider(minor));

        // Items
        let widths = self.bill_column_widths();
        lines.push(
            TextLine::new(
                self.bill_row("Item", "Qty", "Price", "Amount", &widths),
                LineRole::ColumnHeader,
            )
            .bold(),
        );
        lines.push(self.divider(minor));

        for item in &bill.items {
            let mut name_rows = wrap_text(&item.name, widths[0]).into_iter();
            let first = name_rows.next().unwrap_or_default();
            lines.push(TextLine::new(
                self.bill_row(
                    &first,
                    &item.quantity.to_string(),
                    &format_amount(item.unit_price),
                    &format_decimal(line_total(item.unit_price, item.quantity)),
                    &widths,
                ),
                LineRole::Item,
            ));
            for rest in name_rows {
                lines.push(TextLine::new(rest, LineRole::ItemContinuation));
            }
        }
        lines.push(self.divider(minor));

        // Summary, declared values only
        lines.push(self.pair(
            "Sub Total",
            &format_amount(summary.sub_total),
            FontSize::Normal,
            LineRole::Summary,
        ));
        if !to_decimal(summary.discount_amount).is_zero() {
            let label = if summary.discount_percent != 0.0 {
                format!("Discount ({}%)", format_rate(summary.discount_percent))
            } else {
                "Discount".to_string()
            };
            lines.push(self.pair(
                &label,
                &format_signed(-to_decimal(summary.discount_amount)),
                FontSize::Normal,
                LineRole::Summary,
            ));
        }
        for tax in &summary.tax_components {
            lines.push(self.pair(
                &format!("{} @{}%", tax.label, format_rate(tax.rate)),
                &format_amount(tax.amount),
                FontSize::Normal,
                LineRole::Summary,
            ));
        }
        let rounding = to_decimal(summary.rounding_adjustment);
        if !rounding.is_zero() {
            lines.push(self.pair(
                "Round Off",
                &format_signed(-rounding),
                FontSize::Normal,
                LineRole::Summary,
            ));
        }
        lines.push(self.divider(major));
        lines.push(
            self.pair(
                "TOTAL",
                &format_amount(summary.total),
                FontSize::Large,
                LineRole::Total,
            )
            .bold(),
        );
        lines.push(self.divider(major));

        if let Some(footer) = self.config.bill_footer.as_deref().filter(|f| !f.is_empty()) {
            lines.extend(
                self.wrapped(footer, FontSize::Normal, LineRole::Footer)
                    .into_iter()
                    .map(TextLine::centered),
            );
        }

        lines
    }

    /// Ratio widths, with the quantity column widened out of the name column
    fn bill_column_widths(&self) -> Vec<usize> {
        let mut widths = column_widths(
            self.width_at(FontSize::Normal),
            &self.config.bill_columns.weights(),
            COLUMN_GAPS,
        );
        let shortfall = MIN_QTY_WIDTH.saturating_sub(widths[1]);
        let spare = widths[0].saturating_sub(1);
        let moved = shortfall.min(spare);
        widths[0] -= moved;
        widths[1] += moved;
        widths
    }

    /// Name left, numbers right; numbers are never cut
    fn bill_row(&self, name: &str, qty: &str, price: &str, total: &str, widths: &[usize]) -> String {
        format!(
            "{} {} {} {}",
            cell(name, widths[0]),
            pad_left_keep(qty, widths[1]),
            pad_left_keep(price, widths[2]),
            pad_left_keep(total, widths[3]),
        )
    }
}

#[cfg(test)]
mod tests {
    use kot_printer::text_width;

    use super::*;
    use crate::printing::config::RenderConfig;
    use crate::printing::profile::PaperProfile;
    use crate::printing::types::{BillHeader, BillItem, BillSummary, TaxComponent};

    fn bill(discount: f64, rounding: f64, total: f64) -> Bill {
        Bill {
            header: BillHeader {
                restaurant_name: "Spice Route".into(),
                address: None,
                tax_id: None,
                invoice_number: "INV-0091".into(),
                customer_name: "Asha".into(),
                order_label: "T4".into(),
                timestamp: "2026-10-19 20:14".into(),
            },
            items: vec![
                BillItem { name: "Paneer Butter Masala".into(), unit_price: 60.0, quantity: 1 },
                BillItem { name: "Butter Naan".into(), unit_price: 20.0, quantity: 2 },
            ],
            summary: BillSummary {
                sub_total: 100.0,
                discount_percent: if discount > 0.0 { 10.0 } else { 0.0 },
                discount_amount: discount,
                tax_components: [
                    TaxComponent { label: "SGST".into(), rate: 2.5, amount: 2.5 },
                    TaxComponent { label: "CGST".into(), rate: 2.5, amount: 2.5 },
                ],
                rounding_adjustment: rounding,
                total,
            },
        }
    }

    fn engine_lines(bill: &Bill, chars: usize) -> Vec<TextLine> {
        let config = RenderConfig::default();
        let profile = PaperProfile::new(576, chars);
        LayoutEngine::new(&config, &profile).unwrap().bill(bill)
    }

    #[test]
    fn test_both_tax_lines_and_total() {
        let lines = engine_lines(&bill(0.0, 0.0, 105.0), 48);

        assert!(lines.iter().any(|l| l.text.starts_with("SGST @2.5%") && l.text.ends_with("2.50")));
        assert!(lines.iter().any(|l| l.text.starts_with("CGST @2.5%") && l.text.ends_with("2.50")));
        assert!(!lines.iter().any(|l| l.text.starts_with("Discount")));
        assert!(!lines.iter().any(|l| l.text.starts_with("Round Off")));

        let total = lines.iter().find(|l| l.role == LineRole::Total).unwrap();
        assert!(total.text.ends_with("105.00"));
        assert_eq!(total.size, FontSize::Large);
        assert!(total.bold);
        assert_eq!(text_width(&total.text), 24);
    }

    #[test]
    fn test_inconsistent_total_passthrough() {
        let lines = engine_lines(&bill(0.0, 0.0, 110.0), 48);
        let total = lines.iter().find(|l| l.role == LineRole::Total).unwrap();
        assert!(total.text.ends_with("110.00"));
    }

    #[test]
    fn test_discount_and_rounding_lines() {
        let lines = engine_lines(&bill(10.0, 0.5, 94.5), 48);
        let discount = lines.iter().find(|l| l.text.starts_with("Discount")).unwrap();
        assert!(discount.text.starts_with("Discount (10%)"));
        assert!(discount.text.ends_with("-10.00"));
        let round = lines.iter().find(|l| l.text.starts_with("Round Off")).unwrap();
        assert!(round.text.ends_with("-0.50"));
    }

    #[test]
    fn test_item_rows_fit_line() {
        let lines = engine_lines(&bill(0.0, 0.0, 105.0), 32);
        let rows: Vec<&TextLine> = lines.iter().filter(|l| l.role == LineRole::Item).collect();
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(text_width(&row.text), 32);
        }
        assert!(rows[0].text.ends_with("60.00"));
        assert!(rows[1].text.ends_with("40.00"));
        assert!(lines.iter().any(|l| l.role == LineRole::ItemContinuation));
    }

    #[test]
    fn test_narrow_paper_keeps_three_digit_quantity_in_line() {
        let mut bulk = bill(0.0, 0.0, 105.0);
        bulk.items[1].quantity = 120;
        let config = RenderConfig::default();
        let profile = PaperProfile::new(384, 32);
        let engine = LayoutEngine::new(&config, &profile).unwrap();
        assert_eq!(engine.bill_column_widths(), vec![13, 3, 6, 7]);

        let lines = engine.bill(&bulk);
        let rows: Vec<&TextLine> = lines.iter().filter(|l| l.role == LineRole::Item).collect();
        assert!(rows.iter().all(|r| text_width(&r.text) == 32));
        assert!(rows[1].text.contains(" 120 "));
    }

    #[test]
    fn test_long_header_fields_wrap() {
        let mut long = bill(0.0, 0.0, 105.0);
        long.header.customer_name = "Asha Venkataraman and friends from the office".into();
        long.header.invoice_number = "INV-2026-10-19-000000091".into();
        let lines = engine_lines(&long, 32);

        let header: Vec<&TextLine> = lines.iter().filter(|l| l.role == LineRole::Header).collect();
        assert!(header.iter().all(|l| text_width(&l.text) <= 32));
        assert!(header.iter().any(|l| l.text.starts_with("Customer: Asha")));
        assert!(header.iter().any(|l| l.text.trim_start() == "2026-10-19 20:14"));
    }

    #[test]
    fn test_optional_header_fields() {
        let mut with_address = bill(0.0, 0.0, 105.0);
        with_address.header.address = Some("12 MG Road, Bengaluru".into());
        with_address.header.tax_id = Some("29ABCDE1234F1Z5".into());
        let lines = engine_lines(&with_address, 48);
        assert!(lines.iter().any(|l| l.text == "12 MG Road, Bengaluru"));
        assert!(lines.iter().any(|l| l.text == "GSTIN: 29ABCDE1234F1Z5"));

        let lines = engine_lines(&bill(0.0, 0.0, 105.0), 48);
        assert!(!lines.iter().any(|l| l.text.starts_with("GSTIN")));
    }
}
