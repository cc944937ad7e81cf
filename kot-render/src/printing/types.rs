//! Job, ticket and bill types

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::utils::money::{MONEY_TOLERANCE, to_decimal};

use super::error::{RenderError, RenderResult};
use super::profile::PaperWidth;

/// Content type tag, also part of the cache fingerprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Ticket,
    Bill,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Ticket => "ticket",
            ContentType::Bill => "bill",
        }
    }
}

/// Text (ESC/POS character mode) or image (rasterized markup)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[default]
    Text,
    Image,
}

/// Job description handed over by the intake layer
///
/// `content` stays as raw JSON so the fingerprint is taken over exactly
/// what the producer sent; [`Job::parse_content`] gives the typed view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(rename = "type")]
    pub kind: ContentType,
    pub paper_width_profile: PaperWidth,
    #[serde(default)]
    pub render_mode: RenderMode,
    pub content: serde_json::Value,
}

/// Typed job content
#[derive(Debug, Clone)]
pub enum JobContent {
    Ticket(OrderTicket),
    Bill(Bill),
}

impl Job {
    /// Parse `content` according to the job type
    ///
    /// Missing required structure (header, items) is a content error.
    pub fn parse_content(&self) -> RenderResult<JobContent> {
        if self.content.is_null() {
            return Err(RenderError::Content(format!(
                "{} job has no content",
                self.kind.as_str()
            )));
        }
        let parsed = match self.kind {
            ContentType::Ticket => {
                serde_json::from_value::<OrderTicket>(self.content.clone()).map(JobContent::Ticket)
            }
            ContentType::Bill => {
                serde_json::from_value::<Bill>(self.content.clone()).map(JobContent::Bill)
            }
        };
        parsed.map_err(|e| RenderError::Content(format!("invalid {}: {}", self.kind.as_str(), e)))
    }
}

// ========== Kitchen Order Ticket ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketHeader {
    pub restaurant_name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub ticket_number: String,
    pub ticket_type: String,
    pub customer_name: String,
    pub order_label: String,
    #[serde(default)]
    pub staff_name: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketItem {
    pub name: String,
    pub quantity: u32,
    #[serde(default)]
    pub status: Option<String>,
}

impl TicketItem {
    pub fn status(&self) -> ItemStatus {
        self.status
            .as_deref()
            .map(ItemStatus::parse)
            .unwrap_or(ItemStatus::Unknown)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTicket {
    pub header: TicketHeader,
    pub items: Vec<TicketItem>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub total_item_count: Option<u32>,
}

impl OrderTicket {
    /// Declared item count, or the quantity sum when the producer left it out
    pub fn total_item_count(&self) -> u32 {
        self.total_item_count
            .unwrap_or_else(|| self.items.iter().map(|i| i.quantity).sum())
    }
}

/// Kitchen status of a ticket line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    New,
    Modified,
    Cancelled,
    Repeat,
    Unknown,
}

impl ItemStatus {
    /// Case-insensitive; anything unrecognised is `Unknown`, never an error
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEW" => ItemStatus::New,
            "MODIFIED" => ItemStatus::Modified,
            "CANCELLED" | "CANCEL" => ItemStatus::Cancelled,
            "REPEAT" => ItemStatus::Repeat,
            _ => ItemStatus::Unknown,
        }
    }

    /// Single-letter indicator printed in the status column
    pub fn indicator(self) -> &'static str {
        match self {
            ItemStatus::New => "N",
            ItemStatus::Modified => "M",
            ItemStatus::Cancelled => "C",
            ItemStatus::Repeat => "R",
            ItemStatus::Unknown => "",
        }
    }
}

// ========== Bill ==========

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillHeader {
    pub restaurant_name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(deserialize_with = "string_or_number")]
    pub invoice_number: String,
    pub customer_name: String,
    pub order_label: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillItem {
    pub name: String,
    pub unit_price: f64,
    pub quantity: u32,
}

/// One fixed-rate tax component (e.g. SGST 2.5%)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxComponent {
    pub label: String,
    pub rate: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillSummary {
    pub sub_total: f64,
    #[serde(default)]
    pub discount_percent: f64,
    #[serde(default)]
    pub discount_amount: f64,
    pub tax_components: [TaxComponent; 2],
    #[serde(default)]
    pub rounding_adjustment: f64,
    pub total: f64,
}

impl BillSummary {
    /// `subTotal - discountAmount + sum(taxComponents) - roundingAdjustment`
    pub fn expected_total(&self) -> Decimal {
        let taxes: Decimal = self.tax_components.iter().map(|t| to_decimal(t.amount)).sum();
        to_decimal(self.sub_total) - to_decimal(self.discount_amount) + taxes
            - to_decimal(self.rounding_adjustment)
    }

    /// Declared total minus the expected one
    pub fn discrepancy(&self) -> Decimal {
        to_decimal(self.total) - self.expected_total()
    }

    /// Whether the declared total matches its parts within 0.01
    pub fn is_consistent(&self) -> bool {
        self.discrepancy().abs() <= MONEY_TOLERANCE
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub header: BillHeader,
    pub items: Vec<BillItem>,
    pub summary: BillSummary,
}

/// Accept `"42"` or `42` for identifiers producers send either way
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Float(f) => f.to_string(),
    })
}
