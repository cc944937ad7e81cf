//! Render configuration
//!
//! One immutable value handed to every render call. Defaults live in
//! `Default`; the agent binary builds it from the environment.

use std::path::PathBuf;
use std::time::Duration;

use kot_printer::{Charset, PrinterModel};
use serde_json::{Value, json};

use super::error::{RenderError, RenderResult};
use super::profile::ProfileTable;

/// Relative widths of the bill item columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillColumns {
    pub name: u16,
    pub quantity: u16,
    pub price: u16,
    pub total: u16,
}

impl Default for BillColumns {
    fn default() -> Self {
        Self {
            name: 10,
            quantity: 2,
            price: 5,
            total: 6,
        }
    }
}

impl BillColumns {
    pub fn weights(&self) -> [u16; 4] {
        [self.name, self.quantity, self.price, self.total]
    }
}

#[derive(Debug, Clone)]
pub struct RasterSettings {
    /// Device scale factor passed to the renderer
    pub scale: f32,
    /// Upper bound for one markup-to-bitmap conversion
    pub timeout: Duration,
}

impl Default for RasterSettings {
    fn default() -> Self {
        Self {
            scale: 1.0,
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub max_age: Duration,
    /// Durable tier directory; memory only when `None`
    pub dir: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(24 * 60 * 60),
            dir: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub profiles: ProfileTable,
    pub printer_model: PrinterModel,
    pub charset: Charset,
    /// Blank lines fed before the cut so the content clears the cutter
    pub feed_lines: u8,
    /// Sound the buzzer when a kitchen ticket prints
    pub beep_on_ticket: bool,
    pub bill_columns: BillColumns,
    pub major_divider: char,
    pub minor_divider: char,
    pub bill_footer: Option<String>,
    pub raster: RasterSettings,
    pub cache: CacheSettings,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            profiles: ProfileTable::default(),
            printer_model: PrinterModel::default(),
            charset: Charset::default(),
            feed_lines: 4,
            beep_on_ticket: false,
            bill_columns: BillColumns::default(),
            major_divider: '=',
            minor_divider: '-',
            bill_footer: Some("Thank you, visit again!".to_string()),
            raster: RasterSettings::default(),
            cache: CacheSettings::default(),
        }
    }
}

impl RenderConfig {
    /// Settings that change how laid-out content looks, for cache keys
    pub fn layout_settings(&self) -> Value {
        json!({
            "billColumns": self.bill_columns.weights(),
            "majorDivider": self.major_divider.to_string(),
            "minorDivider": self.minor_divider.to_string(),
            "billFooter": self.bill_footer,
        })
    }

    pub fn validate(&self) -> RenderResult<()> {
        if self.bill_columns.weights().contains(&0) {
            return Err(RenderError::Configuration(
                "bill column weights must be non-zero".to_string(),
            ));
        }
        if !self.raster.scale.is_finite() || self.raster.scale <= 0.0 {
            return Err(RenderError::Configuration(format!(
                "raster scale must be positive, got {}",
                self.raster.scale
            )));
        }
        if self.raster.timeout.is_zero() {
            return Err(RenderError::Configuration(
                "raster timeout must be non-zero".to_string(),
            ));
        }
        if self.major_divider.is_control() || self.minor_divider.is_control() {
            return Err(RenderError::Configuration(
                "divider characters must be printable".to_string(),
            ));
        }
        Ok(())
    }
}
