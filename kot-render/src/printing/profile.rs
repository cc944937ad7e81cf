//! Paper profiles (58mm / 76mm / 80mm)

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{RenderError, RenderResult};

/// Narrowest line the column layouts are defined for
pub const MIN_CHARS_PER_LINE: usize = 16;

/// Paper-width identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PaperWidth {
    #[serde(rename = "58mm")]
    Mm58,
    #[serde(rename = "76mm")]
    Mm76,
    #[serde(rename = "80mm")]
    Mm80,
}

impl PaperWidth {
    pub fn as_str(self) -> &'static str {
        match self {
            PaperWidth::Mm58 => "58mm",
            PaperWidth::Mm76 => "76mm",
            PaperWidth::Mm80 => "80mm",
        }
    }
}

/// GS ! n size codes for the three font sizes the layouts use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontSizeCodes {
    pub normal: u8,
    pub medium: u8,
    pub large: u8,
}

impl Default for FontSizeCodes {
    fn default() -> Self {
        Self {
            normal: 0x00,
            medium: 0x01,
            large: 0x11,
        }
    }
}

/// Font size directive attached to a layout line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    #[default]
    Normal,
    Medium,
    Large,
}

impl FontSizeCodes {
    pub fn code(&self, size: FontSize) -> u8 {
        match size {
            FontSize::Normal => self.normal,
            FontSize::Medium => self.medium,
            FontSize::Large => self.large,
        }
    }

    /// Horizontal magnification encoded in the upper nibble of a size code
    pub fn width_multiplier(&self, size: FontSize) -> usize {
        ((self.code(size) >> 4) & 0x07) as usize + 1
    }

    /// Vertical magnification encoded in the lower nibble of a size code
    pub fn height_multiplier(&self, size: FontSize) -> usize {
        (self.code(size) & 0x07) as usize + 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperProfile {
    pub pixel_width: u32,
    pub chars_per_line: usize,
    #[serde(default)]
    pub font_size_codes: FontSizeCodes,
}

impl PaperProfile {
    pub fn new(pixel_width: u32, chars_per_line: usize) -> Self {
        Self {
            pixel_width,
            chars_per_line,
            font_size_codes: FontSizeCodes::default(),
        }
    }

    /// Reject profiles every layout computation would be ill-defined for
    pub fn validate(&self) -> RenderResult<()> {
        if self.chars_per_line == 0 {
            return Err(RenderError::Configuration(
                "paper profile has zero charsPerLine".to_string(),
            ));
        }
        if self.chars_per_line < MIN_CHARS_PER_LINE {
            return Err(RenderError::Configuration(format!(
                "paper profile charsPerLine {} is below the minimum of {}",
                self.chars_per_line, MIN_CHARS_PER_LINE
            )));
        }
        if self.pixel_width == 0 {
            return Err(RenderError::Configuration(
                "paper profile has zero pixelWidth".to_string(),
            ));
        }
        for size in [FontSize::Normal, FontSize::Medium, FontSize::Large] {
            if self.font_size_codes.width_multiplier(size) > self.chars_per_line {
                return Err(RenderError::Configuration(format!(
                    "font size {:?} is wider than the line",
                    size
                )));
            }
        }
        Ok(())
    }

    /// Characters that fit on one line at a font size
    pub fn chars_at(&self, size: FontSize) -> usize {
        self.chars_per_line / self.font_size_codes.width_multiplier(size)
    }
}

/// Profiles keyed by paper width, loaded once
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileTable {
    profiles: BTreeMap<PaperWidth, PaperProfile>,
}

impl ProfileTable {
    /// Load a table from a JSON file: `{ "58mm": { "pixelWidth": 384, ... }, ... }`
    pub fn from_json_file(path: impl AsRef<Path>) -> RenderResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|e| {
            RenderError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let profiles: BTreeMap<PaperWidth, PaperProfile> = serde_json::from_slice(&raw)
            .map_err(|e| {
                RenderError::Configuration(format!("invalid profiles in {}: {}", path.display(), e))
            })?;
        Ok(Self { profiles })
    }

    pub fn with_profile(mut self, width: PaperWidth, profile: PaperProfile) -> Self {
        self.profiles.insert(width, profile);
        self
    }

    /// Select and validate the profile for a job
    pub fn get(&self, width: PaperWidth) -> RenderResult<&PaperProfile> {
        let profile = self.profiles.get(&width).ok_or_else(|| {
            RenderError::Configuration(format!("no paper profile for {}", width.as_str()))
        })?;
        profile.validate()?;
        Ok(profile)
    }
}

impl Default for ProfileTable {
    fn default() -> Self {
        let profiles = BTreeMap::from([
            (PaperWidth::Mm58, PaperProfile::new(384, 32)),
            (PaperWidth::Mm76, PaperProfile::new(512, 42)),
            (PaperWidth::Mm80, PaperProfile::new(576, 48)),
        ]);
        Self { profiles }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profiles() {
        let table = ProfileTable::default();
        assert_eq!(table.get(PaperWidth::Mm58).unwrap().chars_per_line, 32);
        assert_eq!(table.get(PaperWidth::Mm76).unwrap().pixel_width, 512);
        assert_eq!(table.get(PaperWidth::Mm80).unwrap().pixel_width, 576);
    }

    #[test]
    fn test_zero_chars_is_configuration_error() {
        let table = ProfileTable::default().with_profile(PaperWidth::Mm58, PaperProfile::new(384, 0));
        assert!(matches!(
            table.get(PaperWidth::Mm58),
            Err(RenderError::Configuration(_))
        ));
    }

    #[test]
    fn test_zero_pixel_width_is_configuration_error() {
        let profile = PaperProfile::new(0, 32);
        assert!(matches!(profile.validate(), Err(RenderError::Configuration(_))));
    }

    #[test]
    fn test_size_multipliers() {
        let codes = FontSizeCodes::default();
        assert_eq!(codes.width_multiplier(FontSize::Normal), 1);
        assert_eq!(codes.width_multiplier(FontSize::Medium), 1);
        assert_eq!(codes.height_multiplier(FontSize::Medium), 2);
        assert_eq!(codes.width_multiplier(FontSize::Large), 2);
        assert_eq!(PaperProfile::new(576, 48).chars_at(FontSize::Large), 24);
    }

    #[test]
    fn test_paper_width_serde() {
        let w: PaperWidth = serde_json::from_str("\"76mm\"").unwrap();
        assert_eq!(w, PaperWidth::Mm76);
        assert_eq!(serde_json::to_string(&PaperWidth::Mm58).unwrap(), "\"58mm\"");
    }

    #[test]
    fn test_profiles_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        std::fs::write(
            &path,
            r#"{ "80mm": { "pixelWidth": 576, "charsPerLine": 42 } }"#,
        )
        .unwrap();

        let table = ProfileTable::from_json_file(&path).unwrap();
        assert_eq!(table.get(PaperWidth::Mm80).unwrap().chars_per_line, 42);
        assert!(table.get(PaperWidth::Mm58).is_err());
    }
}
