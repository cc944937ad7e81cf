use std::path::PathBuf;
use std::time::Duration;

use kot_printer::{Charset, PrinterModel};

use crate::printing::config::{CacheSettings, RasterSettings, RenderConfig};
use crate::printing::profile::ProfileTable;
use crate::printing::raster::DEFAULT_BROWSER;

/// Agent configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | KOT_WORK_DIR | ./kot-data | Cache, logs and profile overrides |
/// | KOT_LOG_LEVEL | info | Log level or filter directive |
/// | KOT_LOG_JSON | false | JSON log lines |
/// | KOT_PRINTER_MODEL | generic | generic / epson / partial_cut |
/// | KOT_CHARSET | utf8 | utf8 / gbk |
/// | KOT_BROWSER | chromium | Headless browser used for image mode |
/// | KOT_RASTER_TIMEOUT_MS | 15000 | Bound on one rasterization |
/// | KOT_RASTER_SCALE | 1.0 | Device scale factor |
/// | KOT_CACHE_MAX_AGE_SECS | 86400 | Raster cache entry lifetime |
/// | KOT_FALLBACK_TO_TEXT | true | Retry image jobs in text mode on recoverable errors |
/// | KOT_PRINTER_TIMEOUT_MS | 5000 | Printer connect/write timeout |
///
/// `{work_dir}/profiles.json`, when present, replaces the built-in paper
/// profile table.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub work_dir: PathBuf,
    pub log_level: String,
    pub log_json: bool,
    pub printer_model: PrinterModel,
    pub charset: Charset,
    pub browser: PathBuf,
    pub raster_timeout_ms: u64,
    pub raster_scale: f32,
    pub cache_max_age_secs: u64,
    pub fallback_to_text: bool,
    pub printer_timeout_ms: u64,
}

impl AgentConfig {
    /// Load configuration from the environment
    ///
    /// Unset or unparsable variables fall back to their defaults.
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("KOT_WORK_DIR")
                .unwrap_or_else(|_| "./kot-data".into())
                .into(),
            log_level: std::env::var("KOT_LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: env_parse("KOT_LOG_JSON").unwrap_or(false),
            printer_model: std::env::var("KOT_PRINTER_MODEL")
                .ok()
                .and_then(|v| PrinterModel::parse(&v))
                .unwrap_or_default(),
            charset: std::env::var("KOT_CHARSET")
                .ok()
                .and_then(|v| Charset::parse(&v))
                .unwrap_or_default(),
            browser: std::env::var("KOT_BROWSER")
                .unwrap_or_else(|_| DEFAULT_BROWSER.into())
                .into(),
            raster_timeout_ms: env_parse("KOT_RASTER_TIMEOUT_MS").unwrap_or(15_000),
            raster_scale: env_parse("KOT_RASTER_SCALE").unwrap_or(1.0),
            cache_max_age_secs: env_parse("KOT_CACHE_MAX_AGE_SECS").unwrap_or(24 * 60 * 60),
            fallback_to_text: env_parse("KOT_FALLBACK_TO_TEXT").unwrap_or(true),
            printer_timeout_ms: env_parse("KOT_PRINTER_TIMEOUT_MS").unwrap_or(5_000),
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        self.work_dir.join("logs")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.work_dir.join("cache").join("raster")
    }

    pub fn profiles_path(&self) -> PathBuf {
        self.work_dir.join("profiles.json")
    }

    pub fn printer_timeout(&self) -> Duration {
        Duration::from_millis(self.printer_timeout_ms)
    }

    /// Immutable render configuration for this agent
    pub fn render_config(&self) -> crate::RenderResult<RenderConfig> {
        let profiles_path = self.profiles_path();
        let profiles = if profiles_path.exists() {
            ProfileTable::from_json_file(&profiles_path)?
        } else {
            ProfileTable::default()
        };

        let config = RenderConfig {
            profiles,
            printer_model: self.printer_model,
            charset: self.charset,
            raster: RasterSettings {
                scale: self.raster_scale,
                timeout: Duration::from_millis(self.raster_timeout_ms),
            },
            cache: CacheSettings {
                max_age: Duration::from_secs(self.cache_max_age_secs),
                dir: Some(self.cache_dir()),
            },
            ..RenderConfig::default()
        };
        config.validate()?;
        Ok(config)
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
