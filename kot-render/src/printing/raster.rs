//! Rasterizer: markup to monochrome bitmap
//!
//! A [`MarkupRenderer`] turns HTML into a PNG off-process; [`Rasterizer`]
//! bounds that call with a timeout, then thresholds, packs and trims the
//! capture into a [`RenderedArtifact`].

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use image::RgbaImage;
use image::imageops::{self, FilterType};
use kot_printer::{PrintResult, RasterImage, is_ink};
use tokio::process::Command;

use super::error::RasterFailure;

/// Default headless browser executable
pub const DEFAULT_BROWSER: &str = "chromium";

/// First window height tried, in CSS px; doubled while content reaches the bottom
const DEFAULT_WINDOW_HEIGHT: u32 = 2000;

/// Tallest window tried before giving up
const DEFAULT_MAX_HEIGHT: u32 = 32000;

/// Markup to PNG conversion
#[async_trait]
pub trait MarkupRenderer: Send + Sync {
    /// Render `markup` at `viewport_width` device pixels and return PNG bytes
    async fn render(&self, markup: &str, viewport_width: u32, scale: f32) -> Result<Vec<u8>, RasterFailure>;
}

/// Chromium-compatible browser run once per conversion
///
/// Each call gets its own scratch directory, removed when the call ends,
/// and the child process is killed if the call is dropped (timeout).
#[derive(Debug, Clone)]
pub struct HeadlessBrowser {
    binary: PathBuf,
    window_height: u32,
    max_height: u32,
}

impl HeadlessBrowser {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            window_height: DEFAULT_WINDOW_HEIGHT,
            max_height: DEFAULT_MAX_HEIGHT,
        }
    }

    pub fn with_max_height(mut self, max_height: u32) -> Self {
        self.max_height = max_height;
        self
    }
}

impl Default for HeadlessBrowser {
    fn default() -> Self {
        Self::new(DEFAULT_BROWSER)
    }
}

#[async_trait]
impl MarkupRenderer for HeadlessBrowser {
    async fn render(&self, markup: &str, viewport_width: u32, scale: f32) -> Result<Vec<u8>, RasterFailure> {
        let scratch = tempfile::tempdir()?;
        let page = scratch.path().join("page.html");
        let capture = scratch.path().join("capture.png");
        tokio::fs::write(&page, markup).await?;

        let css_width = (viewport_width as f32 / scale).ceil() as u32;
        let mut height = self.window_height.min(self.max_height).max(1);
        loop {
            let png = self.capture(&page, &capture, css_width, height, scale).await?;
            if height >= self.max_height || !reaches_bottom(&png) {
                return Ok(png);
            }
            tracing::debug!(window_height = height, "Content reaches the window bottom, retrying taller");
            height = height.saturating_mul(2).min(self.max_height);
        }
    }
}

impl HeadlessBrowser {
    async fn capture(
        &self,
        page: &Path,
        capture: &Path,
        css_width: u32,
        height: u32,
        scale: f32,
    ) -> Result<Vec<u8>, RasterFailure> {
        let started_at = Instant::now();
        let output = Command::new(&self.binary)
            .arg("--headless")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--hide-scrollbars")
            .arg(format!("--force-device-scale-factor={}", scale))
            .arg(format!("--window-size={},{}", css_width, height))
            .arg(format!("--screenshot={}", capture.display()))
            .arg(format!("file://{}", page.display()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                tracing::warn!(
                    binary = %self.binary.display(),
                    error = %e,
                    "Failed to spawn headless browser"
                );
                RasterFailure::Spawn(format!("{}: {}", self.binary.display(), e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            tracing::warn!(
                status = %output.status,
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                stderr = %stderr,
                "Headless browser exited with failure"
            );
            return Err(RasterFailure::Exited {
                status: output.status.to_string(),
                stderr,
            });
        }

        let png = tokio::fs::read(capture).await?;
        tracing::debug!(
            bytes = png.len(),
            window_height = height,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Markup captured"
        );
        Ok(png)
    }
}

/// Whether a capture has ink on its last row; undecodable captures are left
/// for [`RenderedArtifact::from_png`] to report
fn reaches_bottom(png: &[u8]) -> bool {
    image::load_from_memory(png)
        .map(|img| last_row_has_ink(&img.to_rgba8()))
        .unwrap_or(false)
}

/// A rasterized page, packed for the printer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    /// Captured PNG; absent when the artifact was loaded from the durable cache
    pub raw: Option<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    /// 1 bit per pixel, MSB first, rows padded to whole bytes
    pub bitmap: Vec<u8>,
}

impl RenderedArtifact {
    /// Decode, fit to `target_width`, trim trailing blank rows and pack
    ///
    /// A capture whose last row carries ink was cut off by the window and
    /// fails with [`RasterFailure::Truncated`].
    pub fn from_png(png: Vec<u8>, target_width: u32) -> Result<Self, RasterFailure> {
        let decoded = image::load_from_memory(&png)
            .map_err(|e| RasterFailure::Decode(e.to_string()))?
            .to_rgba8();
        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(RasterFailure::Decode("captured image is empty".to_string()));
        }

        let fitted = if decoded.width() != target_width {
            let height = (decoded.height() as u64 * target_width as u64 / decoded.width() as u64).max(1) as u32;
            imageops::resize(&decoded, target_width, height, FilterType::Triangle)
        } else {
            decoded
        };
        if last_row_has_ink(&fitted) {
            return Err(RasterFailure::Truncated(fitted.height()));
        }

        let height = content_height(&fitted);
        let trimmed = if height < fitted.height() {
            imageops::crop_imm(&fitted, 0, 0, fitted.width(), height).to_image()
        } else {
            fitted
        };

        let raster = RasterImage::from_image(&trimmed).map_err(|e| RasterFailure::Decode(e.to_string()))?;
        Ok(Self {
            raw: Some(png),
            width: raster.width(),
            height: raster.height(),
            bitmap: raster.into_data(),
        })
    }

    /// Packed image ready for GS v 0 framing
    pub fn to_raster(&self) -> PrintResult<RasterImage> {
        RasterImage::from_packed(self.width, self.height, self.bitmap.clone())
    }
}

fn row_has_ink(img: &RgbaImage, y: u32) -> bool {
    (0..img.width()).any(|x| {
        let p = img.get_pixel(x, y).0;
        is_ink(p[0], p[1], p[2], p[3])
    })
}

fn last_row_has_ink(img: &RgbaImage) -> bool {
    img.height() > 0 && row_has_ink(img, img.height() - 1)
}

/// Rows up to and including the last one with ink; at least one row
fn content_height(img: &RgbaImage) -> u32 {
    (0..img.height())
        .rev()
        .find(|&y| row_has_ink(img, y))
        .map(|y| y + 1)
        .unwrap_or(1)
}

/// Bounded markup-to-bitmap conversion
#[derive(Clone)]
pub struct Rasterizer {
    renderer: Arc<dyn MarkupRenderer>,
    timeout: Duration,
}

impl Rasterizer {
    pub fn new(renderer: Arc<dyn MarkupRenderer>, timeout: Duration) -> Self {
        Self { renderer, timeout }
    }

    /// Fails fast with [`RasterFailure::Timeout`]; dropping the render future
    /// kills the child process and removes its scratch files.
    #[tracing::instrument(skip(self, markup), fields(markup_len = markup.len()))]
    pub async fn rasterize(
        &self,
        markup: &str,
        pixel_width: u32,
        scale: f32,
    ) -> Result<RenderedArtifact, RasterFailure> {
        let started_at = Instant::now();
        let png = match tokio::time::timeout(self.timeout, self.renderer.render(markup, pixel_width, scale)).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "Rasterization timed out");
                return Err(RasterFailure::Timeout(self.timeout));
            }
        };

        let artifact = RenderedArtifact::from_png(png, pixel_width)?;
        tracing::debug!(
            width = artifact.width,
            height = artifact.height,
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Markup rasterized"
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgba};

    use super::*;

    fn png(width: u32, height: u32, ink_rows: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |_, y| {
            if y < ink_rows {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    struct StaticRenderer(Vec<u8>);

    #[async_trait]
    impl MarkupRenderer for StaticRenderer {
        async fn render(&self, _: &str, _: u32, _: f32) -> Result<Vec<u8>, RasterFailure> {
            Ok(self.0.clone())
        }
    }

    struct StuckRenderer;

    #[async_trait]
    impl MarkupRenderer for StuckRenderer {
        async fn render(&self, _: &str, _: u32, _: f32) -> Result<Vec<u8>, RasterFailure> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_artifact_trims_trailing_blank_rows() {
        let artifact = RenderedArtifact::from_png(png(16, 40, 10), 16).unwrap();
        assert_eq!(artifact.width, 16);
        assert_eq!(artifact.height, 10);
        assert_eq!(artifact.bitmap, vec![0xFF; 2 * 10]);
        assert!(artifact.raw.is_some());
    }

    #[test]
    fn test_blank_capture_keeps_one_row() {
        let artifact = RenderedArtifact::from_png(png(8, 5, 0), 8).unwrap();
        assert_eq!(artifact.height, 1);
        assert_eq!(artifact.bitmap, vec![0x00]);
    }

    #[test]
    fn test_artifact_fits_target_width() {
        let artifact = RenderedArtifact::from_png(png(64, 64, 32), 32).unwrap();
        assert_eq!(artifact.width, 32);
        assert!(artifact.height < 32);
        assert_eq!(artifact.to_raster().unwrap().stride(), 4);
    }

    #[test]
    fn test_ink_on_last_row_is_truncation() {
        let result = RenderedArtifact::from_png(png(16, 40, 40), 16);
        assert!(matches!(result, Err(RasterFailure::Truncated(40))));
    }

    #[test]
    fn test_reaches_bottom() {
        assert!(reaches_bottom(&png(8, 6, 6)));
        assert!(!reaches_bottom(&png(8, 6, 5)));
        assert!(!reaches_bottom(b"not a png"));
    }

    #[test]
    fn test_garbage_is_decode_failure() {
        assert!(matches!(
            RenderedArtifact::from_png(b"not a png".to_vec(), 8),
            Err(RasterFailure::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_rasterizer_uses_renderer() {
        let rasterizer = Rasterizer::new(Arc::new(StaticRenderer(png(24, 12, 3))), Duration::from_secs(5));
        let artifact = rasterizer.rasterize("<p>x</p>", 24, 1.0).await.unwrap();
        assert_eq!((artifact.width, artifact.height), (24, 3));
    }

    #[tokio::test]
    async fn test_rasterizer_rejects_cut_off_capture() {
        let rasterizer = Rasterizer::new(Arc::new(StaticRenderer(png(24, 12, 12))), Duration::from_secs(5));
        let result = rasterizer.rasterize("<p>x</p>", 24, 1.0).await;
        assert!(matches!(result, Err(RasterFailure::Truncated(12))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rasterizer_times_out() {
        let rasterizer = Rasterizer::new(Arc::new(StuckRenderer), Duration::from_millis(200));
        let result = rasterizer.rasterize("<p>x</p>", 24, 1.0).await;
        assert!(matches!(result, Err(RasterFailure::Timeout(_))));
    }

    #[tokio::test]
    async fn test_missing_browser_is_spawn_failure() {
        let browser = HeadlessBrowser::new("/nonexistent/kot-browser");
        let result = browser.render("<p>x</p>", 384, 1.0).await;
        assert!(matches!(result, Err(RasterFailure::Spawn(_))));
    }
}
