//! Render pipeline: job description in, printer byte stream out
//!
//! Rendering is all-or-nothing: the bytes are assembled in memory and only
//! returned once the whole job has been laid out, rasterized (image mode)
//! and closed with a single cut.

use std::sync::Arc;

use kot_printer::{Align, EscPosBuilder};

use super::cache::{ContentCache, fingerprint};
use super::codec::write_lines;
use super::config::RenderConfig;
use super::error::{RasterFailure, RenderError, RenderResult};
use super::layout::{LayoutEngine, TextLine, render_markup};
use super::profile::PaperProfile;
use super::raster::{RenderedArtifact, Rasterizer};
use super::types::{ContentType, Job, RenderMode};

/// Buzzer pattern for kitchen tickets: 2 beeps of 300ms
const TICKET_BEEP: (u8, u8) = (2, 3);

pub struct RenderPipeline {
    config: Arc<RenderConfig>,
    rasterizer: Option<Rasterizer>,
    cache: Arc<ContentCache>,
}

impl RenderPipeline {
    /// Text-only pipeline; image jobs fail with a recoverable error
    pub fn new(config: RenderConfig) -> Self {
        let cache = ContentCache::new(config.cache.dir.clone(), config.cache.max_age);
        Self {
            config: Arc::new(config),
            rasterizer: None,
            cache: Arc::new(cache),
        }
    }

    pub fn with_rasterizer(mut self, rasterizer: Rasterizer) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    /// Share one cache between pipelines
    pub fn with_cache(mut self, cache: Arc<ContentCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.cache
    }

    /// Render a job in the mode it asks for
    pub async fn render(&self, job: &Job) -> RenderResult<Vec<u8>> {
        self.render_as(job, job.render_mode).await
    }

    /// Render a job in an explicit mode, e.g. text after an image failure
    #[tracing::instrument(
        skip(self, job),
        fields(kind = job.kind.as_str(), paper = job.paper_width_profile.as_str(), mode = ?mode)
    )]
    pub async fn render_as(&self, job: &Job, mode: RenderMode) -> RenderResult<Vec<u8>> {
        self.config.validate()?;
        let profile = self.config.profiles.get(job.paper_width_profile)?;
        let content = job.parse_content()?;
        let engine = LayoutEngine::new(&self.config, profile)?;
        let lines = engine.layout(&content);

        let mut builder = EscPosBuilder::new(profile.chars_per_line, self.config.charset);
        match mode {
            RenderMode::Text => write_lines(&mut builder, &lines, profile),
            RenderMode::Image => {
                let artifact = self.rasterize_cached(job, profile, &lines).await?;
                let raster = artifact.to_raster()?;
                builder.align(Align::Center);
                builder.raster(&raster);
                builder.align(Align::Left);
            }
        }

        if job.kind == ContentType::Ticket && self.config.beep_on_ticket {
            builder.beep(TICKET_BEEP.0, TICKET_BEEP.1);
        }
        builder.finish(self.config.printer_model, self.config.feed_lines);
        let bytes = builder.build();

        tracing::info!(lines = lines.len(), bytes = bytes.len(), "Job rendered");
        Ok(bytes)
    }

    /// Raster cache key of a job under this pipeline's configuration
    pub fn fingerprint(&self, job: &Job) -> RenderResult<String> {
        let profile = self.config.profiles.get(job.paper_width_profile)?;
        Ok(self.key_for(job, profile))
    }

    fn key_for(&self, job: &Job, profile: &PaperProfile) -> String {
        fingerprint(
            job.kind,
            job.paper_width_profile,
            profile,
            &self.config.layout_settings(),
            self.config.raster.scale,
            &job.content,
        )
    }

    /// Cached artifact for this content, rasterizing on a miss
    async fn rasterize_cached(
        &self,
        job: &Job,
        profile: &PaperProfile,
        lines: &[TextLine],
    ) -> RenderResult<Arc<RenderedArtifact>> {
        let scale = self.config.raster.scale;
        let key = self.key_for(job, profile);

        if let Some(artifact) = self.cache.get(&key).await {
            tracing::debug!(fingerprint = %key, "Using cached raster");
            return Ok(artifact);
        }

        let rasterizer = self.rasterizer.as_ref().ok_or_else(|| {
            RenderError::Rasterize(RasterFailure::Spawn("no markup renderer configured".to_string()))
        })?;

        let markup = render_markup(lines, profile, scale)?;
        let artifact = rasterizer.rasterize(&markup, profile.pixel_width, scale).await?;
        tracing::info!(
            fingerprint = %key,
            width = artifact.width,
            height = artifact.height,
            "Rasterized job content"
        );
        Ok(self.cache.put(&key, artifact).await)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::printing::profile::PaperWidth;

    fn ticket_job(mode: &str) -> Job {
        serde_json::from_value(json!({
            "type": "ticket",
            "paperWidthProfile": "58mm",
            "renderMode": mode,
            "content": {
                "header": {
                    "restaurantName": "Spice Route",
                    "ticketNumber": "7",
                    "ticketType": "KOT",
                    "customerName": "Asha",
                    "orderLabel": "T2",
                    "timestamp": "19:00"
                },
                "items": [
                    { "name": "Masala Dosa", "quantity": 2, "status": "NEW" }
                ]
            }
        }))
        .unwrap()
    }

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| *w == needle).count()
    }

    #[tokio::test]
    async fn test_text_job_is_initialized_and_cut_once() {
        let pipeline = RenderPipeline::new(RenderConfig::default());
        let bytes = pipeline.render(&ticket_job("text")).await.unwrap();

        assert!(bytes.starts_with(&[0x1B, 0x40]));
        assert!(bytes.ends_with(&[0x1B, 0x64, 4, 0x1D, 0x56, 0x00]));
        assert_eq!(count(&bytes, &[0x1D, 0x56]), 1);
        assert_eq!(count(&bytes, b"Masala Dosa"), 1);
    }

    #[tokio::test]
    async fn test_beep_on_ticket() {
        let config = RenderConfig {
            beep_on_ticket: true,
            ..RenderConfig::default()
        };
        let bytes = RenderPipeline::new(config)
            .render(&ticket_job("text"))
            .await
            .unwrap();
        assert_eq!(count(&bytes, &[0x1B, 0x42, 2, 3]), 1);
    }

    #[tokio::test]
    async fn test_image_job_without_renderer_is_recoverable() {
        let pipeline = RenderPipeline::new(RenderConfig::default());
        let err = pipeline.render(&ticket_job("image")).await.unwrap_err();
        assert!(err.is_recoverable());

        let fallback = pipeline
            .render_as(&ticket_job("image"), RenderMode::Text)
            .await
            .unwrap();
        assert!(!fallback.is_empty());
    }

    #[tokio::test]
    async fn test_item_name_cannot_inject_commands() {
        let mut job = ticket_job("text");
        job.content["items"][0]["name"] = json!("Naan\x1dV\x00");
        let bytes = RenderPipeline::new(RenderConfig::default())
            .render(&job)
            .await
            .unwrap();

        assert_eq!(count(&bytes, &[0x1D, 0x56]), 1);
        assert!(bytes.ends_with(&[0x1B, 0x64, 4, 0x1D, 0x56, 0x00]));
        assert_eq!(count(&bytes, b"Naan V "), 1);
    }

    #[test]
    fn test_fingerprint_follows_layout_settings() {
        let job = ticket_job("image");
        let base = RenderPipeline::new(RenderConfig::default());
        let other = RenderPipeline::new(RenderConfig {
            major_divider: '#',
            ..RenderConfig::default()
        });
        let beeping = RenderPipeline::new(RenderConfig {
            beep_on_ticket: true,
            ..RenderConfig::default()
        });

        let key = base.fingerprint(&job).unwrap();
        assert_ne!(key, other.fingerprint(&job).unwrap());
        assert_eq!(key, beeping.fingerprint(&job).unwrap());
    }

    #[tokio::test]
    async fn test_zero_width_profile_is_configuration_error() {
        let mut config = RenderConfig::default();
        config.profiles = config
            .profiles
            .with_profile(PaperWidth::Mm58, PaperProfile::new(384, 0));
        let err = RenderPipeline::new(config)
            .render(&ticket_job("text"))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Configuration(_)));
        assert!(!err.is_recoverable());
    }
}
