use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use kot_printer::{NetworkPrinter, Printer};
use kot_render::{
    AgentConfig, HeadlessBrowser, Job, Rasterizer, RenderMode, RenderPipeline, cleanup_old_logs,
    init_logger_with_file,
};

/// Days of rolled log files kept in `{work_dir}/logs`
const LOG_RETENTION_DAYS: i64 = 14;

/// Render a ticket or bill job into an ESC/POS byte stream
#[derive(Parser, Debug)]
#[command(name = "kot-render", version)]
struct Cli {
    /// Job description (JSON)
    job: Option<PathBuf>,

    /// Write the byte stream to this file instead of stdout
    #[arg(long, conflicts_with = "printer")]
    out: Option<PathBuf>,

    /// Send the byte stream to HOST[:PORT] (port 9100 when omitted)
    #[arg(long, env = "KOT_PRINTER_ADDR")]
    printer: Option<String>,

    /// Render in text mode whatever the job asks for
    #[arg(long)]
    text: bool,

    /// Wipe the raster cache before rendering
    #[arg(long)]
    clear_cache: bool,

    /// Remove expired raster cache entries
    #[arg(long)]
    purge_cache: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let config = AgentConfig::from_env();

    let log_dir = config.log_dir();
    init_logger_with_file(&config.log_level, config.log_json, Some(&log_dir))?;
    if let Err(e) = cleanup_old_logs(&log_dir, LOG_RETENTION_DAYS) {
        tracing::warn!(error = %e, "Failed to clean up old logs");
    }

    let render_config = config.render_config()?;
    let rasterizer = Rasterizer::new(
        Arc::new(HeadlessBrowser::new(&config.browser)),
        render_config.raster.timeout,
    );
    let pipeline = RenderPipeline::new(render_config).with_rasterizer(rasterizer);

    if cli.clear_cache {
        pipeline.cache().clear().await;
    }
    if cli.purge_cache {
        pipeline.cache().purge_expired().await;
    }

    let Some(job_path) = cli.job else {
        if cli.clear_cache || cli.purge_cache {
            return Ok(());
        }
        anyhow::bail!("no job file given");
    };

    let raw = std::fs::read(&job_path).with_context(|| format!("cannot read {}", job_path.display()))?;
    let job: Job = serde_json::from_slice(&raw).with_context(|| format!("invalid job in {}", job_path.display()))?;
    let mode = if cli.text { RenderMode::Text } else { job.render_mode };

    let bytes = match pipeline.render_as(&job, mode).await {
        Ok(bytes) => bytes,
        Err(e) if mode == RenderMode::Image && config.fallback_to_text && e.is_recoverable() => {
            tracing::warn!(error = %e, "Image rendering failed, falling back to text mode");
            pipeline.render_as(&job, RenderMode::Text).await?
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(addr) = cli.printer {
        let printer = NetworkPrinter::from_addr(&addr)?.with_timeout(config.printer_timeout());
        printer.print(&bytes).await?;
        tracing::info!(printer = %printer.addr(), bytes = bytes.len(), "Job sent to printer");
    } else if let Some(out) = cli.out {
        std::fs::write(&out, &bytes).with_context(|| format!("cannot write {}", out.display()))?;
        tracing::info!(path = %out.display(), bytes = bytes.len(), "Job written");
    } else {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(&bytes)?;
        stdout.flush()?;
    }

    let stats = pipeline.cache().stats();
    tracing::debug!(hits = stats.hits, misses = stats.misses, "Raster cache stats");
    Ok(())
}
