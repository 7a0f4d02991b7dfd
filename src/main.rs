use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, Utc};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use drawstat::config::{cache_path, selection_from_args};
use drawstat::export::export_category;
use drawstat::report::{write_report, ReportOptions};
use drawstat::utils::{setup_logging, validate_args};
use drawstat::{Args, DirSource, DrawSource, HttpSource, Pipeline, PipelineConfig, SnapshotCache};

fn build_source(args: &Args) -> Result<Arc<dyn DrawSource>> {
    match (&args.source_url, &args.source_dir) {
        (Some(url), _) => Ok(Arc::new(HttpSource::new(url)?)),
        (None, Some(dir)) => Ok(Arc::new(DirSource::new(dir)?)),
        (None, None) => anyhow::bail!("Either --source-url or --source-dir is required"),
    }
}

fn build_pipeline(args: &Args) -> Result<Pipeline> {
    let pipeline = Pipeline::new(build_source(args)?, PipelineConfig::from(args))?;
    if args.no_cache {
        return Ok(pipeline);
    }

    let path = cache_path(args);
    match SnapshotCache::open(&path) {
        Ok(cache) => Ok(pipeline.with_cache(cache)),
        Err(e) => {
            warn!(action = "open", component = "snapshot_cache", path = ?path, error = %e, "Continuing without cache");
            Ok(pipeline)
        }
    }
}

fn render(pipeline: &Pipeline, args: &Args, today: NaiveDate) -> Result<()> {
    let dates = pipeline.select(&selection_from_args(args), today);
    let merged = pipeline.merge(&dates);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.json {
        serde_json::to_writer_pretty(&mut out, &merged)?;
        writeln!(out)?;
    } else {
        let options = ReportOptions {
            top: args.top,
            bottom: args.bottom,
            categories: args.category.clone(),
            recent_display: args.recent_display,
        };
        write_report(&mut out, &merged, &options)?;
    }
    out.flush()?;
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let total_start_time = Instant::now();
    let pipeline = build_pipeline(args)?;
    let today = Local::now().date_naive();

    if args.refresh {
        pipeline.discard_cache();
    } else {
        let restored = pipeline.restore(Utc::now());
        info!(action = "restore", component = "pipeline", draw_count = restored, "Restored draws from cache");
    }

    let (recent, backfill) = pipeline.refresh(today);
    info!(action = "phase", component = "pipeline", stored = recent.stored, requested = recent.requested, "Recent draws ready");

    if let Some(backfill) = backfill {
        if args.progressive {
            render(&pipeline, args, today)?;
        }
        if let Some(report) = backfill.wait(&pipeline) {
            info!(action = "phase", component = "pipeline", stored = report.stored, requested = report.requested, "Backfill ready");
        }
    }

    render(&pipeline, args, today)?;

    if let (Some(path), Some(category)) = (&args.export_csv, args.export_category) {
        let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
        let rows = export_category(pipeline.store(), category, BufWriter::new(file))
            .with_context(|| format!("Failed to write {:?}", path))?;
        println!("Exported {} {} values to {}", rows, category, path.display());
    }

    info!(
        action = "complete",
        component = "drawstat",
        duration_ms = total_start_time.elapsed().as_millis(),
        "Run completed"
    );
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);
    validate_args(&args)?;

    match run(&args) {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
