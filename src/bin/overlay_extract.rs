//! overlay_extract - recover burned-in geo telemetry from a video
//!
//! This tool:
//! 1. Resolves settings (defaults, TOML config, OVERLAY_* env, flags)
//! 2. Opens the frame source and the recognition engine once for the whole run
//! 3. Runs multi-scale OCR consensus on the fixed overlay regions of every frame
//! 4. Stops at end of video or at the frame cap
//! 5. Writes `latitude,longitude,altitude` lines in frame order

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use overlay_telemetry::config::parse_scale_factors;
use overlay_telemetry::output::write_records;
use overlay_telemetry::{
    ExtractorConfig, FileSource, FrameOutcome, FrameSource, Recognizer, Session, StopReason,
    TesseractRecognizer,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Video file or directory of frame images.
    #[arg(value_name = "VIDEO")]
    video: Option<PathBuf>,
    /// TOML config file (overrides OVERLAY_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output record file.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Minimum confidence for coordinates and altitude.
    #[arg(long)]
    confidence_threshold: Option<f32>,
    /// Matching scale samples required to accept a reading.
    #[arg(long)]
    needed_occurrences: Option<usize>,
    /// Comma-separated resize factors, e.g. "1.0,1.1,1.2,1.3,1.5".
    #[arg(long)]
    scale_factors: Option<String>,
    /// Hard limit on processed frames.
    #[arg(long)]
    frame_cap: Option<u64>,
    /// Directory for main-ROI crops of frames that fail consensus.
    #[arg(long)]
    dump_dir: Option<PathBuf>,
    /// Write a JSON run summary to this path.
    #[arg(long)]
    summary: Option<PathBuf>,
    /// Tesseract executable.
    #[arg(long, env = "OVERLAY_TESSERACT")]
    tesseract: Option<String>,
    /// Tesseract page segmentation mode.
    #[arg(long)]
    psm: Option<u32>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

impl Args {
    fn apply(&self, cfg: &mut ExtractorConfig) -> Result<()> {
        if let Some(video) = &self.video {
            cfg.video_path = video.clone();
        }
        if let Some(output) = &self.output {
            cfg.output_path = output.clone();
        }
        if let Some(threshold) = self.confidence_threshold {
            cfg.confidence_threshold = threshold;
        }
        if let Some(needed) = self.needed_occurrences {
            cfg.needed_occurrences = needed;
        }
        if let Some(factors) = &self.scale_factors {
            cfg.scale_factors = parse_scale_factors(factors)?;
        }
        if let Some(cap) = self.frame_cap {
            cfg.frame_cap = cap;
        }
        if let Some(dir) = &self.dump_dir {
            cfg.dump_dir = Some(dir.clone());
        }
        if let Some(binary) = &self.tesseract {
            cfg.engine.binary = binary.clone();
        }
        if let Some(psm) = self.psm {
            cfg.engine.psm = psm;
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = ui::Ui::from_args(Some(&args.ui), std::io::stderr().is_terminal());

    let mut cfg = ExtractorConfig::load(args.config.as_deref())?;
    args.apply(&mut cfg)?;
    cfg.validate()?;

    let mut engine = TesseractRecognizer::new(cfg.engine.clone());
    {
        let _stage = ui.stage("Start recognition engine");
        engine.warm_up()?;
    }
    let mut source = {
        let _stage = ui.stage("Open video");
        FileSource::open(&cfg.video_path)?
    };

    log::info!(
        "extracting from {} (main ROI {}, altitude ROI {}, {} scales, quorum {}, cap {})",
        cfg.video_path.display(),
        cfg.main_roi,
        cfg.altitude_roi,
        cfg.scale_factors.len(),
        cfg.needed_occurrences,
        cfg.frame_cap
    );

    let mut session = Session::new(&cfg)?;
    let stop = {
        let total = source.frame_count().map(|frames| frames.min(cfg.frame_cap));
        let progress = ui.frames(total);
        let mut emitted = 0u64;
        session.run_with(&mut source, &mut engine, |outcome| {
            if matches!(outcome, FrameOutcome::Emitted { .. }) {
                emitted += 1;
            }
            progress.advance(emitted);
        })
    };
    let stats = source.stats();
    drop(source);
    drop(engine);

    match stop {
        StopReason::SourceExhausted => log::info!(
            "end of {} after {} frames",
            stats.path.display(),
            stats.frames_decoded
        ),
        StopReason::FrameCap => log::info!("stopped at frame cap {}", cfg.frame_cap),
        StopReason::SourceError => log::warn!(
            "frame source failed after {} frames; saving what was extracted",
            stats.frames_decoded
        ),
    }

    let (records, summary) = session.finish();
    {
        let _stage = ui.stage("Write records");
        write_records(&cfg.output_path, &records)?;
    }
    log::info!(
        "frames={} records={} consensus_failures={} format_mismatches={} low_confidence={} altitude_updates={}",
        summary.frames_processed,
        summary.records_emitted,
        summary.consensus_failures,
        summary.format_mismatches,
        summary.low_confidence,
        summary.altitude_updates
    );

    if let Some(path) = &args.summary {
        let json = serde_json::to_vec_pretty(&summary)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write summary {}", path.display()))?;
    }
    println!("Data saved to {}", cfg.output_path.display());
    Ok(())
}
