//! Extraction session: the per-frame loop and the state it carries.
//!
//! A `Session` owns everything that survives between frames (frame counter, carried
//! altitude, accumulated records, stop state). Frames are processed strictly one at a
//! time. The loop ends when the source runs dry, the source fails, or the frame cap is
//! reached; every other problem only costs the current frame its record.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::ExtractorConfig;
use crate::consensus::ConsensusResolver;
use crate::decode::{Altitude, SkipReason, TelemetryDecoder, TelemetryRecord};
use crate::frame::{Frame, Roi};
use crate::ingest::FrameSource;
use crate::recognize::Recognizer;
use crate::sampler::MultiScaleSampler;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    SourceExhausted,
    FrameCap,
    SourceError,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Stopped(StopReason),
}

/// A record together with the frame that produced it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameRecord {
    pub frame_index: u64,
    pub record: TelemetryRecord,
}

/// What happened to one frame.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    Emitted {
        frame_index: u64,
        record: TelemetryRecord,
        altitude: Altitude,
    },
    Skipped {
        frame_index: u64,
        reason: SkipReason,
    },
}

impl FrameOutcome {
    pub fn frame_index(&self) -> u64 {
        match self {
            FrameOutcome::Emitted { frame_index, .. } | FrameOutcome::Skipped { frame_index, .. } => {
                *frame_index
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    Processed(FrameOutcome),
    Stopped(StopReason),
}

/// Counters for a finished (or running) session.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub records_emitted: u64,
    pub consensus_failures: u64,
    pub format_mismatches: u64,
    pub low_confidence: u64,
    pub altitude_updates: u64,
    pub stop_reason: Option<StopReason>,
}

impl RunSummary {
    fn count(&mut self, outcome: &FrameOutcome) {
        self.frames_processed += 1;
        match outcome {
            FrameOutcome::Emitted { altitude, .. } => {
                self.records_emitted += 1;
                if matches!(altitude, Altitude::Fresh(_)) {
                    self.altitude_updates += 1;
                }
            }
            FrameOutcome::Skipped { reason, .. } => match reason {
                SkipReason::ConsensusFailure => self.consensus_failures += 1,
                SkipReason::FormatMismatch { .. } => self.format_mismatches += 1,
                SkipReason::LowConfidence { .. } => self.low_confidence += 1,
            },
        }
    }
}

/// Stateless per-frame stages: region extraction, sampling, consensus, decoding.
#[derive(Clone, Debug)]
pub struct FramePipeline {
    main_roi: Roi,
    altitude_roi: Roi,
    sampler: MultiScaleSampler,
    resolver: ConsensusResolver,
    decoder: TelemetryDecoder,
    dump_dir: Option<PathBuf>,
}

impl FramePipeline {
    pub fn from_config(cfg: &ExtractorConfig) -> Self {
        Self {
            main_roi: cfg.main_roi,
            altitude_roi: cfg.altitude_roi,
            sampler: MultiScaleSampler::new(cfg.scale_factors.clone(), cfg.allowlist.clone()),
            resolver: ConsensusResolver::new(cfg.needed_occurrences),
            decoder: TelemetryDecoder::new(cfg.confidence_threshold, cfg.integer_digits),
            dump_dir: cfg.dump_dir.clone(),
        }
    }

    /// Run all stages on one frame. `carried_altitude` is updated on a fresh altitude.
    pub fn process(
        &self,
        frame: &Frame,
        engine: &mut dyn Recognizer,
        carried_altitude: &mut f64,
    ) -> FrameOutcome {
        let main_crop = frame.crop(&self.main_roi);
        if main_crop.is_none() {
            log::debug!(
                "Frame {}: main ROI ({}) outside {}x{} frame",
                frame.index,
                self.main_roi,
                frame.width(),
                frame.height()
            );
        }
        let main = main_crop
            .as_ref()
            .map(|crop| self.sampler.sample(crop, engine))
            .and_then(|samples| self.resolver.resolve(&samples));
        let altitude = frame
            .crop(&self.altitude_roi)
            .map(|crop| self.sampler.sample(&crop, engine))
            .and_then(|samples| self.resolver.resolve(&samples));

        match self
            .decoder
            .decode(main.as_ref(), altitude.as_ref(), carried_altitude)
        {
            Ok((record, altitude)) => {
                log::info!(
                    "Frame {}: {:?}, {:?}, {:?}",
                    frame.index,
                    record.latitude,
                    record.longitude,
                    record.altitude
                );
                if let Altitude::Carried(value) = altitude {
                    log::debug!("Frame {}: altitude carried forward ({:?})", frame.index, value);
                }
                FrameOutcome::Emitted {
                    frame_index: frame.index,
                    record,
                    altitude,
                }
            }
            Err(reason) => {
                match &reason {
                    SkipReason::FormatMismatch { .. } => {
                        log::debug!("Frame {}: {}, skipping.", frame.index, reason)
                    }
                    _ => log::info!("Frame {}: {}, skipping.", frame.index, reason),
                }
                if reason == SkipReason::ConsensusFailure {
                    if let Some(crop) = &main_crop {
                        self.dump_crop(frame.index, crop);
                    }
                }
                FrameOutcome::Skipped {
                    frame_index: frame.index,
                    reason,
                }
            }
        }
    }

    fn dump_crop(&self, frame_index: u64, crop: &image::RgbImage) {
        let Some(dir) = &self.dump_dir else {
            return;
        };
        let path = dir.join(format!("frame_{:06}_main.png", frame_index));
        if let Err(e) = crop.save(&path) {
            log::warn!("failed to dump {}: {}", path.display(), e);
        }
    }
}

pub struct Session {
    pipeline: FramePipeline,
    frame_cap: u64,
    frame_index: u64,
    carried_altitude: f64,
    records: Vec<FrameRecord>,
    state: SessionState,
    summary: RunSummary,
}

impl Session {
    pub fn new(cfg: &ExtractorConfig) -> Result<Self> {
        if let Some(dir) = &cfg.dump_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create dump directory {}", dir.display()))?;
        }
        Ok(Self {
            pipeline: FramePipeline::from_config(cfg),
            frame_cap: cfg.frame_cap,
            frame_index: 0,
            carried_altitude: 0.0,
            records: Vec::new(),
            state: SessionState::Running,
            summary: RunSummary::default(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn carried_altitude(&self) -> f64 {
        self.carried_altitude
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Pull and process one frame.
    pub fn step(&mut self, source: &mut dyn FrameSource, engine: &mut dyn Recognizer) -> Step {
        if let SessionState::Stopped(reason) = self.state {
            return Step::Stopped(reason);
        }

        let image = match source.next_frame() {
            Ok(Some(image)) => image,
            Ok(None) => return self.stop(StopReason::SourceExhausted),
            Err(e) => {
                log::error!("frame source failed after frame {}: {:#}", self.frame_index, e);
                return self.stop(StopReason::SourceError);
            }
        };

        self.frame_index += 1;
        let frame = Frame::new(self.frame_index, image);
        let outcome = self
            .pipeline
            .process(&frame, engine, &mut self.carried_altitude);
        self.summary.count(&outcome);
        if let FrameOutcome::Emitted {
            frame_index,
            record,
            ..
        } = &outcome
        {
            self.records.push(FrameRecord {
                frame_index: *frame_index,
                record: *record,
            });
        }

        if self.frame_index >= self.frame_cap {
            log::info!("frame cap {} reached, stopping", self.frame_cap);
            self.stop(StopReason::FrameCap);
        }
        Step::Processed(outcome)
    }

    /// Step until stopped, reporting every processed frame to `on_frame`.
    pub fn run_with(
        &mut self,
        source: &mut dyn FrameSource,
        engine: &mut dyn Recognizer,
        mut on_frame: impl FnMut(&FrameOutcome),
    ) -> StopReason {
        loop {
            match self.step(source, engine) {
                Step::Processed(outcome) => on_frame(&outcome),
                Step::Stopped(reason) => return reason,
            }
        }
    }

    pub fn run(&mut self, source: &mut dyn FrameSource, engine: &mut dyn Recognizer) -> StopReason {
        self.run_with(source, engine, |_| {})
    }

    /// Consume the session, yielding records in frame order and the summary.
    pub fn finish(self) -> (Vec<TelemetryRecord>, RunSummary) {
        let records = self.records.into_iter().map(|r| r.record).collect();
        (records, self.summary)
    }

    fn stop(&mut self, reason: StopReason) -> Step {
        self.state = SessionState::Stopped(reason);
        self.summary.stop_reason = Some(reason);
        Step::Stopped(reason)
    }
}

/// Run a full extraction and persist the records to `cfg.output_path`.
///
/// The source and engine are held for the whole run and released when it ends.
pub fn extract<S, R>(cfg: &ExtractorConfig, mut source: S, mut engine: R) -> Result<RunSummary>
where
    S: FrameSource,
    R: Recognizer,
{
    cfg.validate()?;
    engine.warm_up()?;
    let mut session = Session::new(cfg)?;
    session.run(&mut source, &mut engine);
    drop(source);
    drop(engine);

    let (records, summary) = session.finish();
    crate::output::write_records(&cfg.output_path, &records)?;
    log::info!(
        "Data saved to {} ({} records from {} frames)",
        cfg.output_path.display(),
        summary.records_emitted,
        summary.frames_processed
    );
    Ok(summary)
}
