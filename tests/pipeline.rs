//! End-to-end behavior of the extraction loop with a scripted recognition engine.
//!
//! Every frame costs ten engine calls: five scales on the main ROI, then five on the
//! altitude ROI. The helpers below queue replies in exactly that order.

use std::collections::VecDeque;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use overlay_telemetry::{
    extract, Altitude, ExtractorConfig, FileSource, FrameOutcome, FrameSource, Roi,
    ScriptedRecognizer, Session, SessionState, SkipReason, Step, StopReason,
};

const SCALES: usize = 5;

struct MemorySource {
    frames: VecDeque<Result<RgbImage>>,
    total: u64,
}

impl MemorySource {
    fn blank(count: usize) -> Self {
        let frames: VecDeque<Result<RgbImage>> = (0..count)
            .map(|_| Ok(RgbImage::from_pixel(64, 32, Rgb([20, 20, 20]))))
            .collect();
        Self {
            total: frames.len() as u64,
            frames,
        }
    }

    fn push_error(&mut self, message: &str) {
        self.frames.push_back(Err(anyhow!(message.to_string())));
        self.total += 1;
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        self.frames.pop_front().transpose()
    }

    fn frame_count(&self) -> Option<u64> {
        Some(self.total)
    }
}

fn test_config() -> ExtractorConfig {
    ExtractorConfig {
        video_path: PathBuf::from("memory"),
        main_roi: Roi::new(0, 10, 0, 40),
        altitude_roi: Roi::new(10, 20, 0, 20),
        ..ExtractorConfig::default()
    }
}

/// Queue one frame: `main` holds one entry per scale (`None` = nothing recognized),
/// `altitude` likewise.
fn script_frame(
    engine: &mut ScriptedRecognizer,
    main: &[Option<(&str, &str, f32, f32)>],
    altitude: &[Option<(&str, f32)>],
) {
    assert_eq!(main.len(), SCALES);
    assert_eq!(altitude.len(), SCALES);
    for reply in main {
        match reply {
            Some((lat, lon, lat_conf, lon_conf)) => {
                engine.push_texts(&[(lat, *lat_conf), (lon, *lon_conf)]);
            }
            None => {
                engine.push(Vec::new());
            }
        }
    }
    for reply in altitude {
        match reply {
            Some((alt, conf)) => {
                engine.push_texts(&[(alt, *conf)]);
            }
            None => {
                engine.push(Vec::new());
            }
        }
    }
}

fn steady_main<'a>(lat: &'a str, lon: &'a str, conf: f32) -> Vec<Option<(&'a str, &'a str, f32, f32)>> {
    vec![Some((lat, lon, conf, conf)); SCALES]
}

fn steady_altitude(alt: &str, conf: f32) -> Vec<Option<(&str, f32)>> {
    vec![Some((alt, conf)); SCALES]
}

fn no_altitude() -> Vec<Option<(&'static str, f32)>> {
    vec![None; SCALES]
}

#[test]
fn majority_reading_emits_record() {
    let mut engine = ScriptedRecognizer::new();
    let main = vec![
        Some(("12345678", "09876543", 0.9, 0.8)),
        Some(("12345678", "09876543", 0.7, 0.6)),
        Some(("12345670", "09876543", 0.99, 0.99)),
        Some(("12345678", "09876543", 0.8, 1.0)),
        Some(("12345678", "09876543", 1.0, 0.6)),
    ];
    script_frame(&mut engine, &main, &steady_altitude("120", 0.9));

    let mut source = MemorySource::blank(1);
    let mut session = Session::new(&test_config()).unwrap();
    let step = session.step(&mut source, &mut engine);

    match step {
        Step::Processed(FrameOutcome::Emitted {
            frame_index,
            record,
            altitude,
        }) => {
            assert_eq!(frame_index, 1);
            assert_eq!(record.latitude, 12.345678);
            assert_eq!(record.longitude, 9.876543);
            assert_eq!(record.altitude, 120.0);
            assert_eq!(altitude, Altitude::Fresh(120.0));
        }
        other => panic!("expected a record, got {:?}", other),
    }
    assert_eq!(engine.calls(), 2 * SCALES);
}

#[test]
fn three_of_five_detections_is_not_enough() {
    let mut engine = ScriptedRecognizer::new();
    let main = vec![
        Some(("12345678", "09876543", 0.9, 0.9)),
        None,
        Some(("12345678", "09876543", 0.9, 0.9)),
        None,
        Some(("12345678", "09876543", 0.9, 0.9)),
    ];
    script_frame(&mut engine, &main, &steady_altitude("120", 0.9));

    let mut source = MemorySource::blank(1);
    let mut session = Session::new(&test_config()).unwrap();
    let step = session.step(&mut source, &mut engine);

    assert_eq!(
        step,
        Step::Processed(FrameOutcome::Skipped {
            frame_index: 1,
            reason: SkipReason::ConsensusFailure,
        })
    );
    assert!(session.records().is_empty());
    assert_eq!(session.summary().consensus_failures, 1);
}

#[test]
fn letter_in_field_is_format_mismatch() {
    let mut engine = ScriptedRecognizer::new();
    script_frame(
        &mut engine,
        &steady_main("12O45678", "09876543", 0.95),
        &no_altitude(),
    );

    let mut source = MemorySource::blank(1);
    let mut session = Session::new(&test_config()).unwrap();
    match session.step(&mut source, &mut engine) {
        Step::Processed(FrameOutcome::Skipped {
            reason: SkipReason::FormatMismatch { texts },
            ..
        }) => assert_eq!(texts, vec!["12O45678", "09876543"]),
        other => panic!("expected format mismatch, got {:?}", other),
    }
    assert_eq!(session.summary().format_mismatches, 1);
}

#[test]
fn unsure_altitude_reuses_last_confident_value() {
    let mut engine = ScriptedRecognizer::new();
    script_frame(
        &mut engine,
        &steady_main("12345678", "09876543", 0.9),
        &steady_altitude("120", 0.9),
    );
    script_frame(
        &mut engine,
        &steady_main("12345679", "09876544", 0.9),
        &steady_altitude("250", 0.5),
    );

    let mut source = MemorySource::blank(2);
    let mut session = Session::new(&test_config()).unwrap();
    let stop = session.run(&mut source, &mut engine);

    assert_eq!(stop, StopReason::SourceExhausted);
    let records = session.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].record.altitude, 120.0);
    assert_eq!(records[1].record.altitude, 120.0);
    assert_eq!(records[1].record.latitude, 12.345679);
    assert_eq!(session.carried_altitude(), 120.0);
    assert_eq!(session.summary().altitude_updates, 1);
}

#[test]
fn altitude_defaults_to_zero_until_confident() {
    let mut engine = ScriptedRecognizer::new();
    script_frame(
        &mut engine,
        &steady_main("12345678", "09876543", 0.9),
        &no_altitude(),
    );

    let mut source = MemorySource::blank(1);
    let mut session = Session::new(&test_config()).unwrap();
    session.run(&mut source, &mut engine);

    assert_eq!(session.records()[0].record.altitude, 0.0);
}

#[test]
fn low_confidence_on_both_fields_skips_frame() {
    let mut engine = ScriptedRecognizer::new();
    script_frame(
        &mut engine,
        &steady_main("12345678", "09876543", 0.6),
        &steady_altitude("300", 0.99),
    );

    let mut source = MemorySource::blank(1);
    let mut session = Session::new(&test_config()).unwrap();
    session.run(&mut source, &mut engine);

    assert!(session.records().is_empty());
    assert_eq!(session.summary().low_confidence, 1);
    // The altitude of a skipped frame is never adopted.
    assert_eq!(session.carried_altitude(), 0.0);
}

#[test]
fn frame_cap_halts_the_loop() {
    let mut engine = ScriptedRecognizer::new();
    for _ in 0..10 {
        script_frame(
            &mut engine,
            &steady_main("12345678", "09876543", 0.9),
            &no_altitude(),
        );
    }

    let cfg = ExtractorConfig {
        frame_cap: 3,
        ..test_config()
    };
    let mut source = MemorySource::blank(10);
    let mut session = Session::new(&cfg).unwrap();
    let mut seen = Vec::new();
    let stop = session.run_with(&mut source, &mut engine, |outcome| {
        seen.push(outcome.frame_index())
    });

    assert_eq!(stop, StopReason::FrameCap);
    assert_eq!(seen, vec![1, 2, 3]);
    assert_eq!(session.state(), SessionState::Stopped(StopReason::FrameCap));
    assert!(session.records().iter().all(|r| r.frame_index <= 3));
    assert_eq!(source.frames.len(), 7);
    assert_eq!(
        session.step(&mut source, &mut engine),
        Step::Stopped(StopReason::FrameCap)
    );
}

#[test]
fn records_keep_frame_order_with_gaps() {
    let mut engine = ScriptedRecognizer::new();
    script_frame(
        &mut engine,
        &steady_main("11000000", "22000000", 0.9),
        &no_altitude(),
    );
    script_frame(&mut engine, &vec![None; SCALES], &no_altitude());
    script_frame(
        &mut engine,
        &steady_main("33000000", "44000000", 0.9),
        &no_altitude(),
    );

    let mut source = MemorySource::blank(3);
    let mut session = Session::new(&test_config()).unwrap();
    session.run(&mut source, &mut engine);

    let indices: Vec<u64> = session.records().iter().map(|r| r.frame_index).collect();
    assert_eq!(indices, vec![1, 3]);
    let (records, summary) = session.finish();
    assert_eq!(records[0].latitude, 11.0);
    assert_eq!(records[1].latitude, 33.0);
    assert_eq!(summary.frames_processed, 3);
    assert_eq!(summary.stop_reason, Some(StopReason::SourceExhausted));
}

#[test]
fn source_failure_stops_but_keeps_records() {
    let mut engine = ScriptedRecognizer::new();
    script_frame(
        &mut engine,
        &steady_main("12345678", "09876543", 0.9),
        &no_altitude(),
    );

    let mut source = MemorySource::blank(1);
    source.push_error("corrupt packet");
    let mut session = Session::new(&test_config()).unwrap();
    let stop = session.run(&mut source, &mut engine);

    assert_eq!(stop, StopReason::SourceError);
    assert_eq!(session.records().len(), 1);
    assert_eq!(session.frame_index(), 1);
}

#[test]
fn roi_outside_frame_never_calls_engine() {
    let mut engine = ScriptedRecognizer::new();
    let cfg = ExtractorConfig {
        main_roi: Roi::new(0, 10, 0, 400),
        altitude_roi: Roi::new(0, 100, 0, 10),
        ..test_config()
    };
    let mut source = MemorySource::blank(1);
    let mut session = Session::new(&cfg).unwrap();
    session.run(&mut source, &mut engine);

    assert_eq!(engine.calls(), 0);
    assert_eq!(session.summary().consensus_failures, 1);
}

#[test]
fn failed_frames_are_dumped_when_requested() {
    let dump = tempfile::tempdir().unwrap();
    let cfg = ExtractorConfig {
        dump_dir: Some(dump.path().join("failed")),
        ..test_config()
    };
    let mut engine = ScriptedRecognizer::new();
    let mut source = MemorySource::blank(2);
    let mut session = Session::new(&cfg).unwrap();
    session.run(&mut source, &mut engine);

    let crop = image::open(dump.path().join("failed").join("frame_000002_main.png"))
        .unwrap()
        .to_rgb8();
    assert_eq!(crop.dimensions(), (40, 10));
    assert!(dump.path().join("failed").join("frame_000001_main.png").exists());
}

#[test]
fn extract_writes_record_file_from_frame_directory() {
    let frames = tempfile::tempdir().unwrap();
    for idx in 1..=3 {
        RgbImage::from_pixel(64, 32, Rgb([idx as u8, 0, 0]))
            .save(frames.path().join(format!("frame_{idx:03}.png")))
            .unwrap();
    }
    let out = tempfile::tempdir().unwrap();
    let cfg = ExtractorConfig {
        video_path: frames.path().to_path_buf(),
        output_path: out.path().join("output").join("output.csv"),
        ..test_config()
    };

    let mut engine = ScriptedRecognizer::new();
    script_frame(
        &mut engine,
        &steady_main("12345678", "09876543", 0.9),
        &steady_altitude("120", 0.95),
    );
    script_frame(&mut engine, &vec![None; SCALES], &no_altitude());
    script_frame(
        &mut engine,
        &steady_main("12345680", "09876545", 0.9),
        &steady_altitude("7", 0.2),
    );

    let source = FileSource::open(frames.path()).unwrap();
    let summary = extract(&cfg, source, engine).unwrap();

    assert_eq!(summary.frames_processed, 3);
    assert_eq!(summary.records_emitted, 2);
    let text = std::fs::read_to_string(&cfg.output_path).unwrap();
    assert_eq!(text, "12.345678,9.876543,120.0\n12.34568,9.876545,120.0\n");
}
