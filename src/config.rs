use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::frame::Roi;

const DEFAULT_OUTPUT_PATH: &str = "output/output.csv";
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.8;
const DEFAULT_NEEDED_OCCURRENCES: usize = 4;
const DEFAULT_SCALE_FACTORS: [f32; 5] = [1.0, 1.1, 1.2, 1.3, 1.5];
const DEFAULT_FRAME_CAP: u64 = 12_000;
const DEFAULT_MAIN_ROI: Roi = Roi::new(45, 140, 50, 415);
const DEFAULT_ALTITUDE_ROI: Roi = Roi::new(140, 180, 50, 190);
const DEFAULT_ALLOWLIST: &str = "0123456789";
const DEFAULT_INTEGER_DIGITS: usize = 2;
const DEFAULT_ENGINE_BINARY: &str = "tesseract";
const DEFAULT_ENGINE_PSM: u32 = 6;
const DEFAULT_ENGINE_LANGUAGE: &str = "eng";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ExtractorConfigFile {
    video_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
    confidence_threshold: Option<f32>,
    needed_occurrences: Option<usize>,
    scale_factors: Option<Vec<f32>>,
    frame_cap: Option<u64>,
    main_roi: Option<Roi>,
    altitude_roi: Option<Roi>,
    allowlist: Option<String>,
    integer_digits: Option<usize>,
    dump_dir: Option<PathBuf>,
    engine: Option<EngineConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct EngineConfigFile {
    binary: Option<String>,
    psm: Option<u32>,
    language: Option<String>,
}

/// Fully resolved extraction settings.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub video_path: PathBuf,
    pub output_path: PathBuf,
    pub confidence_threshold: f32,
    pub needed_occurrences: usize,
    pub scale_factors: Vec<f32>,
    pub frame_cap: u64,
    pub main_roi: Roi,
    pub altitude_roi: Roi,
    /// Characters the recognition engine may emit.
    pub allowlist: String,
    /// Leading characters of a coordinate field that sit before the decimal point.
    pub integer_digits: usize,
    /// When set, main-ROI crops of frames that fail consensus are written here.
    pub dump_dir: Option<PathBuf>,
    pub engine: EngineSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub binary: String,
    pub psm: u32,
    pub language: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            binary: DEFAULT_ENGINE_BINARY.to_string(),
            psm: DEFAULT_ENGINE_PSM,
            language: DEFAULT_ENGINE_LANGUAGE.to_string(),
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            video_path: PathBuf::new(),
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            needed_occurrences: DEFAULT_NEEDED_OCCURRENCES,
            scale_factors: DEFAULT_SCALE_FACTORS.to_vec(),
            frame_cap: DEFAULT_FRAME_CAP,
            main_roi: DEFAULT_MAIN_ROI,
            altitude_roi: DEFAULT_ALTITUDE_ROI,
            allowlist: DEFAULT_ALLOWLIST.to_string(),
            integer_digits: DEFAULT_INTEGER_DIGITS,
            dump_dir: None,
            engine: EngineSettings::default(),
        }
    }
}

impl ExtractorConfig {
    /// Resolve config from defaults, an optional TOML file, and `OVERLAY_*` env overrides.
    ///
    /// The file path is `config_path` when given, otherwise `OVERLAY_CONFIG` if set.
    /// The result is not validated yet; callers apply CLI overrides first and then call
    /// [`ExtractorConfig::validate`].
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("OVERLAY_CONFIG")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        let file_cfg = match config_path.map(Path::to_path_buf).or(env_path) {
            Some(path) => Some(read_config_file(&path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn from_file(file: ExtractorConfigFile) -> Self {
        let defaults = Self::default();
        let engine = match file.engine {
            Some(engine) => EngineSettings {
                binary: engine.binary.unwrap_or(defaults.engine.binary),
                psm: engine.psm.unwrap_or(defaults.engine.psm),
                language: engine.language.unwrap_or(defaults.engine.language),
            },
            None => defaults.engine,
        };
        Self {
            video_path: file.video_path.unwrap_or(defaults.video_path),
            output_path: file.output_path.unwrap_or(defaults.output_path),
            confidence_threshold: file
                .confidence_threshold
                .unwrap_or(defaults.confidence_threshold),
            needed_occurrences: file
                .needed_occurrences
                .unwrap_or(defaults.needed_occurrences),
            scale_factors: file.scale_factors.unwrap_or(defaults.scale_factors),
            frame_cap: file.frame_cap.unwrap_or(defaults.frame_cap),
            main_roi: file.main_roi.unwrap_or(defaults.main_roi),
            altitude_roi: file.altitude_roi.unwrap_or(defaults.altitude_roi),
            allowlist: file.allowlist.unwrap_or(defaults.allowlist),
            integer_digits: file.integer_digits.unwrap_or(defaults.integer_digits),
            dump_dir: file.dump_dir,
            engine,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(path) = env_value("OVERLAY_VIDEO_PATH") {
            self.video_path = PathBuf::from(path);
        }
        if let Some(path) = env_value("OVERLAY_OUTPUT_PATH") {
            self.output_path = PathBuf::from(path);
        }
        if let Some(value) = env_value("OVERLAY_CONFIDENCE_THRESHOLD") {
            self.confidence_threshold = value.parse().map_err(|_| {
                anyhow!("OVERLAY_CONFIDENCE_THRESHOLD must be a number, got '{}'", value)
            })?;
        }
        if let Some(value) = env_value("OVERLAY_NEEDED_OCCURRENCES") {
            self.needed_occurrences = value.parse().map_err(|_| {
                anyhow!("OVERLAY_NEEDED_OCCURRENCES must be an integer, got '{}'", value)
            })?;
        }
        if let Some(value) = env_value("OVERLAY_FRAME_CAP") {
            self.frame_cap = value
                .parse()
                .map_err(|_| anyhow!("OVERLAY_FRAME_CAP must be an integer, got '{}'", value))?;
        }
        if let Some(value) = env_value("OVERLAY_SCALE_FACTORS") {
            self.scale_factors = parse_scale_factors(&value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.video_path.as_os_str().is_empty() {
            return Err(anyhow!("video_path must be set"));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(anyhow!(
                "confidence_threshold must be within 0..=1, got {}",
                self.confidence_threshold
            ));
        }
        if self.scale_factors.is_empty() {
            return Err(anyhow!("scale_factors must not be empty"));
        }
        if let Some(bad) = self
            .scale_factors
            .iter()
            .find(|factor| !factor.is_finite() || **factor <= 0.0)
        {
            return Err(anyhow!("scale factor {} must be finite and positive", bad));
        }
        if self.needed_occurrences == 0 {
            return Err(anyhow!("needed_occurrences must be at least 1"));
        }
        if self.needed_occurrences > self.scale_factors.len() {
            return Err(anyhow!(
                "needed_occurrences ({}) exceeds the number of scale factors ({})",
                self.needed_occurrences,
                self.scale_factors.len()
            ));
        }
        if self.frame_cap == 0 {
            return Err(anyhow!("frame_cap must be at least 1"));
        }
        for (name, roi) in [("main_roi", &self.main_roi), ("altitude_roi", &self.altitude_roi)] {
            if roi.is_empty() {
                return Err(anyhow!("{} must have a positive area ({})", name, roi));
            }
        }
        if self.integer_digits == 0 {
            return Err(anyhow!("integer_digits must be at least 1"));
        }
        if self.allowlist.trim().is_empty() {
            return Err(anyhow!("allowlist must not be empty"));
        }
        Ok(())
    }
}

/// Parse a comma-separated list of scale factors such as `1.0, 1.2,1.5`.
pub fn parse_scale_factors(value: &str) -> Result<Vec<f32>> {
    split_csv(value)
        .iter()
        .map(|entry| {
            entry
                .parse::<f32>()
                .map_err(|_| anyhow!("invalid scale factor '{}'", entry))
        })
        .collect()
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<ExtractorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
