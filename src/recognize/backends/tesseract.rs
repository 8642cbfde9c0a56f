use std::io::{Cursor, Write};
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};
use image::{ImageFormat, RgbImage};

use crate::config::EngineSettings;
use crate::recognize::backend::{Detection, Recognizer};

/// TSV row level for a single word.
const WORD_LEVEL: u32 = 5;

/// Tesseract CLI engine.
///
/// Each call PNG-encodes the image in memory, pipes it to `tesseract stdin stdout tsv`
/// and turns every recognized text line into one detection. Nothing touches disk.
pub struct TesseractRecognizer {
    settings: EngineSettings,
}

impl TesseractRecognizer {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    fn command(&self, allowlist: &str) -> Command {
        let mut cmd = Command::new(&self.settings.binary);
        cmd.arg("stdin")
            .arg("stdout")
            .arg("-l")
            .arg(&self.settings.language)
            .arg("--psm")
            .arg(self.settings.psm.to_string());
        if !allowlist.is_empty() {
            cmd.arg("-c")
                .arg(format!("tessedit_char_whitelist={}", allowlist));
        }
        cmd.arg("tsv")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Recognizer for TesseractRecognizer {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize(&mut self, image: &RgbImage, allowlist: &str) -> Result<Vec<Detection>> {
        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, ImageFormat::Png)
            .context("encode ROI as PNG")?;

        let mut child = self
            .command(allowlist)
            .spawn()
            .with_context(|| format!("failed to start '{}'", self.settings.binary))?;
        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("tesseract stdin unavailable"))?;
            stdin
                .write_all(png.get_ref())
                .context("write image to tesseract")?;
        }
        let output = child.wait_with_output().context("wait for tesseract")?;
        if !output.status.success() {
            return Err(anyhow!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        let tsv = String::from_utf8(output.stdout).context("tesseract output is not UTF-8")?;
        parse_tsv(&tsv)
    }

    fn warm_up(&mut self) -> Result<()> {
        let output = Command::new(&self.settings.binary)
            .arg("--version")
            .output()
            .with_context(|| format!("failed to start '{}'", self.settings.binary))?;
        if !output.status.success() {
            return Err(anyhow!("'{} --version' failed", self.settings.binary));
        }
        let banner = String::from_utf8_lossy(&output.stdout);
        log::info!(
            "recognition engine: {}",
            banner.lines().next().unwrap_or("tesseract").trim()
        );
        Ok(())
    }
}

/// Group tesseract TSV word rows into line detections, preserving output order.
pub(crate) fn parse_tsv(tsv: &str) -> Result<Vec<Detection>> {
    struct Line {
        key: (u32, u32, u32, u32),
        words: Vec<String>,
        confidences: Vec<f32>,
    }

    let mut lines: Vec<Line> = Vec::new();
    for (row, raw) in tsv.lines().enumerate() {
        if row == 0 || raw.trim().is_empty() {
            continue;
        }
        let cols: Vec<&str> = raw.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let field = |idx: usize| -> Result<u32> {
            cols[idx]
                .parse()
                .map_err(|_| anyhow!("bad tsv column {} on row {}: '{}'", idx, row, cols[idx]))
        };
        if field(0)? != WORD_LEVEL {
            continue;
        }
        let confidence: f32 = cols[10]
            .parse()
            .map_err(|_| anyhow!("bad tsv confidence on row {}: '{}'", row, cols[10]))?;
        let text = cols[11].trim();
        if confidence < 0.0 || text.is_empty() {
            continue;
        }
        let key = (field(1)?, field(2)?, field(3)?, field(4)?);
        match lines.last_mut() {
            Some(line) if line.key == key => {
                line.words.push(text.to_string());
                line.confidences.push(confidence);
            }
            _ => lines.push(Line {
                key,
                words: vec![text.to_string()],
                confidences: vec![confidence],
            }),
        }
    }

    Ok(lines
        .into_iter()
        .map(|line| {
            let mean = line.confidences.iter().sum::<f32>() / line.confidences.len() as f32;
            Detection::new(line.words.join(" "), (mean / 100.0).clamp(0.0, 1.0))
        })
        .collect())
}
