//! Multi-scale OCR sampling.
//!
//! One ROI is recognized several times, once per scale factor, so that a single
//! misread does not decide the reading. Resizing uses Lanczos3.

use std::borrow::Cow;

use image::{imageops, imageops::FilterType, RgbImage};

use crate::recognize::Recognizer;

/// One successful recognition pass at a single scale.
#[derive(Clone, Debug, PartialEq)]
pub struct ScaleSample {
    pub factor: f32,
    /// Non-empty, whitespace-free texts in engine order.
    pub texts: Vec<String>,
    /// Confidence per entry of `texts`.
    pub confidences: Vec<f32>,
}

#[derive(Clone, Debug)]
pub struct MultiScaleSampler {
    scale_factors: Vec<f32>,
    allowlist: String,
}

impl MultiScaleSampler {
    pub fn new(scale_factors: Vec<f32>, allowlist: impl Into<String>) -> Self {
        Self {
            scale_factors,
            allowlist: allowlist.into(),
        }
    }

    pub fn scale_factors(&self) -> &[f32] {
        &self.scale_factors
    }

    /// Recognize `roi` at every configured scale.
    ///
    /// Scales whose detections are all blank contribute nothing, and neither do scales
    /// where the engine fails. A zero-area ROI returns no samples without calling the
    /// engine.
    pub fn sample(&self, roi: &RgbImage, engine: &mut dyn Recognizer) -> Vec<ScaleSample> {
        if roi.width() == 0 || roi.height() == 0 {
            return Vec::new();
        }

        let mut samples = Vec::with_capacity(self.scale_factors.len());
        for &factor in &self.scale_factors {
            let scaled = rescale(roi, factor);
            let detections = match engine.recognize(&scaled, &self.allowlist) {
                Ok(detections) => detections,
                Err(e) => {
                    log::warn!("{} failed at scale {}: {:#}", engine.name(), factor, e);
                    continue;
                }
            };

            let mut texts = Vec::with_capacity(detections.len());
            let mut confidences = Vec::with_capacity(detections.len());
            for detection in detections {
                let text = strip_whitespace(&detection.text);
                if !text.is_empty() {
                    texts.push(text);
                    confidences.push(detection.confidence);
                }
            }
            if !texts.is_empty() {
                samples.push(ScaleSample {
                    factor,
                    texts,
                    confidences,
                });
            }
        }
        samples
    }
}

fn rescale(image: &RgbImage, factor: f32) -> Cow<'_, RgbImage> {
    if factor == 1.0 {
        return Cow::Borrowed(image);
    }
    let width = scaled_len(image.width(), factor);
    let height = scaled_len(image.height(), factor);
    Cow::Owned(imageops::resize(image, width, height, FilterType::Lanczos3))
}

fn scaled_len(len: u32, factor: f32) -> u32 {
    ((len as f32 * factor).round() as u32).max(1)
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
