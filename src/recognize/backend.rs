use anyhow::Result;
use image::RgbImage;

/// One recognized text run and the engine's confidence in it (0..=1).
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub text: String,
    pub confidence: f32,
}

impl Detection {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Recognition engine contract.
///
/// Engines are acquired once per run and called sequentially, so `recognize` takes
/// `&mut self` and implementations may keep per-run state.
pub trait Recognizer: Send {
    /// Engine identifier.
    fn name(&self) -> &'static str;

    /// Recognize text in `image`, restricted to characters in `allowlist`.
    ///
    /// Detections are returned in reading order. Texts are passed through untouched;
    /// whitespace cleanup is the caller's job.
    fn recognize(&mut self, image: &RgbImage, allowlist: &str) -> Result<Vec<Detection>>;

    /// Optional availability check run once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
