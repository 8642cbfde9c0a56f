use std::collections::VecDeque;

use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::recognize::backend::{Detection, Recognizer};

enum Reply {
    Detections(Vec<Detection>),
    Failure(String),
}

/// Deterministic engine that replays queued replies in call order.
///
/// Once the queue runs dry every call returns no detections. Used by tests and dry runs.
#[derive(Default)]
pub struct ScriptedRecognizer {
    replies: VecDeque<Reply>,
    calls: usize,
    seen_sizes: Vec<(u32, u32)>,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the detections returned by the next unanswered call.
    pub fn push(&mut self, detections: Vec<Detection>) -> &mut Self {
        self.replies.push_back(Reply::Detections(detections));
        self
    }

    /// Queue `(text, confidence)` pairs as the next reply.
    pub fn push_texts(&mut self, texts: &[(&str, f32)]) -> &mut Self {
        self.push(
            texts
                .iter()
                .map(|(text, conf)| Detection::new(*text, *conf))
                .collect(),
        )
    }

    /// Queue an engine failure as the next reply.
    pub fn push_failure(&mut self, message: impl Into<String>) -> &mut Self {
        self.replies.push_back(Reply::Failure(message.into()));
        self
    }

    /// Number of `recognize` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls
    }

    /// Dimensions of every image passed to `recognize`, in call order.
    pub fn seen_sizes(&self) -> &[(u32, u32)] {
        &self.seen_sizes
    }

    pub fn pending(&self) -> usize {
        self.replies.len()
    }
}

impl Recognizer for ScriptedRecognizer {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn recognize(&mut self, image: &RgbImage, _allowlist: &str) -> Result<Vec<Detection>> {
        self.calls += 1;
        self.seen_sizes.push(image.dimensions());
        match self.replies.pop_front() {
            Some(Reply::Detections(detections)) => Ok(detections),
            Some(Reply::Failure(message)) => Err(anyhow!(message)),
            None => Ok(Vec::new()),
        }
    }
}
