//! Text recognition engines.
//!
//! The pipeline only sees the [`Recognizer`] contract: an RGB sub-image plus an
//! allowlist in, an ordered list of `(text, confidence)` detections out. Any engine
//! that honors that contract can be substituted.

mod backend;
mod backends;

pub use backend::{Detection, Recognizer};
pub use backends::{ScriptedRecognizer, TesseractRecognizer};
