pub mod scripted;
pub mod tesseract;

pub use scripted::ScriptedRecognizer;
pub use tesseract::TesseractRecognizer;
