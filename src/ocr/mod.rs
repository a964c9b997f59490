pub mod engine;
pub mod extract;
pub mod preprocess;
pub mod setup;

pub use engine::{OcrProfile, TextRecognizer};
pub use preprocess::prepare_for_ocr;
pub use setup::tesseract_engine;
