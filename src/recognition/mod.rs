//! Screen classification and field recognition.

pub mod classifier;
pub mod difficulty;
pub mod fields;
pub mod glyphs;

pub use classifier::ScreenClassifier;
pub use fields::{FieldRecognizer, HashedCrop};
pub use glyphs::GlyphIndex;
