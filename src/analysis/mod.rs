//! Screenshot analysis.
//!
//! This module provides:
//! - The analysis pipeline from a screenshot to a verified result
//! - The result record and its text rendering
//! - Rejection errors with localized messages

pub mod analyzer;
pub mod error;
pub mod report;

pub use analyzer::{AnalysisOutcome, ScreenshotAnalyzer};
pub use error::AnalysisError;
pub use report::{AnalysisResult, AnalysisWarning};
