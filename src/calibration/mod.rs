//! Resolution-independent screen calibration.
//!
//! - `registry`: static reference-pixel regions per screen type
//! - `extract`: maps those regions onto a screenshot of any size
//! - `preview`: draws the regions onto a screenshot for checking

pub mod extract;
pub mod preview;
pub mod registry;

pub use extract::{PointSample, RegionExtractor};
pub use registry::{
    CalibrationRegistry, FieldKey, Region, ScreenType, SELECT_PIVOT_SCAN,
};
