//! Automatic problem analysis
//!
//! Inspects the target column of a dataset and decides which kind of
//! learning problem it describes.

mod detector;

pub use detector::{ProblemType, ProblemTypeDetector, TargetSpec};
