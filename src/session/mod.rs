//! Session orchestration
//!
//! A [`Session`] owns one dataset and everything derived from it: the target
//! column and problem type, the preprocessed split and the trained model records.
//! [`SharedSession`] wraps it for use across threads and [`ModelArtifact`]
//! is what a session persists for later prediction.

mod artifact;
mod config;
#[allow(clippy::module_inception)]
mod session;
mod shared;

pub use artifact::{ModelArtifact, Predictions};
pub use config::SessionConfig;
pub use session::Session;
pub use shared::SharedSession;
