//! Detection annotation and frame-difference motion analysis.
//!
//! Predictions from an external detector are validated
//! ([`prediction`]), filtered ([`filter`]), drawn onto a copy of the image
//! with per-session class colors ([`render`], [`color`]) and summarized
//! ([`summary`]). [`pipeline::DetectionSession`] chains these for one user
//! session. [`motion::MotionDetector`] is independent and turns consecutive
//! frames into binary motion masks.
//!
//! All state (color tables, motion reference frames) is owned by the caller.

pub mod color;
pub mod config;
pub mod filter;
pub mod motion;
pub mod pipeline;
pub mod prediction;
pub mod render;
pub mod summary;

pub use color::{ColorAssignment, Rgb};
pub use config::Config;
pub use filter::{ClassSelection, FilterOptions};
pub use motion::{MotionDetector, MotionMask, MotionOutcome, MotionState};
pub use pipeline::{DetectionReport, DetectionSession};
pub use prediction::{BoundingBox, Prediction, RawPrediction};
pub use render::{AnnotatedImage, RenderOptions};
pub use summary::{summarize, Summary};
