//! Kinetrack Track Model
//!
//! Defines the core data contracts for motion tracking:
//! - **Clip windows:** The frame/step coordinate system of a clip
//! - **Channels:** Sparse per-frame samples with keyframe markers
//! - **Tracks:** Channels grouped by tracked object, tagged by kind
//! - **Documents:** A clip, its frame clock, and its tracks
//!
//! Frames index the source footage; steps index the clip's sampled
//! sequence. Every channel is keyed by frame number.

pub mod channel;
pub mod clip;
pub mod document;
pub mod sample;
pub mod track;

pub use channel::*;
pub use clip::*;
pub use document::*;
pub use sample::*;
pub use track::*;
