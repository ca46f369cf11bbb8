//! Kinetrack Kinematics Core
//!
//! The computations behind a motion track:
//! - **Interpolation:** Fill the steps between authored keyframes
//! - **Derivatives:** Velocity, acceleration and rotation by finite differences
//! - **Remapping:** Re-key channels onto a trimmed or re-strided clip
//! - **Export:** Trim a whole document and rebuild what depends on timing
//!
//! This crate is pure computation. Documents come in as data and go out as
//! data; loading and saving live in the track model.

pub mod derivative;
pub mod export;
pub mod interpolate;
pub mod remap;

pub use derivative::{DerivativeEngine, Derivatives, RefreshSummary, RotationData};
pub use export::{trim_document, trim_track};
pub use interpolate::Interpolator;
pub use remap::FrameRemapper;
