//! Tracks: the channels that describe one tracked object.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use kinetrack_common::{DerivativeDefaults, KinetrackError, KinetrackResult};

use crate::channel::SparseChannel;
use crate::clip::Frame;
use crate::sample::{Sample, Vec2};

/// The quantity a channel holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Marked positions of a point mass.
    Position,
    /// Velocity derived from positions.
    Velocity,
    /// Acceleration derived from positions.
    Acceleration,
    /// Free vector samples (forces, offsets).
    Vector,
    /// Calibration point pairs.
    CalibrationPair,
    /// Tape measure readings.
    TapeLength,
    /// Protractor readings.
    Angle,
    /// Fitted circles.
    FittedCircle,
    /// Reference frame origin/angle/scale keyframes.
    CoordFrame,
}

/// How a channel's frames are re-expressed under a trimmed clip window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemapPolicy {
    /// Reference frame keyframes: step 0 always gets a value, unaligned
    /// frames round up, last write wins.
    Coordinate,
    /// Plain per-frame samples: only frames on the trimmed clip survive.
    PointVector,
    /// Calibration pairs: every entry maps (clamped at step 0), last write wins.
    CalibrationPair,
    /// Tape readings: the latest authored value is carried onto the next step.
    CarryForward,
    /// Protractor readings: carry forward, stopping past the trimmed end frame.
    CarryForwardBounded,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 9] = [
        ChannelKind::Position,
        ChannelKind::Velocity,
        ChannelKind::Acceleration,
        ChannelKind::Vector,
        ChannelKind::CalibrationPair,
        ChannelKind::TapeLength,
        ChannelKind::Angle,
        ChannelKind::FittedCircle,
        ChannelKind::CoordFrame,
    ];

    /// Remap policy used when trimming this kind of channel.
    pub fn remap_policy(&self) -> RemapPolicy {
        match self {
            Self::CoordFrame => RemapPolicy::Coordinate,
            Self::Position
            | Self::Velocity
            | Self::Acceleration
            | Self::Vector
            | Self::FittedCircle => RemapPolicy::PointVector,
            Self::CalibrationPair => RemapPolicy::CalibrationPair,
            Self::TapeLength => RemapPolicy::CarryForward,
            Self::Angle => RemapPolicy::CarryForwardBounded,
        }
    }

    /// Whether the derivative engine owns this channel.
    pub fn is_derived(&self) -> bool {
        matches!(self, Self::Velocity | Self::Acceleration)
    }
}

/// Finite-difference algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DerivativeAlgorithm {
    /// Symmetric central differences.
    #[default]
    FiniteDiff,
    /// Central differences with velocity spill fixed at 2.
    FiniteDiffVspill2,
    /// Central differences that split the stencil at direction reversals.
    BounceDetect,
}

impl FromStr for DerivativeAlgorithm {
    type Err = KinetrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "finite_diff" | "finite-diff" => Ok(Self::FiniteDiff),
            "finite_diff_vspill2" | "finite-diff-vspill2" => Ok(Self::FiniteDiffVspill2),
            "bounce_detect" | "bounce-detect" | "bounce" => Ok(Self::BounceDetect),
            other => Err(KinetrackError::config(format!(
                "unknown derivative algorithm '{other}'"
            ))),
        }
    }
}

impl fmt::Display for DerivativeAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FiniteDiff => "finite_diff",
            Self::FiniteDiffVspill2 => "finite_diff_vspill2",
            Self::BounceDetect => "bounce_detect",
        };
        f.write_str(name)
    }
}

/// Finite-difference parameters for a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDerivativeParams", into = "RawDerivativeParams")]
pub struct DerivativeParams {
    /// Half-width of the velocity stencil, in steps.
    pub spill: usize,
    /// Half-width of the acceleration stencil, in steps.
    pub acceleration_spill: usize,
    pub algorithm: DerivativeAlgorithm,
}

/// Unvalidated serialized form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawDerivativeParams {
    spill: usize,
    acceleration_spill: usize,
    algorithm: DerivativeAlgorithm,
}

impl TryFrom<RawDerivativeParams> for DerivativeParams {
    type Error = KinetrackError;

    fn try_from(raw: RawDerivativeParams) -> Result<Self, Self::Error> {
        Self::new(raw.spill, raw.acceleration_spill, raw.algorithm)
    }
}

impl From<DerivativeParams> for RawDerivativeParams {
    fn from(params: DerivativeParams) -> Self {
        Self {
            spill: params.spill,
            acceleration_spill: params.acceleration_spill,
            algorithm: params.algorithm,
        }
    }
}

impl Default for DerivativeParams {
    fn default() -> Self {
        Self {
            spill: 1,
            acceleration_spill: 2,
            algorithm: DerivativeAlgorithm::FiniteDiff,
        }
    }
}

impl DerivativeParams {
    pub fn new(
        spill: usize,
        acceleration_spill: usize,
        algorithm: DerivativeAlgorithm,
    ) -> KinetrackResult<Self> {
        if spill < 1 || acceleration_spill < 1 {
            return Err(KinetrackError::config(format!(
                "derivative spill must be at least 1 (velocity {spill}, acceleration {acceleration_spill})"
            )));
        }
        Ok(Self {
            spill,
            acceleration_spill,
            algorithm,
        })
    }

    /// Build parameters from configured defaults.
    pub fn from_defaults(defaults: &DerivativeDefaults) -> KinetrackResult<Self> {
        Self::new(
            defaults.velocity_spill,
            defaults.acceleration_spill,
            defaults.algorithm.parse()?,
        )
    }

    /// Velocity spill actually used by the selected algorithm.
    pub fn velocity_spill(&self) -> usize {
        match self.algorithm {
            DerivativeAlgorithm::FiniteDiffVspill2 => 2,
            _ => self.spill,
        }
    }

    /// Widest stencil half-width in use.
    pub fn max_spill(&self) -> usize {
        self.velocity_spill().max(self.acceleration_spill)
    }
}

/// Inclusive frame range over which a track is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRange {
    pub start: Frame,
    pub end: Frame,
}

impl FrameRange {
    pub fn new(start: Frame, end: Frame) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, frame: Frame) -> bool {
        frame >= self.start && frame <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

/// One tracked object and all of its channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Stable identifier, unique within a document.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Channels by kind. Derived channels are rebuilt, never edited.
    #[serde(default)]
    pub channels: BTreeMap<ChannelKind, SparseChannel<Sample>>,

    /// Frames over which the track is defined (models, circle fits).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_range: Option<FrameRange>,

    /// Derivative settings for point tracks.
    #[serde(default)]
    pub derivatives: DerivativeParams,
}

impl Track {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            channels: BTreeMap::new(),
            valid_range: None,
            derivatives: DerivativeParams::default(),
        }
    }

    pub fn channel(&self, kind: ChannelKind) -> Option<&SparseChannel<Sample>> {
        self.channels.get(&kind)
    }

    /// Channel of the given kind, created empty if missing.
    pub fn channel_mut(&mut self, kind: ChannelKind) -> &mut SparseChannel<Sample> {
        self.channels.entry(kind).or_default()
    }

    /// Marked positions as plain points.
    pub fn positions(&self) -> SparseChannel<Vec2> {
        self.channel(ChannelKind::Position)
            .map(|channel| channel.map_values(Sample::as_point))
            .unwrap_or_default()
    }

    /// Whether the track has any position samples to differentiate.
    pub fn has_positions(&self) -> bool {
        self.channel(ChannelKind::Position)
            .is_some_and(|channel| !channel.is_empty())
    }

    /// Author a position keyframe.
    pub fn mark_position(&mut self, frame: Frame, position: Vec2) {
        self.channel_mut(ChannelKind::Position)
            .set_keyframe(frame, Sample::Point { position });
    }

    /// Drop empty channels.
    pub fn prune_empty(&mut self) {
        self.channels.retain(|_, channel| !channel.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_a_policy() {
        for kind in ChannelKind::ALL {
            let _ = kind.remap_policy();
        }
        assert_eq!(ChannelKind::TapeLength.remap_policy(), RemapPolicy::CarryForward);
        assert_eq!(ChannelKind::Angle.remap_policy(), RemapPolicy::CarryForwardBounded);
        assert_eq!(ChannelKind::CoordFrame.remap_policy(), RemapPolicy::Coordinate);
        assert!(ChannelKind::Velocity.is_derived());
        assert!(!ChannelKind::Position.is_derived());
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!(
            "bounce_detect".parse::<DerivativeAlgorithm>().unwrap(),
            DerivativeAlgorithm::BounceDetect
        );
        assert_eq!(
            "FINITE_DIFF_VSPILL2".parse::<DerivativeAlgorithm>().unwrap(),
            DerivativeAlgorithm::FiniteDiffVspill2
        );
        assert!("spline".parse::<DerivativeAlgorithm>().is_err());
        assert_eq!(DerivativeAlgorithm::BounceDetect.to_string(), "bounce_detect");
    }

    #[test]
    fn test_params_from_defaults() {
        let params = DerivativeParams::from_defaults(&DerivativeDefaults::default()).unwrap();
        assert_eq!(params, DerivativeParams::default());

        let bad = DerivativeDefaults {
            velocity_spill: 0,
            ..Default::default()
        };
        assert!(DerivativeParams::from_defaults(&bad).is_err());
    }

    #[test]
    fn test_deserialize_rejects_zero_spill() {
        let ok: DerivativeParams = serde_json::from_str(
            r#"{"spill":2,"acceleration_spill":1,"algorithm":"bounce_detect"}"#,
        )
        .unwrap();
        assert_eq!(ok, DerivativeParams::new(2, 1, DerivativeAlgorithm::BounceDetect).unwrap());

        for json in [
            r#"{"spill":0,"acceleration_spill":1,"algorithm":"finite_diff"}"#,
            r#"{"spill":1,"acceleration_spill":0,"algorithm":"finite_diff"}"#,
        ] {
            assert!(serde_json::from_str::<DerivativeParams>(json).is_err(), "{json}");
        }
    }

    #[test]
    fn test_vspill2_overrides_velocity_spill() {
        let params = DerivativeParams::new(4, 1, DerivativeAlgorithm::FiniteDiffVspill2).unwrap();
        assert_eq!(params.velocity_spill(), 2);
        assert_eq!(params.max_spill(), 2);
    }

    #[test]
    fn test_positions_extracts_points() {
        let mut track = Track::new("p1", "ball");
        track.mark_position(3, Vec2::new(1.0, 2.0));
        track
            .channel_mut(ChannelKind::Position)
            .set_derived(4, Sample::vector(9.0, 9.0));

        let positions = track.positions();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions.get(3), Some(&Vec2::new(1.0, 2.0)));
        assert!(track.has_positions());
    }

    #[test]
    fn test_frame_range() {
        let range = FrameRange::new(3, 9);
        assert!(range.contains(3));
        assert!(range.contains(9));
        assert!(!range.contains(10));
        assert!(FrameRange::new(5, 4).is_empty());
    }
}
