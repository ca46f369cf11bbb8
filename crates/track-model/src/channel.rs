//! Sparse per-frame channels with keyframe markers.
//!
//! Most frames of a track hold nothing. A channel stores only the frames that
//! do, plus the subset of those frames that were authored directly
//! (keyframes). Every keyframe has a value; interpolated or derived values
//! are present without being keyframes.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeBounds;

use serde::{Deserialize, Serialize};

use kinetrack_common::KinetrackError;

use crate::clip::Frame;

/// Ordered `frame -> value` mapping with keyframe markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "RawChannel<T>",
    into = "RawChannel<T>",
    bound(
        serialize = "T: Serialize + Clone",
        deserialize = "T: Deserialize<'de>"
    )
)]
pub struct SparseChannel<T> {
    samples: BTreeMap<Frame, T>,
    keyframes: BTreeSet<Frame>,
}

#[derive(Serialize, Deserialize)]
struct RawChannel<T> {
    samples: BTreeMap<Frame, T>,
    #[serde(default)]
    keyframes: BTreeSet<Frame>,
}

impl<T> TryFrom<RawChannel<T>> for SparseChannel<T> {
    type Error = KinetrackError;

    fn try_from(raw: RawChannel<T>) -> Result<Self, Self::Error> {
        if let Some(orphan) = raw.keyframes.iter().find(|f| !raw.samples.contains_key(f)) {
            return Err(KinetrackError::invalid_channel(format!(
                "keyframe {orphan} has no value"
            )));
        }
        Ok(Self {
            samples: raw.samples,
            keyframes: raw.keyframes,
        })
    }
}

impl<T> From<SparseChannel<T>> for RawChannel<T> {
    fn from(channel: SparseChannel<T>) -> Self {
        Self {
            samples: channel.samples,
            keyframes: channel.keyframes,
        }
    }
}

impl<T> Default for SparseChannel<T> {
    fn default() -> Self {
        Self {
            samples: BTreeMap::new(),
            keyframes: BTreeSet::new(),
        }
    }
}

impl<T> SparseChannel<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value at a frame, if present.
    pub fn get(&self, frame: Frame) -> Option<&T> {
        self.samples.get(&frame)
    }

    /// Store a value, marking or unmarking the frame as a keyframe.
    pub fn set(&mut self, frame: Frame, value: T, keyframe: bool) {
        self.samples.insert(frame, value);
        if keyframe {
            self.keyframes.insert(frame);
        } else {
            self.keyframes.remove(&frame);
        }
    }

    /// Store an authored value.
    pub fn set_keyframe(&mut self, frame: Frame, value: T) {
        self.set(frame, value, true);
    }

    /// Store an interpolated or derived value.
    pub fn set_derived(&mut self, frame: Frame, value: T) {
        self.set(frame, value, false);
    }

    /// Remove the value (and keyframe marker) at a frame.
    pub fn remove(&mut self, frame: Frame) -> Option<T> {
        self.keyframes.remove(&frame);
        self.samples.remove(&frame)
    }

    /// Keyframes in ascending order.
    pub fn keyframes(&self) -> &BTreeSet<Frame> {
        &self.keyframes
    }

    pub fn contains(&self, frame: Frame) -> bool {
        self.samples.contains_key(&frame)
    }

    pub fn is_keyframe(&self, frame: Frame) -> bool {
        self.keyframes.contains(&frame)
    }

    /// Present values in ascending frame order.
    pub fn iter(&self) -> impl Iterator<Item = (Frame, &T)> + '_ {
        self.samples.iter().map(|(f, v)| (*f, v))
    }

    /// Present values within a frame range.
    pub fn range<R: RangeBounds<Frame>>(
        &self,
        range: R,
    ) -> impl Iterator<Item = (Frame, &T)> + '_ {
        self.samples.range(range).map(|(f, v)| (*f, v))
    }

    /// Nearest keyframe strictly before `frame`.
    pub fn keyframe_before(&self, frame: Frame) -> Option<Frame> {
        self.keyframes.range(..frame).next_back().copied()
    }

    /// Nearest keyframe strictly after `frame`.
    pub fn keyframe_after(&self, frame: Frame) -> Option<Frame> {
        self.keyframes
            .range((std::ops::Bound::Excluded(frame), std::ops::Bound::Unbounded))
            .next()
            .copied()
    }

    pub fn first_frame(&self) -> Option<Frame> {
        self.samples.keys().next().copied()
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.samples.keys().next_back().copied()
    }

    /// Number of present values.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length of the equivalent dense array: last present frame + 1.
    pub fn slot_len(&self) -> usize {
        self.last_frame().map_or(0, |f| f + 1)
    }

    /// Remove every value in a frame range, keyframes included.
    pub fn clear_range<R: RangeBounds<Frame>>(&mut self, range: R) {
        let frames: Vec<Frame> = self.range(range).map(|(f, _)| f).collect();
        for frame in frames {
            self.remove(frame);
        }
    }

    /// Remove non-keyframe values strictly between two frames.
    pub fn clear_derived_between(&mut self, from: Frame, to: Frame) {
        if to <= from + 1 {
            return;
        }
        let stale: Vec<Frame> = self
            .samples
            .range(from + 1..to)
            .map(|(f, _)| *f)
            .filter(|f| !self.keyframes.contains(f))
            .collect();
        for frame in stale {
            self.samples.remove(&frame);
        }
    }

    /// Copy every entry of `other` into this channel, overwriting collisions.
    pub fn merge_from(&mut self, other: SparseChannel<T>) {
        for (frame, value) in other.samples {
            let keyframe = other.keyframes.contains(&frame);
            self.set(frame, value, keyframe);
        }
    }

    /// Convert values, dropping frames where `f` returns `None`.
    ///
    /// Keyframe markers follow the values that survive.
    pub fn map_values<U>(&self, mut f: impl FnMut(&T) -> Option<U>) -> SparseChannel<U> {
        let mut out = SparseChannel::new();
        for (frame, value) in &self.samples {
            if let Some(mapped) = f(value) {
                out.set(*frame, mapped, self.keyframes.contains(frame));
            }
        }
        out
    }
}

impl<T: Clone> SparseChannel<T> {
    /// Dense view: `slots[frame]` holds the value at that frame.
    pub fn to_slots(&self) -> Vec<Option<T>> {
        let mut slots = vec![None; self.slot_len()];
        for (frame, value) in &self.samples {
            slots[*frame] = Some(value.clone());
        }
        slots
    }

    /// Build a channel from a dense array, every present value a keyframe.
    pub fn from_slots(slots: &[Option<T>]) -> Self {
        let mut channel = Self::new();
        for (frame, value) in slots.iter().enumerate() {
            if let Some(value) = value {
                channel.set_keyframe(frame, value.clone());
            }
        }
        channel
    }
}

impl<T> FromIterator<(Frame, T)> for SparseChannel<T> {
    /// Collect authored values; every entry becomes a keyframe.
    fn from_iter<I: IntoIterator<Item = (Frame, T)>>(iter: I) -> Self {
        let mut channel = Self::new();
        for (frame, value) in iter {
            channel.set_keyframe(frame, value);
        }
        channel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_channel() -> SparseChannel<f64> {
        let mut channel = SparseChannel::new();
        channel.set_keyframe(0, 0.0);
        channel.set_derived(2, 1.0);
        channel.set_keyframe(4, 2.0);
        channel
    }

    #[test]
    fn test_keyframes_are_subset_of_values() {
        let mut channel = sample_channel();
        assert!(channel.is_keyframe(0));
        assert!(!channel.is_keyframe(2));
        assert!(channel.contains(2));

        channel.remove(4);
        assert!(!channel.is_keyframe(4));
        assert!(channel.keyframes().iter().all(|f| channel.contains(*f)));
    }

    #[test]
    fn test_set_derived_unmarks_keyframe() {
        let mut channel = sample_channel();
        channel.set_derived(0, 5.0);
        assert!(!channel.is_keyframe(0));
        assert_eq!(channel.get(0), Some(&5.0));
    }

    #[test]
    fn test_neighbour_keyframes() {
        let channel = sample_channel();
        assert_eq!(channel.keyframe_before(4), Some(0));
        assert_eq!(channel.keyframe_after(0), Some(4));
        assert_eq!(channel.keyframe_after(4), None);
        assert_eq!(channel.keyframe_before(0), None);
    }

    #[test]
    fn test_slots_round_trip() {
        let channel = sample_channel();
        let slots = channel.to_slots();
        assert_eq!(slots, vec![Some(0.0), None, Some(1.0), None, Some(2.0)]);
        assert_eq!(channel.slot_len(), 5);

        let rebuilt = SparseChannel::from_slots(&slots);
        assert_eq!(rebuilt.len(), 3);
        assert!(rebuilt.is_keyframe(2));
    }

    #[test]
    fn test_clear_derived_between_keeps_keyframes() {
        let mut channel = sample_channel();
        channel.set_keyframe(3, 9.0);
        channel.clear_derived_between(0, 4);
        assert!(!channel.contains(2));
        assert!(channel.contains(3));
        assert!(channel.contains(0));
    }

    #[test]
    fn test_clear_range() {
        let mut channel = sample_channel();
        channel.clear_range(1..=4);
        assert_eq!(channel.len(), 1);
        assert!(channel.keyframes().iter().eq([0].iter()));
    }

    #[test]
    fn test_map_values_keeps_markers() {
        let channel = sample_channel();
        let mapped = channel.map_values(|v| (*v > 0.5).then(|| v * 10.0));
        assert_eq!(mapped.len(), 2);
        assert_eq!(mapped.get(4), Some(&20.0));
        assert!(mapped.is_keyframe(4));
        assert!(!mapped.is_keyframe(2));
    }

    #[test]
    fn test_deserialize_rejects_orphan_keyframe() {
        let json = r#"{"samples":{"1":2.0},"keyframes":[1,3]}"#;
        assert!(serde_json::from_str::<SparseChannel<f64>>(json).is_err());
        let ok = r#"{"samples":{"1":2.0,"3":4.0},"keyframes":[1,3]}"#;
        let channel: SparseChannel<f64> = serde_json::from_str(ok).unwrap();
        assert_eq!(channel.keyframes().len(), 2);
    }
}
