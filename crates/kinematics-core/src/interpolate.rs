//! Keyframe interpolation.
//!
//! Fills the step frames between two keyframes of a channel with values
//! blended linearly by step distance, so that spacing follows the clip's
//! stride rather than raw frame numbers.

use kinetrack_common::{KinetrackError, KinetrackResult};
use kinetrack_track_model::{ClipWindow, Frame, Lerp, SparseChannel};

/// Linear keyframe interpolator bound to a clip window.
#[derive(Debug, Clone, Copy)]
pub struct Interpolator {
    clip: ClipWindow,
}

impl Interpolator {
    pub fn new(clip: ClipWindow) -> Self {
        Self { clip }
    }

    /// Fill the gap between two keyframes.
    ///
    /// Keyframes already inside the gap are kept and split it into sub-gaps.
    /// Returns the number of frames written.
    pub fn fill<T: Lerp>(
        &self,
        channel: &mut SparseChannel<T>,
        from: Frame,
        to: Frame,
    ) -> KinetrackResult<usize> {
        if !channel.is_keyframe(from) {
            return Err(KinetrackError::not_a_keyframe(from));
        }
        if !channel.is_keyframe(to) {
            return Err(KinetrackError::not_a_keyframe(to));
        }
        if to <= from {
            return Ok(0);
        }

        let anchors: Vec<Frame> = channel.keyframes().range(from..=to).copied().collect();
        let filled: usize = anchors
            .windows(2)
            .map(|pair| self.fill_gap(channel, pair[0], pair[1]))
            .sum();

        tracing::trace!(from, to, filled, "filled keyframe gap");
        Ok(filled)
    }

    /// Fill every gap between consecutive keyframes, in ascending frame order.
    pub fn fill_all<T: Lerp>(&self, channel: &mut SparseChannel<T>) -> usize {
        let anchors: Vec<Frame> = channel.keyframes().iter().copied().collect();
        let filled: usize = anchors
            .windows(2)
            .map(|pair| self.fill_gap(channel, pair[0], pair[1]))
            .sum();

        tracing::debug!(keyframes = anchors.len(), filled, "autofilled channel");
        filled
    }

    /// Remove a keyframe and repair the run it anchored.
    ///
    /// With keyframes on both sides, the merged gap is re-interpolated. On a
    /// side with no neighbouring keyframe, the derived values the removed
    /// keyframe anchored are cleared. Returns the removed value.
    pub fn remove_keyframe<T: Lerp>(
        &self,
        channel: &mut SparseChannel<T>,
        frame: Frame,
    ) -> KinetrackResult<Option<T>> {
        if !channel.is_keyframe(frame) {
            return Err(KinetrackError::not_a_keyframe(frame));
        }

        let before = channel.keyframe_before(frame);
        let after = channel.keyframe_after(frame);
        let removed = channel.remove(frame);

        match (before, after) {
            (Some(before), Some(after)) => {
                channel.clear_derived_between(before, after);
                self.fill_gap(channel, before, after);
            }
            (Some(before), None) => channel.clear_derived_between(before, frame),
            (None, Some(after)) => channel.clear_derived_between(frame, after),
            (None, None) => {}
        }

        tracing::debug!(frame, ?before, ?after, "removed keyframe");
        Ok(removed)
    }

    /// Interpolate the step frames strictly between two adjacent keyframes.
    fn fill_gap<T: Lerp>(&self, channel: &mut SparseChannel<T>, from: Frame, to: Frame) -> usize {
        let from_step = self.clip.frame_to_step(from);
        let to_step = self.clip.frame_to_step(to);
        let span = to_step - from_step;
        if span < 2 {
            return 0;
        }
        let (Some(start), Some(end)) = (channel.get(from).cloned(), channel.get(to).cloned())
        else {
            return 0;
        };

        let mut filled = 0;
        for step in (from_step + 1)..to_step {
            if step < 0 {
                continue;
            }
            let frame = self.clip.step_to_frame(step as usize);
            // Unaligned endpoints can put the first or last step outside the gap.
            if frame <= from || frame >= to || channel.is_keyframe(frame) {
                continue;
            }
            let t = (step - from_step) as f64 / span as f64;
            channel.set_derived(frame, start.lerp(&end, t));
            filled += 1;
        }
        filled
    }
}
