//! Re-keying channels onto a trimmed clip window.
//!
//! `old_clip` is the window the data were authored under; `new_clip` is the
//! trimmed window, expressed in the same source frame numbers. A frame the
//! trimmed window maps to step `n` lands on frame `n` of the export. Each
//! channel kind decides which old sample survives when several old frames
//! collapse onto one step, and what happens to frames the trimmed window
//! does not show.

use kinetrack_track_model::{ClipWindow, Frame, FrameRange, RemapPolicy, SparseChannel};

/// Clip-trim remapping.
pub struct FrameRemapper;

impl FrameRemapper {
    /// Re-key a channel from old frame numbers to new step numbers.
    ///
    /// Never fails: frames with nowhere to go are dropped. Each output entry
    /// keeps the keyframe marker of the sample it was copied from.
    pub fn remap<T: Clone>(
        old_clip: &ClipWindow,
        new_clip: &ClipWindow,
        channel: &SparseChannel<T>,
        policy: RemapPolicy,
    ) -> SparseChannel<T> {
        let mut out = Output::new(new_clip);
        match policy {
            RemapPolicy::Coordinate => {
                for (frame, value) in channel.iter() {
                    // A one-step window starts and ends on the same frame, which
                    // must still reach step 0.
                    if frame >= new_clip.end_frame() && frame > new_clip.start_frame() {
                        break;
                    }
                    let step = rounded_up_step(new_clip, frame).max(0);
                    out.put(step, value, channel.is_keyframe(frame));
                }
            }
            RemapPolicy::PointVector => {
                for (frame, value) in channel.iter() {
                    if new_clip.includes(frame) {
                        out.put(new_clip.frame_to_step(frame), value, channel.is_keyframe(frame));
                    }
                }
            }
            RemapPolicy::CalibrationPair => {
                for (frame, value) in channel.iter() {
                    let step = new_clip.frame_to_step(frame).max(0);
                    out.put(step, value, channel.is_keyframe(frame));
                }
            }
            RemapPolicy::CarryForward => {
                carry_forward(old_clip, new_clip, channel, false, &mut out)
            }
            RemapPolicy::CarryForwardBounded => {
                carry_forward(old_clip, new_clip, channel, true, &mut out)
            }
        }

        tracing::trace!(
            ?policy,
            input = channel.len(),
            output = out.channel.len(),
            dropped = out.dropped,
            "remapped channel"
        );
        out.channel
    }

    /// Re-key a dense array. The result is as long as the last step written + 1.
    pub fn remap_slots<T: Clone>(
        old_clip: &ClipWindow,
        new_clip: &ClipWindow,
        slots: &[Option<T>],
        policy: RemapPolicy,
    ) -> Vec<Option<T>> {
        Self::remap(old_clip, new_clip, &SparseChannel::from_slots(slots), policy).to_slots()
    }

    /// Re-key an inclusive frame range.
    ///
    /// The start rounds up to the next step when it falls between steps; the
    /// end rounds down. Both clamp at step 0, and the end is first clamped to
    /// the last frame both windows cover.
    pub fn remap_range(
        old_clip: &ClipWindow,
        new_clip: &ClipWindow,
        start: Frame,
        end: Frame,
    ) -> (Frame, Frame) {
        let end = end.min(old_clip.last_frame()).min(new_clip.end_frame());
        let new_start = rounded_up_step(new_clip, start).max(0) as Frame;
        let new_end = new_clip.frame_to_step(end).max(0) as Frame;
        (new_start, new_end)
    }

    /// Re-key a track's validity range.
    pub fn remap_frame_range(
        old_clip: &ClipWindow,
        new_clip: &ClipWindow,
        range: FrameRange,
    ) -> FrameRange {
        let (start, end) = Self::remap_range(old_clip, new_clip, range.start, range.end);
        FrameRange::new(start, end)
    }
}

/// Step of a frame, rounded up when it lies after the start between steps.
fn rounded_up_step(clip: &ClipWindow, frame: Frame) -> i64 {
    let step = clip.frame_to_step(frame);
    if frame > clip.start_frame() && !clip.is_aligned(frame) {
        step + 1
    } else {
        step
    }
}

/// Walk every old frame, carrying the latest authored sample onto the next
/// frame the trimmed window shows.
fn carry_forward<T: Clone>(
    old_clip: &ClipWindow,
    new_clip: &ClipWindow,
    channel: &SparseChannel<T>,
    bounded: bool,
    out: &mut Output<'_, T>,
) {
    if channel.is_empty() {
        return;
    }
    let limit = old_clip.end_frame().min(channel.slot_len());
    let mut carry: Option<Frame> = None;
    for frame in 0..=limit {
        if bounded && frame > new_clip.end_frame() {
            break;
        }
        if channel.contains(frame) {
            carry = Some(frame);
        }
        if !new_clip.includes(frame) {
            continue;
        }
        if let Some(source) = carry.take() {
            if let Some(value) = channel.get(source) {
                out.put(
                    new_clip.frame_to_step(frame),
                    value,
                    channel.is_keyframe(source),
                );
            }
        }
    }
}

/// Output channel that drops steps the trimmed window cannot hold.
struct Output<'a, T> {
    clip: &'a ClipWindow,
    channel: SparseChannel<T>,
    dropped: usize,
}

impl<'a, T: Clone> Output<'a, T> {
    fn new(clip: &'a ClipWindow) -> Self {
        Self {
            clip,
            channel: SparseChannel::new(),
            dropped: 0,
        }
    }

    fn put(&mut self, step: i64, value: &T, keyframe: bool) {
        if step < 0 || step >= self.clip.step_count() as i64 {
            self.dropped += 1;
            return;
        }
        self.channel.set(step as Frame, value.clone(), keyframe);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: Frame, stride: usize, count: usize) -> ClipWindow {
        ClipWindow::new(start, stride, count).unwrap()
    }

    fn keyed(frames: &[(Frame, f64)]) -> SparseChannel<f64> {
        frames.iter().copied().collect()
    }

    #[test]
    fn test_coordinate_rounds_up_and_fills_step_zero() {
        let old = window(0, 1, 30);
        let new = window(4, 3, 5); // frames 4, 7, 10, 13, 16
        let channel = keyed(&[(1, 1.0), (5, 5.0), (7, 7.0), (8, 8.0), (20, 20.0)]);

        let out = FrameRemapper::remap(&old, &new, &channel, RemapPolicy::Coordinate);
        assert_eq!(out.get(0), Some(&1.0));
        // Frame 5 rounds up onto step 1, then frame 7 overwrites it.
        assert_eq!(out.get(1), Some(&7.0));
        assert_eq!(out.get(2), Some(&8.0));
        assert!(!out.contains(4));
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_coordinate_single_step_window() {
        let old = window(0, 1, 10);
        let new = window(5, 1, 1);
        let channel = keyed(&[(5, 5.0)]);
        let out = FrameRemapper::remap(&old, &new, &channel, RemapPolicy::Coordinate);
        assert_eq!(out.get(0), Some(&5.0));
    }

    #[test]
    fn test_point_vector_keeps_only_included() {
        let old = window(0, 1, 20);
        let new = window(2, 2, 4); // frames 2, 4, 6, 8
        let channel = keyed(&[(0, 0.0), (2, 2.0), (3, 3.0), (8, 8.0), (10, 10.0)]);

        let out = FrameRemapper::remap(&old, &new, &channel, RemapPolicy::PointVector);
        assert_eq!(out.get(0), Some(&2.0));
        assert_eq!(out.get(3), Some(&8.0));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_calibration_pair_clamps_before_start() {
        let old = window(0, 1, 20);
        let new = window(6, 2, 4);
        let channel = keyed(&[(1, 1.0), (9, 9.0), (30, 30.0)]);

        let out = FrameRemapper::remap(&old, &new, &channel, RemapPolicy::CalibrationPair);
        assert_eq!(out.get(0), Some(&1.0));
        assert_eq!(out.get(1), Some(&9.0));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_carry_forward_bridges_stride_gap() {
        let old = window(0, 1, 10);
        let new = window(0, 3, 3); // frames 0, 3, 6
        let channel = keyed(&[(0, 0.0), (5, 5.0)]);

        let out = FrameRemapper::remap(&old, &new, &channel, RemapPolicy::CarryForward);
        assert_eq!(out.get(0), Some(&0.0));
        assert!(!out.contains(1));
        assert_eq!(out.get(2), Some(&5.0));
        assert!(out.is_keyframe(2));
    }

    #[test]
    fn test_carry_forward_bounded_stops_at_end() {
        let old = window(0, 1, 20);
        let new = window(0, 2, 3); // frames 0, 2, 4
        let channel = keyed(&[(1, 1.0), (5, 5.0)]);

        let bounded = FrameRemapper::remap(&old, &new, &channel, RemapPolicy::CarryForwardBounded);
        assert_eq!(bounded.get(1), Some(&1.0));
        assert_eq!(bounded.len(), 1);
    }

    #[test]
    fn test_carry_forward_respects_old_end() {
        let old = window(0, 1, 4); // ends at frame 3
        let new = window(0, 1, 10);
        let channel = keyed(&[(1, 1.0), (6, 6.0)]);

        let out = FrameRemapper::remap(&old, &new, &channel, RemapPolicy::CarryForward);
        assert_eq!(out.get(1), Some(&1.0));
        assert!(!out.contains(6));
    }

    #[test]
    fn test_remap_range_rounds_in_opposite_directions() {
        let old = window(0, 1, 20);
        let new = window(0, 2, 8);
        assert_eq!(FrameRemapper::remap_range(&old, &new, 7, 7), (4, 3));
        assert_eq!(FrameRemapper::remap_range(&old, &new, 6, 10), (3, 5));
    }

    #[test]
    fn test_remap_range_clamps() {
        let old = window(0, 1, 12);
        let new = window(4, 2, 4);
        assert_eq!(FrameRemapper::remap_range(&old, &new, 0, 2), (0, 0));
        assert_eq!(FrameRemapper::remap_range(&old, &new, 5, 50), (1, 3));
    }

    #[test]
    fn test_remap_slots_sized_by_last_step() {
        let old = window(0, 1, 10);
        let new = window(0, 2, 5);
        let slots = vec![Some(0.0), None, Some(2.0), None, None];
        let out = FrameRemapper::remap_slots(&old, &new, &slots, RemapPolicy::PointVector);
        assert_eq!(out, vec![Some(0.0), Some(2.0)]);
    }

    #[test]
    fn test_keyframe_markers_follow_source() {
        let old = window(0, 1, 10);
        let new = window(0, 2, 5);
        let mut channel = keyed(&[(0, 0.0)]);
        channel.set_derived(2, 2.0);

        let out = FrameRemapper::remap(&old, &new, &channel, RemapPolicy::PointVector);
        assert!(out.is_keyframe(0));
        assert!(!out.is_keyframe(1));
    }
}
