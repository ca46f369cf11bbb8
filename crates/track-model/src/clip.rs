//! Clip windows: the mapping between raw frames and a clip's steps.
//!
//! A clip samples the source footage starting at `start_frame`, taking one
//! frame every `stride` frames, `step_count` times. Frame numbers index the
//! source; step numbers index the clip.

use serde::{Deserialize, Serialize};

use kinetrack_common::{KinetrackError, KinetrackResult};

/// Raw frame index in the source footage.
pub type Frame = usize;

/// Index within a clip's sampled sequence.
pub type Step = usize;

/// How raw frames map onto a clip's step sequence.
///
/// Immutable: every `with_*` method returns a new, validated window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawClipWindow", into = "RawClipWindow")]
pub struct ClipWindow {
    start_frame: Frame,
    stride: usize,
    step_count: usize,
    frame_count: Option<usize>,
    play_all_steps: bool,
}

/// Unvalidated serialized form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawClipWindow {
    start_frame: Frame,
    stride: usize,
    step_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    frame_count: Option<usize>,
    #[serde(default)]
    play_all_steps: bool,
}

impl TryFrom<RawClipWindow> for ClipWindow {
    type Error = KinetrackError;

    fn try_from(raw: RawClipWindow) -> Result<Self, Self::Error> {
        let window = Self::new(raw.start_frame, raw.stride, raw.step_count)?
            .with_play_all_steps(raw.play_all_steps);
        match raw.frame_count {
            Some(count) => window.with_frame_count(count),
            None => Ok(window),
        }
    }
}

impl From<ClipWindow> for RawClipWindow {
    fn from(window: ClipWindow) -> Self {
        Self {
            start_frame: window.start_frame,
            stride: window.stride,
            step_count: window.step_count,
            frame_count: window.frame_count,
            play_all_steps: window.play_all_steps,
        }
    }
}

impl ClipWindow {
    /// Create a window, rejecting a zero stride or step count.
    pub fn new(start_frame: Frame, stride: usize, step_count: usize) -> KinetrackResult<Self> {
        if stride < 1 {
            return Err(KinetrackError::invalid_clip_window(
                "stride must be at least 1",
            ));
        }
        if step_count < 1 {
            return Err(KinetrackError::invalid_clip_window(
                "step count must be at least 1",
            ));
        }
        if stride
            .checked_mul(step_count - 1)
            .and_then(|span| start_frame.checked_add(span))
            .is_none()
        {
            return Err(KinetrackError::invalid_clip_window(
                "end frame overflows the frame range",
            ));
        }
        Ok(Self {
            start_frame,
            stride,
            step_count,
            frame_count: None,
            play_all_steps: false,
        })
    }

    /// The window a trimmed export is keyed by: one step per frame from 0.
    pub fn exported(&self) -> Self {
        Self {
            start_frame: 0,
            stride: 1,
            step_count: self.step_count,
            frame_count: Some(self.step_count),
            play_all_steps: false,
        }
    }

    pub fn start_frame(&self) -> Frame {
        self.start_frame
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    /// Number of recorded source frames, if known.
    pub fn frame_count(&self) -> Option<usize> {
        self.frame_count
    }

    pub fn play_all_steps(&self) -> bool {
        self.play_all_steps
    }

    /// Frame of the last step.
    pub fn end_frame(&self) -> Frame {
        self.start_frame + self.stride * (self.step_count - 1)
    }

    /// Last recorded frame of the source, falling back to the end frame.
    pub fn last_frame(&self) -> Frame {
        match self.frame_count {
            Some(count) => count.saturating_sub(1).max(self.end_frame()),
            None => self.end_frame(),
        }
    }

    /// Steps since the start frame.
    ///
    /// A frame between two steps maps to the previous step. Frames before the
    /// start give a non-positive result truncated toward zero, so frames
    /// less than one stride before the start map to step 0.
    pub fn frame_to_step(&self, frame: Frame) -> i64 {
        (frame as i64 - self.start_frame as i64) / self.stride as i64
    }

    /// Frame shown at a step.
    pub fn step_to_frame(&self, step: Step) -> Frame {
        self.start_frame + step * self.stride
    }

    /// Step number of a frame that falls exactly on a step.
    pub fn step_of(&self, frame: Frame) -> Option<Step> {
        let offset = frame.checked_sub(self.start_frame)?;
        if offset % self.stride != 0 {
            return None;
        }
        let step = offset / self.stride;
        (step < self.step_count).then_some(step)
    }

    /// Whether a frame is aligned with the stride (at or after the start).
    pub fn is_aligned(&self, frame: Frame) -> bool {
        frame >= self.start_frame && (frame - self.start_frame) % self.stride == 0
    }

    /// Whether the clip shows this frame.
    ///
    /// With `play_all_steps` set, every frame from the start up to the last
    /// recorded frame counts, regardless of stride.
    pub fn includes(&self, frame: Frame) -> bool {
        if self.play_all_steps {
            return frame >= self.start_frame && frame <= self.last_frame();
        }
        self.step_of(frame).is_some()
    }

    /// Frames of every step, in order.
    pub fn step_frames(&self) -> impl Iterator<Item = Frame> + '_ {
        (0..self.step_count).map(move |step| self.step_to_frame(step))
    }

    pub fn with_stride(&self, stride: usize) -> KinetrackResult<Self> {
        self.rebuild(self.start_frame, stride, self.step_count)
    }

    pub fn with_step_count(&self, step_count: usize) -> KinetrackResult<Self> {
        self.rebuild(self.start_frame, self.stride, step_count)
    }

    /// Record how many frames the source has.
    pub fn with_frame_count(&self, frame_count: usize) -> KinetrackResult<Self> {
        if frame_count == 0 {
            return Err(KinetrackError::invalid_clip_window(
                "frame count must be at least 1",
            ));
        }
        Ok(Self {
            frame_count: Some(frame_count),
            ..*self
        })
    }

    pub fn with_play_all_steps(&self, play_all_steps: bool) -> Self {
        Self {
            play_all_steps,
            ..*self
        }
    }

    fn rebuild(
        &self,
        start_frame: Frame,
        stride: usize,
        step_count: usize,
    ) -> KinetrackResult<Self> {
        let window = Self::new(start_frame, stride, step_count)?;
        Ok(Self {
            frame_count: self.frame_count,
            play_all_steps: self.play_all_steps,
            ..window
        })
    }
}
