//! Frame timing utilities.
//!
//! Derivatives are taken against wall-clock time, not frame numbers, so every
//! track document carries a clock that answers "when was frame N shown".
//! This module provides:
//! - A uniform clock (constant frame duration)
//! - An explicit per-frame clock for variable frame-rate footage
//! - Re-keying a clock onto a trimmed/resampled frame sequence

use serde::{Deserialize, Serialize};

use crate::error::{KinetrackError, KinetrackResult};

/// Maps frame numbers to wall-clock seconds.
///
/// Time is monotonic in frame number for every valid clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FrameClock {
    /// Constant frame duration starting at `start_secs`.
    Uniform {
        start_secs: f64,
        frame_duration_secs: f64,
    },

    /// Explicit time for each frame. Frames past the end have no time.
    Explicit { times_secs: Vec<f64> },
}

impl FrameClock {
    /// Create a uniform clock for the given frame rate.
    pub fn from_fps(fps: f64) -> KinetrackResult<Self> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(KinetrackError::invalid_timing(format!(
                "frame rate must be positive, got {fps}"
            )));
        }
        Ok(Self::Uniform {
            start_secs: 0.0,
            frame_duration_secs: 1.0 / fps,
        })
    }

    /// Create a uniform clock with an explicit start time and frame duration.
    pub fn uniform(start_secs: f64, frame_duration_secs: f64) -> KinetrackResult<Self> {
        let clock = Self::Uniform {
            start_secs,
            frame_duration_secs,
        };
        clock.validate()?;
        Ok(clock)
    }

    /// Create a clock from explicit per-frame times.
    pub fn explicit(times_secs: Vec<f64>) -> KinetrackResult<Self> {
        let clock = Self::Explicit { times_secs };
        clock.validate()?;
        Ok(clock)
    }

    /// Check the monotonicity contract.
    pub fn validate(&self) -> KinetrackResult<()> {
        match self {
            Self::Uniform {
                start_secs,
                frame_duration_secs,
            } => {
                if !start_secs.is_finite() {
                    return Err(KinetrackError::invalid_timing("start time is not finite"));
                }
                if !(frame_duration_secs.is_finite() && *frame_duration_secs > 0.0) {
                    return Err(KinetrackError::invalid_timing(format!(
                        "frame duration must be positive, got {frame_duration_secs}"
                    )));
                }
            }
            Self::Explicit { times_secs } => {
                if let Some(bad) = times_secs.iter().position(|t| !t.is_finite()) {
                    return Err(KinetrackError::invalid_timing(format!(
                        "time of frame {bad} is not finite"
                    )));
                }
                if let Some(pos) = times_secs.windows(2).position(|w| w[1] <= w[0]) {
                    return Err(KinetrackError::invalid_timing(format!(
                        "times must strictly increase, frame {} is not after frame {}",
                        pos + 1,
                        pos
                    )));
                }
            }
        }
        Ok(())
    }

    /// Wall-clock time of a frame in seconds.
    pub fn time_at(&self, frame: usize) -> Option<f64> {
        match self {
            Self::Uniform {
                start_secs,
                frame_duration_secs,
            } => Some(start_secs + frame as f64 * frame_duration_secs),
            Self::Explicit { times_secs } => times_secs.get(frame).copied(),
        }
    }

    /// Re-key the clock onto a new frame sequence.
    ///
    /// `frames` lists, in order, the old frame number that becomes new frame
    /// 0, 1, 2, ... A uniform clock stays uniform when the old frames are
    /// evenly spaced.
    pub fn resampled(&self, frames: &[usize]) -> KinetrackResult<Self> {
        if let (
            Self::Uniform {
                start_secs,
                frame_duration_secs,
            },
            [first, rest @ ..],
        ) = (self, frames)
        {
            let spacing = match rest.first() {
                Some(second) => second.checked_sub(*first).filter(|d| *d > 0),
                None => Some(1),
            };
            let evenly_spaced = spacing.is_some()
                && frames
                    .windows(2)
                    .all(|w| w[1].checked_sub(w[0]) == spacing);
            if let (true, Some(stride)) = (evenly_spaced, spacing) {
                let stride = stride as f64;
                return Self::uniform(
                    start_secs + *first as f64 * frame_duration_secs,
                    frame_duration_secs * stride,
                );
            }
        }

        let times = frames
            .iter()
            .map(|&frame| {
                self.time_at(frame).ok_or_else(|| {
                    KinetrackError::invalid_timing(format!("no time recorded for frame {frame}"))
                })
            })
            .collect::<KinetrackResult<Vec<_>>>()?;
        Self::explicit(times)
    }

    /// Mean frame duration over the first `frame_count` frames.
    pub fn mean_frame_duration(&self, frame_count: usize) -> Option<f64> {
        match self {
            Self::Uniform {
                frame_duration_secs,
                ..
            } => Some(*frame_duration_secs),
            Self::Explicit { times_secs } => {
                let last = frame_count.min(times_secs.len()).checked_sub(1)?;
                if last == 0 {
                    return None;
                }
                Some((times_secs[last] - times_secs[0]) / last as f64)
            }
        }
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::Uniform {
            start_secs: 0.0,
            frame_duration_secs: 1.0 / 30.0,
        }
    }
}
