//! Finite-difference derivatives of position channels.
//!
//! Velocity and acceleration are estimated per clip step from position
//! samples a fixed number of steps (the spill) away, divided by the
//! wall-clock time between those frames. A missing sample anywhere in a
//! stencil leaves the output frame empty; no value is ever extrapolated.
//!
//! Bounce detection runs in two passes. The first pass flags steps where
//! the plain symmetric velocity reverses sign; the second pass computes
//! every requested step, switching to a one-sided stencil wherever the
//! symmetric one would straddle a flagged step.

use std::collections::BTreeSet;
use std::ops::Range;

use serde::Serialize;

use kinetrack_common::FrameClock;
use kinetrack_track_model::{
    wrap_angle, ChannelKind, ClipWindow, DerivativeAlgorithm, DerivativeParams, Frame, Kinematic,
    Sample, SparseChannel, Track, Vec2,
};

/// Velocity and acceleration computed over a range of steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Derivatives<T> {
    pub velocity: SparseChannel<T>,
    pub acceleration: SparseChannel<T>,
    /// Frames flagged as bounces (bounce detection only).
    pub bounces: Vec<Frame>,
}

impl<T> Default for Derivatives<T> {
    fn default() -> Self {
        Self {
            velocity: SparseChannel::new(),
            acceleration: SparseChannel::new(),
            bounces: Vec::new(),
        }
    }
}

/// Cumulative rotation about the origin and its derivatives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RotationData {
    /// Unwrapped angle in radians.
    pub theta: SparseChannel<f64>,
    /// Angular velocity in radians per second.
    pub omega: SparseChannel<f64>,
    /// Angular acceleration in radians per second squared.
    pub alpha: SparseChannel<f64>,
}

/// What a track refresh wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub first_frame: Option<Frame>,
    pub last_frame: Option<Frame>,
    pub velocity_frames: usize,
    pub acceleration_frames: usize,
    pub bounces: Vec<Frame>,
}

/// Finite-difference derivative engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct DerivativeEngine {
    params: DerivativeParams,
}

impl DerivativeEngine {
    pub fn new(params: DerivativeParams) -> Self {
        Self { params }
    }

    /// Compute velocity and acceleration for `step_count` steps starting at
    /// the first step at or after `start_frame`.
    ///
    /// The result for any frame is the same whichever range it was requested
    /// in, so overlapping recomputations agree.
    pub fn recompute<T: Kinematic>(
        &self,
        positions: &SparseChannel<T>,
        clip: &ClipWindow,
        clock: &FrameClock,
        start_frame: Frame,
        step_count: usize,
    ) -> Derivatives<T> {
        let steps = step_span(clip, start_frame, step_count);
        let stencil = Stencil {
            positions,
            clip,
            clock,
        };
        let kv = self.params.velocity_spill() as i64;
        let ka = self.params.acceleration_spill as i64;

        let mut out = Derivatives::default();
        let bounces = match self.params.algorithm {
            DerivativeAlgorithm::BounceDetect => {
                let reach = 2 * kv.max(ka);
                let scan = clamp_steps(clip, steps.start - reach, steps.end + reach);
                stencil.detect_bounces(scan, kv)
            }
            DerivativeAlgorithm::FiniteDiff | DerivativeAlgorithm::FiniteDiffVspill2 => {
                BTreeSet::new()
            }
        };

        for step in steps.clone() {
            let frame = clip.step_to_frame(step as usize);
            let (velocity, acceleration) = if bounces.is_empty() {
                (stencil.central_velocity(step, kv), stencil.central_acceleration(step, ka))
            } else {
                (
                    stencil.split_velocity(step, kv, &bounces),
                    stencil.split_acceleration(step, ka, &bounces),
                )
            };
            if let Some(v) = velocity {
                out.velocity.set_derived(frame, v);
            }
            if let Some(a) = acceleration {
                out.acceleration.set_derived(frame, a);
            }
        }

        out.bounces = bounces
            .range(steps.clone())
            .map(|step| clip.step_to_frame(*step as usize))
            .collect();

        tracing::debug!(
            algorithm = %self.params.algorithm,
            first_step = steps.start,
            end_step = steps.end,
            velocity = out.velocity.len(),
            acceleration = out.acceleration.len(),
            bounces = out.bounces.len(),
            "recomputed derivatives"
        );
        out
    }

    /// Compute derivatives over every step of the clip.
    pub fn recompute_all<T: Kinematic>(
        &self,
        positions: &SparseChannel<T>,
        clip: &ClipWindow,
        clock: &FrameClock,
    ) -> Derivatives<T> {
        self.recompute(positions, clip, clock, clip.start_frame(), clip.step_count())
    }

    /// Rotation of a point about the origin over the whole clip.
    ///
    /// The angle is unwrapped step to step so a point circling the origin
    /// accumulates whole turns instead of jumping at ±π.
    pub fn rotation(
        &self,
        positions: &SparseChannel<Vec2>,
        clip: &ClipWindow,
        clock: &FrameClock,
    ) -> RotationData {
        let mut theta = SparseChannel::new();
        let mut previous = 0.0;
        let mut total = 0.0;
        for frame in clip.step_frames() {
            let Some(position) = positions.get(frame) else {
                continue;
            };
            let angle = position.angle();
            total += wrap_angle(angle - previous);
            previous = angle;
            theta.set_derived(frame, total);
        }

        let stencil = Stencil {
            positions: &theta,
            clip,
            clock,
        };
        let kv = self.params.velocity_spill() as i64;
        let ka = self.params.acceleration_spill as i64;
        let mut omega = SparseChannel::new();
        let mut alpha = SparseChannel::new();
        for step in 0..clip.step_count() as i64 {
            let frame = clip.step_to_frame(step as usize);
            if let Some(w) = stencil.central_velocity(step, kv) {
                omega.set_derived(frame, w);
            }
            if let Some(a) = stencil.central_acceleration(step, ka) {
                alpha.set_derived(frame, a);
            }
        }

        RotationData {
            theta,
            omega,
            alpha,
        }
    }

    /// Smallest `(start_frame, step_count)` whose derivatives can change when
    /// the position at `edited_frame` changes.
    pub fn dirty_range(
        clip: &ClipWindow,
        params: &DerivativeParams,
        edited_frame: Frame,
    ) -> (Frame, usize) {
        let kv = params.velocity_spill() as i64;
        let reach = 2 * params.max_spill() as i64;
        // A moved sample can flip bounce flags one step beyond its velocity
        // stencil, and each flag reshapes stencils around it.
        let reach = match params.algorithm {
            DerivativeAlgorithm::BounceDetect => reach + kv + 1,
            DerivativeAlgorithm::FiniteDiff | DerivativeAlgorithm::FiniteDiffVspill2 => reach,
        };

        let last_step = clip.step_count() as i64 - 1;
        let edited = clip.frame_to_step(edited_frame).clamp(0, last_step);
        let first = (edited - reach).max(0);
        let last = (edited + reach).min(last_step);
        (clip.step_to_frame(first as usize), (last - first + 1) as usize)
    }

    /// Rebuild a track's velocity and acceleration channels over a range.
    ///
    /// Existing derived entries in the range are replaced; entries outside
    /// it are left alone.
    pub fn refresh_track(
        track: &mut Track,
        clip: &ClipWindow,
        clock: &FrameClock,
        start_frame: Frame,
        step_count: usize,
    ) -> RefreshSummary {
        let steps = step_span(clip, start_frame, step_count);
        if steps.is_empty() {
            return RefreshSummary::default();
        }
        let first_frame = clip.step_to_frame(steps.start as usize);
        let last_frame = clip.step_to_frame(steps.end as usize - 1);

        let engine = Self::new(track.derivatives);
        let derived = engine.recompute(&track.positions(), clip, clock, start_frame, step_count);

        let summary = RefreshSummary {
            first_frame: Some(first_frame),
            last_frame: Some(last_frame),
            velocity_frames: derived.velocity.len(),
            acceleration_frames: derived.acceleration.len(),
            bounces: derived.bounces,
        };

        for (kind, values) in [
            (ChannelKind::Velocity, derived.velocity),
            (ChannelKind::Acceleration, derived.acceleration),
        ] {
            let channel = track.channel_mut(kind);
            channel.clear_range(first_frame..=last_frame);
            channel.merge_from(values.map_values(|v| Some(Sample::Vector { components: *v })));
        }
        track.prune_empty();

        tracing::debug!(
            track = %track.id,
            first_frame,
            last_frame,
            velocity = summary.velocity_frames,
            acceleration = summary.acceleration_frames,
            "refreshed track derivatives"
        );
        summary
    }

    /// Rebuild a track's derivatives over the whole clip.
    pub fn refresh_all(
        track: &mut Track,
        clip: &ClipWindow,
        clock: &FrameClock,
    ) -> RefreshSummary {
        Self::refresh_track(track, clip, clock, clip.start_frame(), clip.step_count())
    }
}

/// Steps covered by `count` steps from the first step at or after `start_frame`,
/// clamped to the clip.
fn step_span(clip: &ClipWindow, start_frame: Frame, count: usize) -> Range<i64> {
    let stride = clip.stride() as i64;
    let offset = start_frame as i64 - clip.start_frame() as i64;
    let first = -((-offset).div_euclid(stride));
    clamp_steps(clip, first, first.saturating_add(count as i64))
}

fn clamp_steps(clip: &ClipWindow, start: i64, end: i64) -> Range<i64> {
    let count = clip.step_count() as i64;
    let start = start.clamp(0, count);
    let end = end.clamp(start, count);
    start..end
}

/// Read-only view of the samples a stencil draws on.
struct Stencil<'a, T> {
    positions: &'a SparseChannel<T>,
    clip: &'a ClipWindow,
    clock: &'a FrameClock,
}

impl<T: Kinematic> Stencil<'_, T> {
    /// Position and time at a step, if the clip shows it and it was marked.
    fn sample(&self, step: i64) -> Option<(T, f64)> {
        if step < 0 || step >= self.clip.step_count() as i64 {
            return None;
        }
        let frame = self.clip.step_to_frame(step as usize);
        if !self.clip.includes(frame) {
            return None;
        }
        let position = *self.positions.get(frame)?;
        let time = self.clock.time_at(frame)?;
        Some((position, time))
    }

    fn first_difference(&self, lo: i64, hi: i64) -> Option<T> {
        let (p_lo, t_lo) = self.sample(lo)?;
        let (p_hi, t_hi) = self.sample(hi)?;
        let dt = t_hi - t_lo;
        (dt > 0.0).then(|| (p_hi - p_lo) * (1.0 / dt))
    }

    fn second_difference(&self, lo: i64, mid: i64, hi: i64) -> Option<T> {
        let (p_lo, t_lo) = self.sample(lo)?;
        let (p_mid, _) = self.sample(mid)?;
        let (p_hi, t_hi) = self.sample(hi)?;
        let half = (t_hi - t_lo) / 2.0;
        (half > 0.0).then(|| (p_hi - p_mid * 2.0 + p_lo) * (1.0 / (half * half)))
    }

    fn central_velocity(&self, step: i64, k: i64) -> Option<T> {
        self.sample(step)?;
        self.first_difference(step - k, step + k)
    }

    fn central_acceleration(&self, step: i64, k: i64) -> Option<T> {
        self.second_difference(step - k, step, step + k)
    }

    /// Steps where the symmetric velocity reverses sign on some axis.
    fn detect_bounces(&self, steps: Range<i64>, k: i64) -> BTreeSet<i64> {
        let bounces: BTreeSet<i64> = steps
            .filter(|&step| {
                let (Some(before), Some(after)) = (
                    self.central_velocity(step - 1, k),
                    self.central_velocity(step + 1, k),
                ) else {
                    return false;
                };
                before
                    .components()
                    .into_iter()
                    .zip(after.components())
                    .any(|(b, a)| b * a < 0.0)
            })
            .collect();
        if !bounces.is_empty() {
            tracing::trace!(?bounces, "bounce steps");
        }
        bounces
    }

    /// Velocity with the stencil kept on one side of any bounce.
    ///
    /// Symmetric when no bounce lies strictly inside the stencil, otherwise
    /// backward (incoming), otherwise forward (outgoing). Boxed in on both
    /// sides, the frame has no velocity.
    fn split_velocity(&self, step: i64, k: i64, bounces: &BTreeSet<i64>) -> Option<T> {
        self.sample(step)?;
        if !straddles(bounces, step - k, step + k) {
            self.first_difference(step - k, step + k)
        } else if !straddles(bounces, step - k, step) {
            self.first_difference(step - k, step)
        } else if !straddles(bounces, step, step + k) {
            self.first_difference(step, step + k)
        } else {
            None
        }
    }

    /// Acceleration with the same one-sided fallback as velocity.
    ///
    /// The bounce step itself keeps the symmetric stencil so the impulse
    /// shows up there and nowhere else.
    fn split_acceleration(&self, step: i64, k: i64, bounces: &BTreeSet<i64>) -> Option<T> {
        if bounces.contains(&step) || !straddles(bounces, step - k, step + k) {
            self.second_difference(step - k, step, step + k)
        } else if !straddles(bounces, step - 2 * k, step) {
            self.second_difference(step - 2 * k, step - k, step)
        } else if !straddles(bounces, step, step + 2 * k) {
            self.second_difference(step, step + k, step + 2 * k)
        } else {
            None
        }
    }
}

/// Whether a bounce lies strictly between two steps.
fn straddles(bounces: &BTreeSet<i64>, lo: i64, hi: i64) -> bool {
    hi - lo > 1 && bounces.range(lo + 1..hi).next().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn unit_clock() -> FrameClock {
        FrameClock::uniform(0.0, 1.0).unwrap()
    }

    fn line(values: &[f64]) -> SparseChannel<f64> {
        values.iter().copied().enumerate().collect()
    }

    fn params(algorithm: DerivativeAlgorithm) -> DerivativeParams {
        DerivativeParams::new(1, 1, algorithm).unwrap()
    }

    #[test]
    fn test_constant_velocity() {
        let clip = ClipWindow::new(0, 1, 6).unwrap();
        let positions = line(&[0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        let out = DerivativeEngine::new(params(DerivativeAlgorithm::FiniteDiff))
            .recompute_all(&positions, &clip, &unit_clock());

        assert_eq!(out.velocity.len(), 4);
        assert!(!out.velocity.contains(0));
        assert!(!out.velocity.contains(5));
        for (_, v) in out.velocity.iter() {
            assert!((v - 2.0).abs() < EPS);
        }
        for (_, a) in out.acceleration.iter() {
            assert!(a.abs() < EPS);
        }
    }

    #[test]
    fn test_uses_clock_time() {
        let clip = ClipWindow::new(0, 1, 3).unwrap();
        let positions = line(&[0.0, 1.0, 2.0]);
        let clock = FrameClock::from_fps(10.0).unwrap();
        let out = DerivativeEngine::default().recompute_all(&positions, &clip, &clock);
        assert!((out.velocity.get(1).unwrap() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_stride_spaces_stencil() {
        let clip = ClipWindow::new(0, 2, 3).unwrap();
        let positions: SparseChannel<f64> = [(0, 0.0), (1, 100.0), (2, 2.0), (4, 4.0)]
            .into_iter()
            .collect();
        let out = DerivativeEngine::new(params(DerivativeAlgorithm::FiniteDiff))
            .recompute_all(&positions, &clip, &unit_clock());
        // Frame 1 is off-stride and never contributes.
        assert!((out.velocity.get(2).unwrap() - 1.0).abs() < EPS);
    }

    #[test]
    fn test_gap_nullifies_only_neighbours() {
        let clip = ClipWindow::new(0, 1, 7).unwrap();
        let mut positions = line(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        positions.remove(3);
        let out = DerivativeEngine::new(params(DerivativeAlgorithm::FiniteDiff))
            .recompute_all(&positions, &clip, &unit_clock());

        assert!(out.velocity.contains(1));
        assert!(!out.velocity.contains(2));
        assert!(!out.velocity.contains(3));
        assert!(!out.velocity.contains(4));
        assert!(out.velocity.contains(5));
    }

    #[test]
    fn test_constant_acceleration() {
        let clip = ClipWindow::new(0, 1, 7).unwrap();
        let values: Vec<f64> = (0..7).map(|i| 1.5 * (i * i) as f64).collect();
        let out = DerivativeEngine::default().recompute_all(&line(&values), &clip, &unit_clock());

        // Default acceleration spill is 2.
        assert_eq!(out.acceleration.len(), 3);
        for (_, a) in out.acceleration.iter() {
            assert!((a - 3.0).abs() < EPS);
        }
    }

    #[test]
    fn test_vspill2_widens_velocity_stencil() {
        let clip = ClipWindow::new(0, 1, 5).unwrap();
        let positions = line(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        let out = DerivativeEngine::new(params(DerivativeAlgorithm::FiniteDiffVspill2))
            .recompute_all(&positions, &clip, &unit_clock());
        assert_eq!(out.velocity.len(), 1);
        assert!(out.velocity.contains(2));
    }

    #[test]
    fn test_degenerate_clip_has_no_output() {
        let clip = ClipWindow::new(0, 1, 2).unwrap();
        let out = DerivativeEngine::default().recompute_all(&line(&[0.0, 1.0]), &clip, &unit_clock());
        assert!(out.velocity.is_empty());
        assert!(out.acceleration.is_empty());
    }

    #[test]
    fn test_non_increasing_time_is_undefined() {
        let clip = ClipWindow::new(0, 1, 3).unwrap();
        let clock = FrameClock::Explicit {
            times_secs: vec![0.0, 1.0, 0.0],
        };
        let out = DerivativeEngine::default().recompute_all(&line(&[0.0, 1.0, 2.0]), &clip, &clock);
        assert!(out.velocity.is_empty());
    }

    #[test]
    fn test_bounce_splits_stencil() {
        let clip = ClipWindow::new(0, 1, 7).unwrap();
        let positions = line(&[0.0, 1.0, 2.0, 3.0, 2.0, 1.0, 0.0]);
        let out = DerivativeEngine::new(params(DerivativeAlgorithm::BounceDetect))
            .recompute_all(&positions, &clip, &unit_clock());

        assert_eq!(out.bounces, vec![3]);
        assert!((out.velocity.get(2).unwrap() - 1.0).abs() < EPS);
        assert!((out.velocity.get(3).unwrap() - 1.0).abs() < EPS);
        assert!((out.velocity.get(4).unwrap() + 1.0).abs() < EPS);
        assert!(out.acceleration.get(2).unwrap().abs() < EPS);
        assert!((out.acceleration.get(3).unwrap() + 2.0).abs() < EPS);
        assert!(out.acceleration.get(4).unwrap().abs() < EPS);
    }

    #[test]
    fn test_finite_diff_smooths_bounce() {
        let clip = ClipWindow::new(0, 1, 7).unwrap();
        let positions = line(&[0.0, 1.0, 2.0, 3.0, 2.0, 1.0, 0.0]);
        let out = DerivativeEngine::new(params(DerivativeAlgorithm::FiniteDiff))
            .recompute_all(&positions, &clip, &unit_clock());
        assert!(out.velocity.get(3).unwrap().abs() < EPS);
        assert!(out.bounces.is_empty());
    }

    #[test]
    fn test_rotation_unwraps() {
        let clip = ClipWindow::new(0, 1, 8).unwrap();
        let positions: SparseChannel<Vec2> = (0..8)
            .map(|i| {
                let angle = i as f64 * std::f64::consts::FRAC_PI_2;
                (i, Vec2::new(angle.cos(), angle.sin()))
            })
            .collect();
        let rotation = DerivativeEngine::default().rotation(&positions, &clip, &unit_clock());

        let last = *rotation.theta.get(7).unwrap();
        assert!((last - 7.0 * std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        for (_, w) in rotation.omega.iter() {
            assert!((w - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        }
        for (_, a) in rotation.alpha.iter() {
            assert!(a.abs() < 1e-9);
        }
    }

    #[test]
    fn test_dirty_range_clamps_to_clip() {
        let clip = ClipWindow::new(10, 2, 20).unwrap();
        let params = DerivativeParams::default();
        assert_eq!(DerivativeEngine::dirty_range(&clip, &params, 10), (10, 5));
        assert_eq!(DerivativeEngine::dirty_range(&clip, &params, 30), (22, 9));
        assert_eq!(DerivativeEngine::dirty_range(&clip, &params, 48), (40, 5));
    }

    #[test]
    fn test_refresh_track_writes_vectors() {
        let clip = ClipWindow::new(0, 1, 5).unwrap();
        let mut track = Track::new("m", "mass");
        track.derivatives = params(DerivativeAlgorithm::FiniteDiff);
        for i in 0..5 {
            track.mark_position(i, Vec2::new(i as f64, 0.0));
        }
        track
            .channel_mut(ChannelKind::Velocity)
            .set_derived(0, Sample::vector(9.0, 9.0));

        let summary = DerivativeEngine::refresh_all(&mut track, &clip, &unit_clock());
        assert_eq!(summary.velocity_frames, 3);
        let velocity = track.channel(ChannelKind::Velocity).unwrap();
        assert!(!velocity.contains(0));
        assert_eq!(velocity.get(2).and_then(Sample::as_vector).map(|v| v.y), Some(0.0));
    }
}
