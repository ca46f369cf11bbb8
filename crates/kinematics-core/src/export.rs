//! Clip-trim export.
//!
//! Re-expresses a document under a narrower or re-strided window of its
//! footage. The exported document is keyed one step per frame from 0, its
//! clock is resampled onto the kept frames, and derived channels are rebuilt
//! from the remapped positions rather than remapped themselves.

use kinetrack_common::{KinetrackError, KinetrackResult};
use kinetrack_track_model::{ClipWindow, Track, TrackDocument};

use crate::derivative::DerivativeEngine;
use crate::remap::FrameRemapper;

/// Remap every authored channel of a track onto `new_clip`'s steps.
///
/// Velocity and acceleration are left out; they only make sense against
/// the exported clock and are rebuilt by [`trim_document`].
pub fn trim_track(old_clip: &ClipWindow, new_clip: &ClipWindow, track: &Track) -> Track {
    let mut trimmed = Track {
        channels: Default::default(),
        valid_range: track
            .valid_range
            .map(|range| FrameRemapper::remap_frame_range(old_clip, new_clip, range)),
        ..track.clone()
    };

    for (kind, channel) in &track.channels {
        if kind.is_derived() {
            continue;
        }
        let remapped = FrameRemapper::remap(old_clip, new_clip, channel, kind.remap_policy());
        if !remapped.is_empty() {
            trimmed.channels.insert(*kind, remapped);
        }
    }
    trimmed
}

/// Trim a whole document to `new_clip`, given in the document's frame numbers.
pub fn trim_document(
    document: &TrackDocument,
    new_clip: &ClipWindow,
) -> KinetrackResult<TrackDocument> {
    let old_clip = &document.clip;
    if new_clip.end_frame() > old_clip.last_frame() {
        return Err(KinetrackError::invalid_clip_window(format!(
            "trim window ends at frame {} but the clip only records up to frame {}",
            new_clip.end_frame(),
            old_clip.last_frame()
        )));
    }

    let kept: Vec<_> = new_clip.step_frames().collect();
    let clock = document.clock.resampled(&kept)?;
    let clip = new_clip.exported();

    let mut trimmed = TrackDocument {
        clip,
        clock,
        tracks: Vec::with_capacity(document.tracks.len()),
        ..document.clone()
    };

    for track in &document.tracks {
        let mut track = trim_track(old_clip, new_clip, track);
        if track.has_positions() {
            DerivativeEngine::refresh_all(&mut track, &trimmed.clip, &trimmed.clock);
        }
        tracing::debug!(track = %track.id, channels = track.channels.len(), "trimmed track");
        trimmed.tracks.push(track);
    }
    trimmed.touch();

    tracing::debug!(
        start_frame = new_clip.start_frame(),
        stride = new_clip.stride(),
        steps = new_clip.step_count(),
        tracks = trimmed.tracks.len(),
        "trimmed document"
    );
    Ok(trimmed)
}
