//! Autofill keyframe gaps in every authored channel.

use std::path::PathBuf;

use kinetrack_kinematics_core::{DerivativeEngine, Interpolator};

use super::{load_document, save_document};

pub fn run(path: PathBuf, output: Option<PathBuf>) -> anyhow::Result<()> {
    let mut document = load_document(&path)?;
    let interpolator = Interpolator::new(document.clip);

    for track in &mut document.tracks {
        let mut filled = 0;
        for (kind, channel) in track.channels.iter_mut() {
            if kind.is_derived() {
                continue;
            }
            filled += interpolator.fill_all(channel);
        }
        if track.has_positions() {
            DerivativeEngine::refresh_all(track, &document.clip, &document.clock);
        }
        println!("  {}: filled {filled} frames", track.id);
    }

    document.touch();
    let target = save_document(&document, &path, output)?;
    println!("Saved {}", target.display());
    Ok(())
}
