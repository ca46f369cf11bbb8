//! Export a document keyed to a trimmed clip.

use std::path::{Path, PathBuf};

use kinetrack_kinematics_core::trim_document;
use kinetrack_track_model::ClipWindow;

use super::{load_document, save_document};

pub fn run(
    path: PathBuf,
    start: usize,
    stride: usize,
    count: usize,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let document = load_document(&path)?;
    let new_clip = ClipWindow::new(start, stride, count)?;

    println!(
        "Trimming {} to frames {}..={} every {}",
        path.display(),
        new_clip.start_frame(),
        new_clip.end_frame(),
        stride
    );
    let trimmed = trim_document(&document, &new_clip)?;
    for track in &trimmed.tracks {
        println!("  {}: {} channels", track.id, track.channels.len());
    }

    let target = output.unwrap_or_else(|| default_output(&path));
    let target = save_document(&trimmed, &path, Some(target))?;
    println!("Saved {} ({} frames)", target.display(), trimmed.clip.step_count());
    Ok(())
}

fn default_output(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.kinetrack.json".to_string());
    path.with_file_name(format!("trimmed-{name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_sits_next_to_input() {
        let out = default_output(Path::new("/data/drop.kinetrack.json"));
        assert_eq!(out, PathBuf::from("/data/trimmed-drop.kinetrack.json"));
    }
}
