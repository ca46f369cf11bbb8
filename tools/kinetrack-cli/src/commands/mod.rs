pub mod derive;
pub mod fill;
pub mod info;
pub mod trim;

use std::path::{Path, PathBuf};

use kinetrack_track_model::TrackDocument;

pub(crate) fn load_document(path: &Path) -> anyhow::Result<TrackDocument> {
    TrackDocument::load(path).map_err(|e| anyhow::anyhow!("Failed to load document: {e}"))
}

/// Save to `output`, or back over `input` when no output was given.
pub(crate) fn save_document(
    document: &TrackDocument,
    input: &Path,
    output: Option<PathBuf>,
) -> anyhow::Result<PathBuf> {
    let target = output.unwrap_or_else(|| input.to_path_buf());
    document
        .save(&target)
        .map_err(|e| anyhow::anyhow!("Failed to save document: {e}"))?;
    Ok(target)
}
