//! Track documents: a clip, its frame clock, and every track keyed to it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use kinetrack_common::FrameClock;

use crate::clip::ClipWindow;
use crate::track::Track;

/// Current document schema version.
pub const DOCUMENT_VERSION: &str = "1.0";

/// Top-level document (`*.kinetrack.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackDocument {
    /// Schema version.
    pub version: String,

    /// Human-readable name.
    pub name: String,

    /// Creation timestamp (ISO 8601).
    pub created_at: String,

    /// Last modified timestamp (ISO 8601).
    pub modified_at: String,

    /// The clip every track is keyed to.
    pub clip: ClipWindow,

    /// Wall-clock time of each frame.
    #[serde(default)]
    pub clock: FrameClock,

    /// Tracked objects.
    #[serde(default)]
    pub tracks: Vec<Track>,
}

impl TrackDocument {
    /// Create an empty document.
    pub fn new(name: impl Into<String>, clip: ClipWindow, clock: FrameClock) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            version: DOCUMENT_VERSION.to_string(),
            name: name.into(),
            created_at: now.clone(),
            modified_at: now,
            clip,
            clock,
            tracks: Vec::new(),
        }
    }

    pub fn track(&self, id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn track_mut(&mut self, id: &str) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    /// Update the modification timestamp.
    pub fn touch(&mut self) {
        self.modified_at = chrono::Utc::now().to_rfc3339();
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), DocumentError> {
        self.clock
            .validate()
            .map_err(|e| DocumentError::ValidationError {
                message: e.to_string(),
            })?;

        for (i, track) in self.tracks.iter().enumerate() {
            if self.tracks[..i].iter().any(|t| t.id == track.id) {
                return Err(DocumentError::ValidationError {
                    message: format!("duplicate track id '{}'", track.id),
                });
            }
        }

        if let FrameClock::Explicit { times_secs } = &self.clock {
            if times_secs.len() <= self.clip.end_frame() {
                return Err(DocumentError::ValidationError {
                    message: format!(
                        "clock covers {} frames but the clip ends at frame {}",
                        times_secs.len(),
                        self.clip.end_frame()
                    ),
                });
            }
        }
        Ok(())
    }

    /// Load and validate a document from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path).map_err(|e| DocumentError::IoError {
            path: path.clone(),
            source: e,
        })?;
        let document: Self =
            serde_json::from_str(&content).map_err(|e| DocumentError::ParseError {
                path: path.clone(),
                source: e,
            })?;
        document.validate()?;
        Ok(document)
    }

    /// Save the document as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DocumentError> {
        let path = path.as_ref().to_path_buf();
        let json = serde_json::to_string_pretty(self).map_err(|e| DocumentError::ParseError {
            path: path.clone(),
            source: e,
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DocumentError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        std::fs::write(&path, json).map_err(|e| DocumentError::IoError { path, source: e })
    }
}

/// Errors that can occur when working with documents.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid document: {message}")]
    ValidationError { message: String },
}
