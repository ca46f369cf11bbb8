//! Error types shared across Kinetrack crates.

/// Top-level error type for Kinetrack operations.
///
/// Missing data is never an error: absent samples, undefined derivatives and
/// frames that fall outside a trimmed window are ordinary outcomes. Only
/// malformed inputs and programmer errors end up here.
#[derive(Debug, thiserror::Error)]
pub enum KinetrackError {
    #[error("Invalid clip window: {message}")]
    InvalidClipWindow { message: String },

    #[error("Frame {frame} is not a keyframe")]
    NotAKeyframe { frame: usize },

    #[error("Invalid channel: {message}")]
    InvalidChannel { message: String },

    #[error("Invalid frame timing: {message}")]
    InvalidTiming { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using KinetrackError.
pub type KinetrackResult<T> = Result<T, KinetrackError>;

impl KinetrackError {
    pub fn invalid_clip_window(msg: impl Into<String>) -> Self {
        Self::InvalidClipWindow {
            message: msg.into(),
        }
    }

    pub fn not_a_keyframe(frame: usize) -> Self {
        Self::NotAKeyframe { frame }
    }

    pub fn invalid_channel(msg: impl Into<String>) -> Self {
        Self::InvalidChannel {
            message: msg.into(),
        }
    }

    pub fn invalid_timing(msg: impl Into<String>) -> Self {
        Self::InvalidTiming {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = KinetrackError::invalid_clip_window("stride must be at least 1");
        assert_eq!(
            err.to_string(),
            "Invalid clip window: stride must be at least 1"
        );
        assert_eq!(
            KinetrackError::not_a_keyframe(12).to_string(),
            "Frame 12 is not a keyframe"
        );
    }

    #[test]
    fn test_json_errors_convert() {
        let parse = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: KinetrackError = parse.into();
        assert!(matches!(err, KinetrackError::Json(_)));
    }
}
