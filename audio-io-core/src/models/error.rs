use thiserror::Error;

/// Errors produced by the capture pipeline.
///
/// Frame-level errors (`FormatMismatch`, `BufferConstructionFailure`) are
/// logged and the frame is dropped; session-level errors are returned to the
/// caller of `attach`/`detach`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("format mismatch: frame carries {actual} bytes, format expects {expected}")]
    FormatMismatch { expected: usize, actual: usize },

    #[error("buffer construction failed: {0}")]
    BufferConstructionFailure(String),

    #[error("engine failed to start: {0}")]
    EngineStartFailure(String),

    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("playback failed: {0}")]
    PlaybackFailed(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),
}

impl PipelineError {
    /// Whether the error only costs a single frame and capture continues.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            Self::FormatMismatch { .. } | Self::BufferConstructionFailure(_)
        )
    }
}

/// Errors returned by an encoder or recording sink for a single buffer.
///
/// A rejection only affects the sink that raised it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("buffer rejected: {0}")]
    Rejected(String),

    #[error("sink not ready")]
    NotReady,

    #[error("storage error: {0}")]
    Storage(String),
}

impl SinkError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_local_errors() {
        assert!(PipelineError::FormatMismatch { expected: 8, actual: 4 }.is_frame_local());
        assert!(PipelineError::BufferConstructionFailure("x".into()).is_frame_local());
        assert!(!PipelineError::EngineStartFailure("x".into()).is_frame_local());
        assert!(!PipelineError::DeviceUnavailable("x".into()).is_frame_local());
    }

    #[test]
    fn display_messages() {
        let err = PipelineError::FormatMismatch { expected: 4096, actual: 4000 };
        assert_eq!(
            err.to_string(),
            "format mismatch: frame carries 4000 bytes, format expects 4096"
        );
        assert_eq!(SinkError::rejected("full").to_string(), "buffer rejected: full");
    }
}
