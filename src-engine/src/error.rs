//! Error types for the compositing and encoding pipeline.

use bezelrec_types::OutputFormat;
use std::fmt;

/// Error type for engine operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The source handle never yielded a readable frame
    SourceAcquisitionFailed(String),
    /// No candidate codec is available for the requested output
    UnsupportedCodec(OutputFormat),
    /// An encoder finalized without accumulating any data
    NoDataRecorded(OutputFormat),
    /// Unexpected failure inside a draw tick
    CompositingFault(String),
    /// The encoder process failed to start or broke mid-stream
    EncoderFailed(OutputFormat, String),
    /// A session is already starting; concurrent starts are rejected
    StartInProgress,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::SourceAcquisitionFailed(msg) => {
                write!(f, "Source acquisition failed: {}", msg)
            }
            EngineError::UnsupportedCodec(format) => {
                write!(f, "No supported codec for {}", format.display_name())
            }
            EngineError::NoDataRecorded(format) => {
                write!(f, "No data recorded for {}", format.display_name())
            }
            EngineError::CompositingFault(msg) => write!(f, "Compositing fault: {}", msg),
            EngineError::EncoderFailed(format, msg) => {
                write!(f, "Encoder failed for {}: {}", format.display_name(), msg)
            }
            EngineError::StartInProgress => write!(f, "A session start is already in progress"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<EngineError> for String {
    fn from(err: EngineError) -> Self {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_output_format() {
        let err = EngineError::UnsupportedCodec(OutputFormat::WebmAlpha);
        assert!(err.to_string().contains("WebM"));
        let err = EngineError::NoDataRecorded(OutputFormat::Mp4);
        assert!(err.to_string().contains("MP4"));
    }

    #[test]
    fn test_into_string() {
        let msg: String = EngineError::CompositingFault("boom".to_string()).into();
        assert!(msg.contains("boom"));
    }
}
