//! Transcript Pipeline - fetch normalized YouTube transcripts
//!
//! This library turns a video URL into a single whitespace-normalized transcript by
//! trying an ordered list of extraction strategies (a helper subprocess, in-process
//! scraping, the official Data API) and returning the first one that succeeds.

pub mod cli;
pub mod config;
pub mod extractors;
pub mod output;
pub mod pipeline;
pub mod transcript;
pub mod utils;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use extractors::{ExtractionOutcome, ExtractionStrategy, StrategyKind, VideoReference};
pub use pipeline::{PipelineOutput, TranscriptPipeline};
pub use transcript::{normalize, TranscriptResult, TranscriptSegment};

/// Result type used by the application layer (config, CLI, file output)
pub type Result<T> = anyhow::Result<T>;

/// Failure kinds surfaced by the parser and the extraction strategies
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TranscriptError {
    #[error("No video id found in URL: {0}")]
    InvalidUrl(String),

    #[error("Transcript helper interpreter is not available: {0}")]
    InterpreterMissing(String),

    #[error("Transcript helper dependency is missing: {0}")]
    DependencyMissing(String),

    #[error("Captions are disabled for this video: {0}")]
    CaptionsDisabled(String),

    #[error("Video is unavailable: {0}")]
    VideoUnavailable(String),

    #[error("No transcript found: {0}")]
    NoTranscriptFound(String),

    #[error("API credential was rejected: {0}")]
    AuthorizationDenied(String),

    #[error("Caption download is not permitted with an API key: {0}")]
    PermissionDenied(String),

    #[error("Transcript extraction timed out: {0}")]
    Timeout(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Request failed: {0}")]
    Network(String),

    #[error("No extraction strategies configured")]
    NoStrategiesConfigured,
}

/// Fieldless tag for [`TranscriptError`], convenient for matching and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidUrl,
    InterpreterMissing,
    DependencyMissing,
    CaptionsDisabled,
    VideoUnavailable,
    NoTranscriptFound,
    AuthorizationDenied,
    PermissionDenied,
    Timeout,
    MalformedResponse,
    Network,
    NoStrategiesConfigured,
}

impl TranscriptError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TranscriptError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            TranscriptError::InterpreterMissing(_) => ErrorKind::InterpreterMissing,
            TranscriptError::DependencyMissing(_) => ErrorKind::DependencyMissing,
            TranscriptError::CaptionsDisabled(_) => ErrorKind::CaptionsDisabled,
            TranscriptError::VideoUnavailable(_) => ErrorKind::VideoUnavailable,
            TranscriptError::NoTranscriptFound(_) => ErrorKind::NoTranscriptFound,
            TranscriptError::AuthorizationDenied(_) => ErrorKind::AuthorizationDenied,
            TranscriptError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            TranscriptError::Timeout(_) => ErrorKind::Timeout,
            TranscriptError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            TranscriptError::Network(_) => ErrorKind::Network,
            TranscriptError::NoStrategiesConfigured => ErrorKind::NoStrategiesConfigured,
        }
    }
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidUrl => "invalid_url",
            ErrorKind::InterpreterMissing => "interpreter_missing",
            ErrorKind::DependencyMissing => "dependency_missing",
            ErrorKind::CaptionsDisabled => "captions_disabled",
            ErrorKind::VideoUnavailable => "video_unavailable",
            ErrorKind::NoTranscriptFound => "no_transcript_found",
            ErrorKind::AuthorizationDenied => "authorization_denied",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::Timeout => "timeout",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::Network => "network",
            ErrorKind::NoStrategiesConfigured => "no_strategies_configured",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_tags() {
        let err = TranscriptError::NoTranscriptFound("abc".into());
        assert_eq!(err.kind(), ErrorKind::NoTranscriptFound);
        assert_eq!(err.kind().to_string(), "no_transcript_found");
        assert_eq!(TranscriptError::NoStrategiesConfigured.kind().as_str(), "no_strategies_configured");
    }

    #[test]
    fn test_error_messages_are_readable() {
        let err = TranscriptError::PermissionDenied("track xyz".into());
        assert_eq!(
            err.to_string(),
            "Caption download is not permitted with an API key: track xyz"
        );
    }
}
