use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Why a transcript could not be produced
#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("invalid video ID: {0:?}")]
    InvalidVideoId(String),

    #[error("{bin} is not installed; ask the administrator to install yt-dlp")]
    ToolNotInstalled { bin: String },

    #[error("transcript extraction timed out after {}s; please try again", .0.as_secs())]
    Timeout(Duration),

    #[error("no subtitles are available for this video")]
    NoSubtitles,

    #[error("this video is private")]
    PrivateVideo,

    #[error("this video is unavailable")]
    Unavailable,

    #[error("the subtitle download returned no data")]
    EmptyData,

    #[error("this video is age-restricted")]
    AgeRestricted,

    #[error("failed to extract the transcript: {message}")]
    Failed { message: String },

    #[error("failed to read subtitle file {}", .path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("subtitle file {} contained no text", .path.display())]
    EmptyTranscript { path: PathBuf },

    #[error("failed to create scratch directory")]
    Scratch(#[source] std::io::Error),

    #[error("failed to run {bin}")]
    Spawn {
        bin: String,
        #[source]
        source: std::io::Error,
    },
}

impl TranscriptError {
    /// Stable machine-readable name for the failure
    pub fn kind(&self) -> &'static str {
        match self {
            TranscriptError::InvalidVideoId(_) => "invalid_video_id",
            TranscriptError::ToolNotInstalled { .. } => "tool_not_installed",
            TranscriptError::Timeout(_) => "timeout",
            TranscriptError::NoSubtitles => "no_subtitles",
            TranscriptError::PrivateVideo => "private_video",
            TranscriptError::Unavailable => "unavailable",
            TranscriptError::EmptyData => "empty_data",
            TranscriptError::AgeRestricted => "age_restricted",
            TranscriptError::Failed { .. } => "failed",
            TranscriptError::ReadFailed { .. } => "read_failed",
            TranscriptError::EmptyTranscript { .. } => "empty_transcript",
            TranscriptError::Scratch(_) => "scratch",
            TranscriptError::Spawn { .. } => "spawn",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = TranscriptError::Timeout(Duration::from_secs(30));
        assert_eq!(
            err.to_string(),
            "transcript extraction timed out after 30s; please try again"
        );
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn test_tool_not_installed_is_distinct() {
        let err = TranscriptError::ToolNotInstalled {
            bin: "yt-dlp".to_string(),
        };
        assert_eq!(err.kind(), "tool_not_installed");
        assert!(err.to_string().starts_with("yt-dlp is not installed"));
    }

    #[test]
    fn test_read_failed_keeps_source() {
        let err = TranscriptError::ReadFailed {
            path: PathBuf::from("/tmp/x.en.vtt"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "failed to read subtitle file /tmp/x.en.vtt");
    }
}
