pub mod captions;
pub mod chat;
pub mod config;
pub mod error;
pub mod output;
pub mod reference;
pub mod transcript;
pub mod youtube;

use serde::Serialize;

pub use captions::CaptionFormat;
pub use error::TranscriptError;
pub use reference::{ChannelRef, ParsedReference, format_timestamp, interpret, is_reference};
pub use transcript::{ExtractOptions, extract_transcript};

/// Plain-text transcript of a video
#[derive(Debug, Clone, Serialize)]
pub struct Transcript {
    pub video_id: String,
    /// Language tag of the caption file the text came from
    pub language: Option<String>,
    pub format: CaptionFormat,
    pub text: String,
}

/// Canonical watch-page URL for a video ID
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}
