use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(
    name = "ytchat",
    about = "Explore YouTube videos, playlists and channels, extract transcripts, and chat about them",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: text (default), json
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<OutputFormat>,

    /// Show extra metadata on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interpret a URL as a video, channel or playlist reference (offline)
    Parse {
        /// Any string; non-YouTube input is reported as unknown
        input: String,
    },

    /// Report whether the input is a YouTube URL at all (exit status 1 if not)
    Check {
        input: String,
    },

    /// Extract a video's transcript via yt-dlp
    Transcript {
        /// YouTube video URL or video ID (reads from stdin if omitted)
        input: Option<String>,

        /// Caption languages in preference order, comma separated
        #[arg(short, long, value_delimiter = ',')]
        lang: Vec<String>,

        /// Give up on yt-dlp after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Write output to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Search channels by name
    Search {
        query: String,
    },

    /// Show a channel by ID, @handle or URL
    Channel {
        channel: String,
    },

    /// List a channel's uploads, one page at a time
    Videos {
        channel_id: String,

        #[arg(long, default_value_t = 20)]
        max_results: u32,

        /// Token printed by the previous page
        #[arg(long)]
        page_token: Option<String>,
    },

    /// List every video in a playlist
    Playlist {
        playlist_id: String,
    },

    /// List every playlist of a channel
    Playlists {
        channel_id: String,
    },

    /// Resolve a YouTube URL to its metadata; other input searches channels
    Resolve {
        input: String,
    },

    /// Ask the assistant a question, optionally about a video, channel or playlist
    Chat {
        /// YouTube URL whose content becomes the conversation context
        url: Option<String>,

        /// Question to ask
        #[arg(short, long)]
        message: String,

        /// Add the video's transcript to the context
        #[arg(short, long)]
        transcript: bool,

        /// LLM model (claude-* goes to Anthropic, anything else to OpenAI)
        #[arg(long)]
        model: Option<String>,

        /// JSON file of earlier turns; the new question and reply are appended to it
        #[arg(long)]
        history: Option<PathBuf>,
    },
}
