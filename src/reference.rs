use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use serde::{Serialize, Serializer};
use url::Url;

const PRIMARY_HOST: &str = "youtube.com";
const SHORT_HOST: &str = "youtu.be";

static COMPOUND_START_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$").expect("start-time pattern"));

static BARE_VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]{11}$").expect("video id pattern"));

/// How a channel was addressed in the URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRef {
    Id(String),
    Handle(String),
}

/// Result of interpreting a user-supplied string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedReference {
    Video {
        video_id: String,
        playlist_id: Option<String>,
        start_seconds: Option<u64>,
    },
    Channel {
        channel: ChannelRef,
    },
    Playlist {
        playlist_id: String,
    },
    Unknown,
}

/// Flat JSON shape: `kind` plus only the fields that belong to it
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireReference<'a> {
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel_handle: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    playlist_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_seconds: Option<u64>,
}

impl<'a> From<&'a ParsedReference> for WireReference<'a> {
    fn from(parsed: &'a ParsedReference) -> Self {
        let mut wire = WireReference {
            kind: parsed.kind(),
            video_id: None,
            channel_id: None,
            channel_handle: None,
            playlist_id: None,
            start_seconds: None,
        };
        match parsed {
            ParsedReference::Video {
                video_id,
                playlist_id,
                start_seconds,
            } => {
                wire.video_id = Some(video_id.as_str());
                wire.playlist_id = playlist_id.as_deref();
                wire.start_seconds = *start_seconds;
            }
            ParsedReference::Channel {
                channel: ChannelRef::Id(id),
            } => wire.channel_id = Some(id.as_str()),
            ParsedReference::Channel {
                channel: ChannelRef::Handle(handle),
            } => wire.channel_handle = Some(handle.as_str()),
            ParsedReference::Playlist { playlist_id } => wire.playlist_id = Some(playlist_id.as_str()),
            ParsedReference::Unknown => {}
        }
        wire
    }
}

impl Serialize for ParsedReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireReference::from(self).serialize(serializer)
    }
}

impl ParsedReference {
    pub fn kind(&self) -> &'static str {
        match self {
            ParsedReference::Video { .. } => "video",
            ParsedReference::Channel { .. } => "channel",
            ParsedReference::Playlist { .. } => "playlist",
            ParsedReference::Unknown => "unknown",
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ParsedReference::Unknown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlatformHost {
    Primary,
    ShortLink,
}

/// Classify a URL as a video, channel or playlist reference.
///
/// Never fails: anything that is not a well-formed URL on a known host, or
/// whose path matches no known shape, comes back as [`ParsedReference::Unknown`].
pub fn interpret(input: &str) -> ParsedReference {
    let url = match Url::parse(input.trim()) {
        Ok(url) => url,
        Err(e) => {
            debug!("Not a URL ({e}): {input}");
            return ParsedReference::Unknown;
        }
    };

    match platform_host(&url) {
        Some(PlatformHost::ShortLink) => interpret_short_link(&url),
        Some(PlatformHost::Primary) => interpret_primary(&url),
        None => ParsedReference::Unknown,
    }
}

/// True if the input is a URL on one of the platform's hosts, whatever its path
pub fn is_reference(input: &str) -> bool {
    Url::parse(input.trim())
        .ok()
        .and_then(|url| platform_host(&url))
        .is_some()
}

/// Extract a video ID from a video URL or a bare 11-character ID
pub fn video_id_from_input(input: &str) -> Option<String> {
    let input = input.trim();

    if let ParsedReference::Video { video_id, .. } = interpret(input) {
        return Some(video_id);
    }

    BARE_VIDEO_ID.is_match(input).then(|| input.to_string())
}

fn platform_host(url: &Url) -> Option<PlatformHost> {
    let host = url.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    if host == SHORT_HOST {
        Some(PlatformHost::ShortLink)
    } else if host == PRIMARY_HOST || host.ends_with(".youtube.com") {
        Some(PlatformHost::Primary)
    } else {
        None
    }
}

fn interpret_short_link(url: &Url) -> ParsedReference {
    match first_segment(url.path().strip_prefix('/').unwrap_or(url.path())) {
        Some(video_id) => ParsedReference::Video {
            video_id,
            playlist_id: None,
            start_seconds: query_param(url, "t").and_then(|t| parse_start_time(&t)),
        },
        None => ParsedReference::Unknown,
    }
}

fn interpret_primary(url: &Url) -> ParsedReference {
    let path = url.path();

    if path == "/watch" {
        if let Some(video_id) = query_param(url, "v") {
            return ParsedReference::Video {
                video_id,
                playlist_id: query_param(url, "list"),
                start_seconds: query_param(url, "t").and_then(|t| parse_start_time(&t)),
            };
        }
    }

    if let Some(id) = path.strip_prefix("/channel/").and_then(first_segment) {
        return ParsedReference::Channel {
            channel: ChannelRef::Id(id),
        };
    }

    // Only one prefix is removed, so "/@@name" keeps its second '@'
    if let Some(handle) = path
        .strip_prefix("/c/")
        .or_else(|| path.strip_prefix("/@"))
        .and_then(first_segment)
    {
        return ParsedReference::Channel {
            channel: ChannelRef::Handle(handle),
        };
    }

    if path == "/playlist" {
        if let Some(playlist_id) = query_param(url, "list") {
            return ParsedReference::Playlist { playlist_id };
        }
    }

    ParsedReference::Unknown
}

/// First path segment, percent-decoded; undecodable bytes leave it as written
fn first_segment(rest: &str) -> Option<String> {
    let segment = rest.split('/').next().filter(|segment| !segment.is_empty())?;
    match urlencoding::decode(segment) {
        Ok(decoded) => Some(decoded.into_owned()),
        Err(e) => {
            debug!("Keeping raw path segment {segment}: {e}");
            Some(segment.to_string())
        }
    }
}

fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// Parse a `t=` value: plain seconds (`90`) or a compound duration (`1h2m3s`, `5m`)
pub fn parse_start_time(value: &str) -> Option<u64> {
    if value.is_empty() {
        return None;
    }

    if value.bytes().all(|b| b.is_ascii_digit()) {
        return value.parse().ok();
    }

    let caps = COMPOUND_START_TIME.captures(value)?;
    let unit = |idx: usize| -> Option<u64> { caps.get(idx).map_or(Some(0), |m| m.as_str().parse().ok()) };

    unit(1)?
        .checked_mul(3600)?
        .checked_add(unit(2)?.checked_mul(60)?)?
        .checked_add(unit(3)?)
}

/// Render whole seconds as `H:MM:SS`, or `M:SS` under an hour
pub fn format_timestamp(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}
