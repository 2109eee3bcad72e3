use eyre::Result;
use serde::Serialize;

use crate::Transcript;
use crate::reference::{ChannelRef, ParsedReference, format_timestamp};
use crate::youtube::{ChannelInfo, Content, PlaylistInfo, PlaylistVideos, VideoItem};

/// Render any value as pretty-printed JSON
pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Render a parsed reference as `key: value` lines
pub fn render_reference(parsed: &ParsedReference) -> String {
    let mut lines = vec![format!("kind: {}", parsed.kind())];
    match parsed {
        ParsedReference::Video {
            video_id,
            playlist_id,
            start_seconds,
        } => {
            lines.push(format!("video: {video_id}"));
            if let Some(id) = playlist_id {
                lines.push(format!("playlist: {id}"));
            }
            if let Some(secs) = start_seconds {
                lines.push(format!("start: {} ({secs}s)", format_timestamp(*secs)));
            }
        }
        ParsedReference::Channel {
            channel: ChannelRef::Id(id),
        } => lines.push(format!("channel: {id}")),
        ParsedReference::Channel {
            channel: ChannelRef::Handle(handle),
        } => lines.push(format!("handle: @{handle}")),
        ParsedReference::Playlist { playlist_id } => lines.push(format!("playlist: {playlist_id}")),
        ParsedReference::Unknown => {}
    }
    lines.join("\n")
}

/// Render transcript as plain text
pub fn render_transcript(transcript: &Transcript) -> String {
    transcript.text.clone()
}

fn channel_line(c: &ChannelInfo) -> String {
    format!(
        "{} ({}) - {} subscribers, {} videos",
        c.title, c.id, c.subscriber_count, c.video_count
    )
}

fn video_line(v: &VideoItem) -> String {
    format!("[{}] {}  {}", v.duration, v.title, v.url)
}

/// One line per channel
pub fn render_channels(channels: &[ChannelInfo]) -> String {
    channels.iter().map(channel_line).collect::<Vec<_>>().join("\n")
}

/// One line per video
pub fn render_videos(videos: &[VideoItem]) -> String {
    videos.iter().map(video_line).collect::<Vec<_>>().join("\n")
}

/// One line per playlist
pub fn render_playlists(playlists: &[PlaylistInfo]) -> String {
    playlists
        .iter()
        .map(|p| format!("{} ({}) - {} videos", p.title, p.id, p.video_count))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Playlist header followed by one line per video
pub fn render_playlist(playlist: &PlaylistVideos) -> String {
    let title = playlist.title.as_deref().unwrap_or("(untitled playlist)");
    let mut out = format!("Playlist: {title} ({}, {} videos)", playlist.id, playlist.videos.len());
    if !playlist.videos.is_empty() {
        out.push('\n');
        out.push_str(&render_videos(&playlist.videos));
    }
    out
}

/// Human-readable summary of resolved content
pub fn render_content(content: &Content) -> String {
    match content {
        Content::Video {
            video,
            channel,
            start_seconds,
            playlist,
        } => {
            let mut lines = vec![format!("Video: {}", video_line(video))];
            if let Some(c) = channel {
                lines.push(format!("Channel: {}", channel_line(c)));
            }
            if let Some(secs) = start_seconds {
                lines.push(format!("Starts at: {}", format_timestamp(*secs)));
            }
            if let Some(p) = playlist {
                lines.push(render_playlist(p));
            }
            lines.join("\n")
        }
        Content::Channel { channel } => format!("Channel: {}", channel_line(channel)),
        Content::Playlist { playlist } => render_playlist(playlist),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CaptionFormat;

    fn sample_video() -> VideoItem {
        VideoItem {
            id: "abc".to_string(),
            title: "Intro".to_string(),
            description: String::new(),
            thumbnail: String::new(),
            published_at: "2024-01-01T00:00:00Z".to_string(),
            duration: "4:13".to_string(),
            view_count: 10,
            like_count: 1,
            channel_id: "UC1".to_string(),
            channel_title: "Chan".to_string(),
            url: "https://www.youtube.com/watch?v=abc".to_string(),
        }
    }

    #[test]
    fn test_render_reference_video() {
        let parsed = ParsedReference::Video {
            video_id: "XYZ".to_string(),
            playlist_id: Some("PL1".to_string()),
            start_seconds: Some(3723),
        };
        assert_eq!(
            render_reference(&parsed),
            "kind: video\nvideo: XYZ\nplaylist: PL1\nstart: 1:02:03 (3723s)"
        );
    }

    #[test]
    fn test_render_reference_handle_and_unknown() {
        let parsed = ParsedReference::Channel {
            channel: ChannelRef::Handle("somehandle".to_string()),
        };
        assert_eq!(render_reference(&parsed), "kind: channel\nhandle: @somehandle");
        assert_eq!(render_reference(&ParsedReference::Unknown), "kind: unknown");
    }

    #[test]
    fn test_render_transcript() {
        let t = Transcript {
            video_id: "abc".to_string(),
            language: Some("en".to_string()),
            format: CaptionFormat::Vtt,
            text: "Hello world\nThis is a test".to_string(),
        };
        assert_eq!(render_transcript(&t), "Hello world\nThis is a test");
    }

    #[test]
    fn test_render_videos() {
        assert_eq!(
            render_videos(&[sample_video()]),
            "[4:13] Intro  https://www.youtube.com/watch?v=abc"
        );
        assert_eq!(render_videos(&[]), "");
    }

    #[test]
    fn test_render_playlist_content() {
        let content = Content::Playlist {
            playlist: PlaylistVideos {
                id: "PL1".to_string(),
                title: None,
                videos: vec![sample_video()],
            },
        };
        assert_eq!(
            render_content(&content),
            "Playlist: (untitled playlist) (PL1, 1 videos)\n[4:13] Intro  https://www.youtube.com/watch?v=abc"
        );
    }

    #[test]
    fn test_render_json_reference() {
        let json = render_json(&ParsedReference::Unknown).unwrap();
        assert_eq!(json, "{\n  \"kind\": \"unknown\"\n}");
    }
}
