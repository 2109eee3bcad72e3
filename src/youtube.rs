use std::sync::LazyLock;

use eyre::{Result, bail, eyre};
use log::{debug, warn};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::reference::{ChannelRef, ParsedReference, format_timestamp};
use crate::watch_url;

const API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Largest page the Data API serves
const MAX_PAGE_SIZE: u32 = 50;

const SEARCH_LIMIT: &str = "10";

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)D)?T?(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?$").expect("ISO-8601 duration pattern")
});

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    default: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    high: Option<Thumbnail>,
}

impl Thumbnails {
    fn best(self) -> String {
        self.high
            .or(self.medium)
            .or(self.default)
            .map(|t| t.url)
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Snippet {
    title: String,
    description: String,
    thumbnails: Thumbnails,
    published_at: String,
    channel_id: String,
    channel_title: String,
    resource_id: Option<ResourceId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Statistics {
    view_count: Option<String>,
    like_count: Option<String>,
    subscriber_count: Option<String>,
    video_count: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ContentDetails {
    duration: Option<String>,
    item_count: Option<u64>,
    related_playlists: Option<RelatedPlaylists>,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Resource {
    id: String,
    #[serde(default)]
    snippet: Snippet,
    #[serde(default)]
    statistics: Statistics,
    #[serde(default)]
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    #[serde(default)]
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: SearchResultId,
}

#[derive(Debug, Deserialize)]
struct SearchResultId {
    #[serde(rename = "channelId")]
    channel_id: Option<String>,
}

/// Channel summary
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInfo {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub subscriber_count: u64,
    pub video_count: u64,
}

/// Video summary
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub published_at: String,
    /// `M:SS` or `H:MM:SS`
    pub duration: String,
    pub view_count: u64,
    pub like_count: u64,
    pub channel_id: String,
    pub channel_title: String,
    pub url: String,
}

/// Playlist summary
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInfo {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub video_count: u64,
    pub channel_id: String,
    pub channel_title: String,
}

/// One page of a channel's uploads
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPage {
    pub videos: Vec<VideoItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Every video in a playlist
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistVideos {
    pub id: String,
    pub title: Option<String>,
    pub videos: Vec<VideoItem>,
}

/// Metadata behind a parsed reference, one variant per content kind
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    #[serde(rename_all = "camelCase")]
    Video {
        video: VideoItem,
        channel: Option<ChannelInfo>,
        #[serde(skip_serializing_if = "Option::is_none")]
        start_seconds: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        playlist: Option<PlaylistVideos>,
    },
    Channel {
        channel: ChannelInfo,
    },
    Playlist {
        playlist: PlaylistVideos,
    },
}

fn count(value: Option<&str>) -> u64 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

impl From<Resource> for VideoItem {
    fn from(r: Resource) -> Self {
        VideoItem {
            url: watch_url(&r.id),
            id: r.id,
            title: r.snippet.title,
            description: r.snippet.description,
            thumbnail: r.snippet.thumbnails.best(),
            published_at: r.snippet.published_at,
            duration: format_duration(r.content_details.duration.as_deref().unwrap_or("")),
            view_count: count(r.statistics.view_count.as_deref()),
            like_count: count(r.statistics.like_count.as_deref()),
            channel_id: r.snippet.channel_id,
            channel_title: r.snippet.channel_title,
        }
    }
}

impl From<Resource> for ChannelInfo {
    fn from(r: Resource) -> Self {
        ChannelInfo {
            id: r.id,
            title: r.snippet.title,
            description: r.snippet.description,
            thumbnail: r.snippet.thumbnails.best(),
            subscriber_count: count(r.statistics.subscriber_count.as_deref()),
            video_count: count(r.statistics.video_count.as_deref()),
        }
    }
}

impl From<Resource> for PlaylistInfo {
    fn from(r: Resource) -> Self {
        PlaylistInfo {
            id: r.id,
            title: r.snippet.title,
            description: r.snippet.description,
            thumbnail: r.snippet.thumbnails.best(),
            video_count: r.content_details.item_count.unwrap_or(0),
            channel_id: r.snippet.channel_id,
            channel_title: r.snippet.channel_title,
        }
    }
}

/// Render an ISO-8601 duration (`PT4M13S`) as `4:13`; unparseable input gives `0:00`
pub fn format_duration(iso: &str) -> String {
    let Some(caps) = ISO_DURATION.captures(iso) else {
        return format_timestamp(0);
    };
    let unit = |idx: usize| -> u64 {
        caps.get(idx)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };

    let total = unit(1) * 86_400 + unit(2) * 3600 + unit(3) * 60 + unit(4);
    format_timestamp(total)
}

/// Client for the YouTube Data API v3
pub struct YouTubeClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl YouTubeClient {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: API_BASE_URL.to_string(),
        }
    }

    /// Build a client from the `GOOGLE_API_KEY` environment variable
    pub fn from_env(http: reqwest::Client) -> Result<Self> {
        let api_key = std::env::var("GOOGLE_API_KEY")
            .map_err(|_| eyre!("GOOGLE_API_KEY environment variable not set (required for YouTube metadata)"))?;
        Ok(Self::new(http, api_key))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!("GET {url} {params:?}");

        let resp = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("YouTube API {endpoint} returned {status}: {body}");
        }

        Ok(resp.json().await?)
    }

    /// Search channels by name, returning up to ten with statistics
    pub async fn search_channels(&self, query: &str) -> Result<Vec<ChannelInfo>> {
        let results: ListResponse<SearchResult> = self
            .get(
                "search",
                &[("q", query), ("type", "channel"), ("part", "snippet"), ("maxResults", SEARCH_LIMIT)],
            )
            .await?;

        let ids: Vec<String> = results.items.into_iter().filter_map(|r| r.id.channel_id).collect();
        debug!("Search {query:?} matched {} channels", ids.len());
        self.channels_by_ids(&ids).await
    }

    async fn channels_by_ids(&self, ids: &[String]) -> Result<Vec<ChannelInfo>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.join(",");
        let resp: ListResponse<Resource> = self
            .get("channels", &[("id", ids.as_str()), ("part", "snippet,statistics")])
            .await?;
        Ok(resp.items.into_iter().map(ChannelInfo::from).collect())
    }

    pub async fn channel_info(&self, channel_id: &str) -> Result<Option<ChannelInfo>> {
        Ok(self
            .channels_by_ids(&[channel_id.to_string()])
            .await?
            .into_iter()
            .next())
    }

    /// Look a channel up by `@handle`; if the lookup request fails, fall back to search
    pub async fn channel_by_handle(&self, handle: &str) -> Result<Option<ChannelInfo>> {
        let handle = handle.strip_prefix('@').unwrap_or(handle);

        let lookup: Result<ListResponse<Resource>> = self
            .get("channels", &[("forHandle", handle), ("part", "snippet,statistics")])
            .await;

        match lookup {
            Ok(resp) => Ok(resp.items.into_iter().next().map(ChannelInfo::from)),
            Err(e) => {
                warn!("Handle lookup for {handle} failed ({e}), falling back to search");
                Ok(self.search_channels(handle).await?.into_iter().next())
            }
        }
    }

    pub async fn channel_from_video(&self, video_id: &str) -> Result<Option<ChannelInfo>> {
        match self.video_info(video_id).await? {
            Some(video) => self.channel_info(&video.channel_id).await,
            None => Ok(None),
        }
    }

    async fn videos_by_ids(&self, ids: &[String]) -> Result<Vec<VideoItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.join(",");
        let resp: ListResponse<Resource> = self
            .get(
                "videos",
                &[("id", ids.as_str()), ("part", "snippet,statistics,contentDetails")],
            )
            .await?;
        Ok(resp.items.into_iter().map(VideoItem::from).collect())
    }

    pub async fn video_info(&self, video_id: &str) -> Result<Option<VideoItem>> {
        Ok(self
            .videos_by_ids(&[video_id.to_string()])
            .await?
            .into_iter()
            .next())
    }

    async fn playlist_item_page(
        &self,
        playlist_id: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<(Vec<String>, Option<String>)> {
        let max_results = max_results.clamp(1, MAX_PAGE_SIZE).to_string();
        let mut params = vec![
            ("playlistId", playlist_id),
            ("part", "snippet"),
            ("maxResults", max_results.as_str()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        let resp: ListResponse<PlaylistItem> = self.get("playlistItems", &params).await?;
        let ids = resp
            .items
            .into_iter()
            .filter_map(|item| item.snippet.resource_id.and_then(|r| r.video_id))
            .collect();
        Ok((ids, resp.next_page_token))
    }

    /// One page of a channel's uploads, newest first
    pub async fn channel_videos(
        &self,
        channel_id: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<VideoPage> {
        let resp: ListResponse<Resource> = self
            .get("channels", &[("id", channel_id), ("part", "contentDetails")])
            .await?;

        let uploads = resp
            .items
            .into_iter()
            .next()
            .and_then(|c| c.content_details.related_playlists)
            .and_then(|r| r.uploads)
            .ok_or_else(|| eyre!("no uploads playlist found for channel {channel_id}"))?;

        let (ids, next_page_token) = self.playlist_item_page(&uploads, max_results, page_token).await?;
        let videos = self.videos_by_ids(&ids).await?;

        Ok(VideoPage {
            videos,
            next_page_token,
        })
    }

    async fn playlist_title(&self, playlist_id: &str) -> Result<Option<String>> {
        let resp: ListResponse<Resource> = self
            .get("playlists", &[("id", playlist_id), ("part", "snippet")])
            .await?;
        Ok(resp.items.into_iter().next().map(|p| p.snippet.title))
    }

    /// Every video in a playlist, following page tokens until exhausted
    pub async fn playlist_videos(&self, playlist_id: &str) -> Result<PlaylistVideos> {
        let title = self.playlist_title(playlist_id).await?;

        let mut videos = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let (ids, next) = self
                .playlist_item_page(playlist_id, MAX_PAGE_SIZE, page_token.as_deref())
                .await?;
            videos.extend(self.videos_by_ids(&ids).await?);

            match next {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        debug!("Playlist {playlist_id}: {} videos", videos.len());

        Ok(PlaylistVideos {
            id: playlist_id.to_string(),
            title,
            videos,
        })
    }

    /// Every playlist a channel has published
    pub async fn channel_playlists(&self, channel_id: &str) -> Result<Vec<PlaylistInfo>> {
        let max_results = MAX_PAGE_SIZE.to_string();
        let mut playlists = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut params = vec![
                ("channelId", channel_id),
                ("part", "snippet,contentDetails"),
                ("maxResults", max_results.as_str()),
            ];
            if let Some(token) = page_token.as_deref() {
                params.push(("pageToken", token));
            }

            let resp: ListResponse<Resource> = self.get("playlists", &params).await?;
            playlists.extend(resp.items.into_iter().map(PlaylistInfo::from));

            match resp.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        debug!("Channel {channel_id}: {} playlists", playlists.len());
        Ok(playlists)
    }

    /// Fetch the metadata a parsed reference points at
    pub async fn resolve(&self, parsed: &ParsedReference) -> Result<Content> {
        match parsed {
            ParsedReference::Video {
                video_id,
                playlist_id,
                start_seconds,
            } => {
                let video = self
                    .video_info(video_id)
                    .await?
                    .ok_or_else(|| eyre!("video not found: {video_id}"))?;

                let playlist = async {
                    match playlist_id {
                        Some(id) => self.playlist_videos(id).await.map(Some),
                        None => Ok(None),
                    }
                };
                let (channel, playlist) = tokio::try_join!(self.channel_info(&video.channel_id), playlist)?;

                Ok(Content::Video {
                    video,
                    channel,
                    start_seconds: *start_seconds,
                    playlist,
                })
            }
            ParsedReference::Channel { channel } => {
                let found = match channel {
                    ChannelRef::Id(id) => self.channel_info(id).await?,
                    ChannelRef::Handle(handle) => self.channel_by_handle(handle).await?,
                };
                let channel = found.ok_or_else(|| eyre!("channel not found"))?;
                Ok(Content::Channel { channel })
            }
            ParsedReference::Playlist { playlist_id } => Ok(Content::Playlist {
                playlist: self.playlist_videos(playlist_id).await?,
            }),
            ParsedReference::Unknown => bail!("not a recognized YouTube URL"),
        }
    }
}
