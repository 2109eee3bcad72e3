use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use serde::Serialize;

static CUE_TIMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d{1,2}:)?\d{2}:\d{2}[.,]\d{3}\s*-->\s*(?:\d{1,2}:)?\d{2}:\d{2}[.,]\d{3}")
        .expect("cue timing pattern")
});

static BARE_TIMESTAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d{1,2}:)?\d{1,2}:\d{2}(?:[.,]\d{1,3})?$").expect("timestamp pattern"));

static INLINE_TIMING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?:\d{1,2}:)?\d{2}:\d{2}\.\d{3}>").expect("inline timing pattern"));

static MARKUP_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("markup pattern"));

/// Caption file formats written by yt-dlp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionFormat {
    Vtt,
    Srt,
}

impl CaptionFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "vtt" => Some(CaptionFormat::Vtt),
            "srt" => Some(CaptionFormat::Srt),
            _ => None,
        }
    }
}

impl std::fmt::Display for CaptionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptionFormat::Vtt => write!(f, "vtt"),
            CaptionFormat::Srt => write!(f, "srt"),
        }
    }
}

/// A caption file chosen for a video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionFile {
    pub path: PathBuf,
    pub format: CaptionFormat,
    pub language: Option<String>,
}

/// Language tag from a yt-dlp file name, e.g. `en` in `abc123.en.vtt`
fn language_tag(path: &Path) -> Option<String> {
    let stem = Path::new(path.file_stem()?);
    stem.extension()?.to_str().map(str::to_string)
}

/// Pick one caption file for `video_id` out of a directory listing.
///
/// Only `.vtt`/`.srt` files whose name contains the video ID qualify. They are
/// ordered by file name, then the first one tagged with each preferred language
/// wins in preference order; failing that, the first qualifying file.
pub fn select_caption_file(paths: Vec<PathBuf>, video_id: &str, languages: &[String]) -> Option<CaptionFile> {
    let mut candidates: Vec<CaptionFile> = paths
        .into_iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.contains(video_id))
        })
        .filter_map(|path| {
            let format = CaptionFormat::from_path(&path)?;
            let language = language_tag(&path);
            Some(CaptionFile { path, format, language })
        })
        .collect();

    candidates.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    debug!("Caption candidates for {video_id}: {candidates:?}");

    let preferred = languages.iter().find_map(|lang| {
        candidates
            .iter()
            .position(|c| c.language.as_deref() == Some(lang.as_str()))
    });

    match preferred {
        Some(idx) => Some(candidates.swap_remove(idx)),
        None => candidates.into_iter().next(),
    }
}

fn is_numeric(line: &str) -> bool {
    !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit())
}

/// Turn raw WebVTT or SubRip text into plain prose, one caption line per line
pub fn normalize(raw: &str) -> String {
    let raw = raw
        .trim_start_matches('\u{feff}')
        .replace("\r\n", "\n")
        .replace('\r', "\n");

    // Auto-generated captions carry word-level `<00:00:01.234>` tags and repeat each
    // line in the following cue; only those files get consecutive repeats collapsed.
    let rolling = INLINE_TIMING.is_match(&raw);

    let mut lines = raw.lines().peekable();

    // WEBVTT header and its metadata block (Kind:, Language:) end at the first blank line
    if lines
        .peek()
        .is_some_and(|first| first.trim_start().starts_with("WEBVTT"))
    {
        lines.next();
        while lines
            .next_if(|l| !l.trim().is_empty() && !CUE_TIMING.is_match(l.trim()))
            .is_some()
        {}
    }

    let mut kept: Vec<String> = Vec::new();
    for line in lines {
        let line = line.trim();
        if CUE_TIMING.is_match(line) || is_numeric(line) {
            continue;
        }

        let stripped = MARKUP_TAG.replace_all(line, "");
        let decoded = html_escape::decode_html_entities(&stripped);
        let text = decoded.trim();

        if text.is_empty() || is_numeric(text) || BARE_TIMESTAMP.is_match(text) {
            continue;
        }
        if rolling && kept.last().is_some_and(|prev| prev == text) {
            continue;
        }
        kept.push(text.to_string());
    }

    kept.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn langs() -> Vec<String> {
        vec!["ko".to_string(), "en".to_string()]
    }

    #[test]
    fn test_normalize_vtt_block() {
        let raw = "WEBVTT\n\n1\n00:00:01.000 --> 00:00:04.000\n<i>Tom</i> &amp; Jerry\n";
        assert_eq!(normalize(raw), "Tom & Jerry");
    }

    #[test]
    fn test_normalize_vtt_metadata_header() {
        let raw = "WEBVTT\nKind: captions\nLanguage: en\n\n00:00:00.000 --> 00:00:02.000 align:start position:0%\nhello there\n\n00:00:02.000 --> 00:00:03.500\ngeneral kenobi\n";
        assert_eq!(normalize(raw), "hello there\ngeneral kenobi");
    }

    #[test]
    fn test_normalize_srt() {
        let raw = "1\r\n00:00:01,000 --> 00:00:02,500\r\nFirst line\r\n\r\n2\r\n00:00:02,500 --> 00:00:05,000\r\nSecond &quot;line&quot;\r\n&lt;not a tag&gt;\r\n";
        assert_eq!(normalize(raw), "First line\nSecond \"line\"\n<not a tag>");
    }

    #[test]
    fn test_normalize_inline_timing_tags() {
        let raw = "WEBVTT\n\n00:00:00.000 --> 00:00:02.350\nso<00:00:00.320><c> today</c><00:00:00.640><c> we</c>\n";
        assert_eq!(normalize(raw), "so today we");
    }

    #[test]
    fn test_normalize_collapses_rolling_repeats() {
        let raw = "WEBVTT\n\n00:00:00.000 --> 00:00:02.000\nfirst<00:00:00.500><c> words</c>\n\n00:00:02.000 --> 00:00:02.010\nfirst words\n \n00:00:02.010 --> 00:00:04.000\nfirst words\nnext words\n";
        assert_eq!(normalize(raw), "first words\nnext words");
    }

    #[test]
    fn test_normalize_keeps_spoken_repeats_in_srt() {
        let raw = "1\n00:00:01,000 --> 00:00:02,000\nNo.\n\n2\n00:00:02,000 --> 00:00:03,000\nNo.\n\n3\n00:00:03,000 --> 00:00:04,000\nStop it.\n";
        assert_eq!(normalize(raw), "No.\nNo.\nStop it.");
    }

    #[test]
    fn test_normalize_keeps_spoken_repeats_in_manual_vtt() {
        let raw = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nAgain!\n\n00:00:02.000 --> 00:00:03.000\nAgain!\n";
        assert_eq!(normalize(raw), "Again!\nAgain!");
    }

    #[test]
    fn test_normalize_drops_bare_timestamps_and_numbers() {
        let raw = "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\n00:01\n<b>42</b>\nreal text\n";
        assert_eq!(normalize(raw), "real text");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize("WEBVTT\n\n"), "");
        assert_eq!(normalize("  \n\n  "), "");
        assert_eq!(normalize("\u{feff}WEBVTT\n\n1\n00:00:01.000 --> 00:00:02.000\n<c></c>\n"), "");
    }

    #[test]
    fn test_caption_format_from_path() {
        assert_eq!(CaptionFormat::from_path(Path::new("a.en.vtt")), Some(CaptionFormat::Vtt));
        assert_eq!(CaptionFormat::from_path(Path::new("a.en.SRT")), Some(CaptionFormat::Srt));
        assert_eq!(CaptionFormat::from_path(Path::new("a.en.json3")), None);
        assert_eq!(CaptionFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_language_tag() {
        assert_eq!(language_tag(Path::new("/tmp/x/abc.en.vtt")), Some("en".to_string()));
        assert_eq!(language_tag(Path::new("/tmp/x/abc.vtt")), None);
    }

    #[test]
    fn test_select_prefers_primary_language() {
        let paths = vec![
            PathBuf::from("/s/abc123.en.vtt"),
            PathBuf::from("/s/abc123.ko.vtt"),
        ];
        let file = select_caption_file(paths, "abc123", &langs()).unwrap();
        assert_eq!(file.path, PathBuf::from("/s/abc123.ko.vtt"));
        assert_eq!(file.language.as_deref(), Some("ko"));
        assert_eq!(file.format, CaptionFormat::Vtt);
    }

    #[test]
    fn test_select_falls_back_to_second_language() {
        let paths = vec![
            PathBuf::from("/s/abc123.fr.vtt"),
            PathBuf::from("/s/abc123.en.srt"),
        ];
        let file = select_caption_file(paths, "abc123", &langs()).unwrap();
        assert_eq!(file.path, PathBuf::from("/s/abc123.en.srt"));
        assert_eq!(file.format, CaptionFormat::Srt);
    }

    #[test]
    fn test_select_falls_back_to_first_by_name() {
        let paths = vec![
            PathBuf::from("/s/abc123.fr.vtt"),
            PathBuf::from("/s/abc123.de.vtt"),
        ];
        let file = select_caption_file(paths, "abc123", &langs()).unwrap();
        assert_eq!(file.path, PathBuf::from("/s/abc123.de.vtt"));
    }

    #[test]
    fn test_select_ignores_other_videos_and_formats() {
        let paths = vec![
            PathBuf::from("/s/other.ko.vtt"),
            PathBuf::from("/s/abc123.ko.json3"),
            PathBuf::from("/s/abc123.info.json"),
        ];
        assert!(select_caption_file(paths, "abc123", &langs()).is_none());
    }

    #[test]
    fn test_select_empty() {
        assert!(select_caption_file(Vec::new(), "abc123", &langs()).is_none());
    }
}
