use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use log::{debug, info, warn};
use tempfile::TempDir;
use tokio::process::Command;

use crate::captions::{self, CaptionFile};
use crate::error::TranscriptError;
use crate::{Transcript, watch_url};

/// Upper bound on a single yt-dlp run
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const SCRATCH_PREFIX: &str = "ytchat-subs-";

/// How to run yt-dlp for subtitle extraction
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// yt-dlp executable (or a launcher such as `python3`)
    pub ytdlp_bin: PathBuf,
    /// Arguments placed before the yt-dlp flags, e.g. `["-m", "yt_dlp"]`
    pub ytdlp_args: Vec<String>,
    /// Caption languages in preference order
    pub languages: Vec<String>,
    pub timeout: Duration,
    /// Parent directory for scratch areas (system temp dir if unset)
    pub scratch_root: Option<PathBuf>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            ytdlp_bin: PathBuf::from("yt-dlp"),
            ytdlp_args: Vec::new(),
            languages: vec!["ko".to_string(), "en".to_string()],
            timeout: DEFAULT_TIMEOUT,
            scratch_root: None,
        }
    }
}

/// Download a video's captions with yt-dlp and return them as plain text.
///
/// Each call works in its own scratch directory, which is removed before this
/// returns whichever way the extraction ends.
pub async fn extract_transcript(video_id: &str, opts: &ExtractOptions) -> Result<Transcript, TranscriptError> {
    validate_video_id(video_id)?;

    let scratch = create_scratch(opts)?;
    let scratch_path = scratch.path().to_path_buf();
    debug!("Scratch dir for {video_id}: {}", scratch_path.display());

    let result = extract_in(video_id, opts, &scratch_path).await;

    if let Err(e) = scratch.close() {
        warn!("Failed to remove scratch dir {}: {e}", scratch_path.display());
    }

    match &result {
        Ok(t) => info!(
            "Extracted transcript for {video_id} ({} chars, lang={:?}, {})",
            t.text.len(),
            t.language,
            t.format
        ),
        Err(e) => info!("Transcript extraction for {video_id} failed: {e}"),
    }
    result
}

fn validate_video_id(video_id: &str) -> Result<(), TranscriptError> {
    let valid = !video_id.is_empty()
        && video_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(TranscriptError::InvalidVideoId(video_id.to_string()))
    }
}

fn create_scratch(opts: &ExtractOptions) -> Result<TempDir, TranscriptError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(SCRATCH_PREFIX);
    match &opts.scratch_root {
        Some(root) => builder.tempdir_in(root),
        None => builder.tempdir(),
    }
    .map_err(TranscriptError::Scratch)
}

async fn extract_in(video_id: &str, opts: &ExtractOptions, dir: &Path) -> Result<Transcript, TranscriptError> {
    let output = run_ytdlp(video_id, opts, dir).await?;
    let stderr = String::from_utf8_lossy(&output.stderr);

    let paths = list_files(dir).await?;
    let file = match captions::select_caption_file(paths, video_id, &opts.languages) {
        Some(file) if output.status.success() => file,
        Some(file) => {
            warn!(
                "yt-dlp exited with {} but wrote {}; using it",
                output.status,
                file.path.display()
            );
            file
        }
        None if output.status.success() => {
            debug!("yt-dlp wrote no captions for {video_id}: {}", stderr.trim());
            return Err(TranscriptError::NoSubtitles);
        }
        None => {
            debug!("yt-dlp exited with {}: {}", output.status, stderr.trim());
            return Err(classify_failure(&stderr));
        }
    };

    read_caption_file(video_id, file).await
}

async fn run_ytdlp(video_id: &str, opts: &ExtractOptions, dir: &Path) -> Result<Output, TranscriptError> {
    let url = watch_url(video_id);
    let sub_langs = opts.languages.join(",");
    let bin = opts.ytdlp_bin.display().to_string();

    let mut cmd = Command::new(&opts.ytdlp_bin);
    cmd.args(&opts.ytdlp_args)
        .args([
            "--write-auto-sub",
            "--write-sub",
            "--sub-langs",
            &sub_langs,
            "--skip-download",
            "--output",
            "%(id)s.%(ext)s",
            &url,
        ])
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Running {bin} for {url} (langs={sub_langs}, timeout={:?})", opts.timeout);

    match tokio::time::timeout(opts.timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("{bin} not found: {e}");
            Err(TranscriptError::ToolNotInstalled { bin })
        }
        Ok(Err(source)) => Err(TranscriptError::Spawn { bin, source }),
        Err(_) => {
            // dropping the output future kills the child
            warn!("{bin} timed out after {:?} for {video_id}", opts.timeout);
            Err(TranscriptError::Timeout(opts.timeout))
        }
    }
}

async fn list_files(dir: &Path) -> Result<Vec<PathBuf>, TranscriptError> {
    let read_failed = |source| TranscriptError::ReadFailed {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_failed)?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_failed)? {
        if entry.file_type().await.map_err(read_failed)?.is_file() {
            paths.push(entry.path());
        }
    }
    Ok(paths)
}

async fn read_caption_file(video_id: &str, file: CaptionFile) -> Result<Transcript, TranscriptError> {
    debug!("Reading {}", file.path.display());

    let bytes = tokio::fs::read(&file.path)
        .await
        .map_err(|source| TranscriptError::ReadFailed {
            path: file.path.clone(),
            source,
        })?;

    let text = captions::normalize(&String::from_utf8_lossy(&bytes));
    if text.is_empty() {
        return Err(TranscriptError::EmptyTranscript { path: file.path });
    }

    Ok(Transcript {
        video_id: video_id.to_string(),
        language: file.language,
        format: file.format,
        text,
    })
}

/// Map yt-dlp's diagnostics to a failure kind
fn classify_failure(stderr: &str) -> TranscriptError {
    let lower = stderr.to_lowercase();
    let mentions = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if mentions(&["private video"]) {
        TranscriptError::PrivateVideo
    } else if mentions(&["video unavailable", "this video is unavailable"]) {
        TranscriptError::Unavailable
    } else if mentions(&["no subtitles", "no automatic captions"]) {
        TranscriptError::NoSubtitles
    } else if mentions(&["did not get any data blocks"]) {
        TranscriptError::EmptyData
    } else if mentions(&["confirm your age", "age-restricted", "inappropriate for some users"]) {
        TranscriptError::AgeRestricted
    } else {
        TranscriptError::Failed {
            message: last_error_line(stderr),
        }
    }
}

fn last_error_line(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

    lines
        .iter()
        .rev()
        .find_map(|l| l.strip_prefix("ERROR:"))
        .or_else(|| lines.last().copied())
        .map(|l| l.trim().to_string())
        .unwrap_or_else(|| "yt-dlp exited without output".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Options that run `script` through `sh -c` in place of yt-dlp
    fn sh_options(script: &str, root: &Path) -> ExtractOptions {
        ExtractOptions {
            ytdlp_bin: PathBuf::from("sh"),
            ytdlp_args: vec!["-c".to_string(), script.to_string(), "yt-dlp".to_string()],
            languages: vec!["ko".to_string(), "en".to_string()],
            timeout: Duration::from_secs(10),
            scratch_root: Some(root.to_path_buf()),
        }
    }

    fn is_empty_dir(path: &Path) -> bool {
        std::fs::read_dir(path).unwrap().next().is_none()
    }

    #[test]
    fn test_classify_private() {
        let stderr = "ERROR: [youtube] abc: Private video. Sign in if you've been granted access to this video";
        assert!(matches!(classify_failure(stderr), TranscriptError::PrivateVideo));
    }

    #[test]
    fn test_classify_unavailable() {
        let stderr = "ERROR: [youtube] abc: Video unavailable";
        assert!(matches!(classify_failure(stderr), TranscriptError::Unavailable));
    }

    #[test]
    fn test_classify_no_subtitles() {
        let stderr = "WARNING: [youtube] abc: There are no subtitles for the requested languages";
        assert!(matches!(classify_failure(stderr), TranscriptError::NoSubtitles));
    }

    #[test]
    fn test_classify_empty_data() {
        let stderr = "ERROR: Did not get any data blocks";
        assert!(matches!(classify_failure(stderr), TranscriptError::EmptyData));
    }

    #[test]
    fn test_classify_age_restricted() {
        let stderr = "ERROR: [youtube] abc: Sign in to confirm your age. This video may be inappropriate for some users.";
        assert!(matches!(classify_failure(stderr), TranscriptError::AgeRestricted));
    }

    #[test]
    fn test_classify_generic() {
        let stderr = "WARNING: something\nERROR: unable to download webpage: HTTP Error 429\n";
        match classify_failure(stderr) {
            TranscriptError::Failed { message } => {
                assert_eq!(message, "unable to download webpage: HTTP Error 429")
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_last_error_line_without_output() {
        assert_eq!(last_error_line(""), "yt-dlp exited without output");
        assert_eq!(last_error_line("boom\n"), "boom");
    }

    #[test]
    fn test_validate_video_id() {
        assert!(validate_video_id("dQw4w9WgXcQ").is_ok());
        assert!(validate_video_id("a-b_c").is_ok());
        assert!(validate_video_id("").is_err());
        assert!(validate_video_id("abc; rm -rf /").is_err());
    }

    #[tokio::test]
    async fn test_invalid_id_never_runs_tool() {
        let root = tempfile::tempdir().unwrap();
        let opts = sh_options("touch ran", root.path());
        let err = extract_transcript("../etc", &opts).await.unwrap_err();
        assert!(matches!(err, TranscriptError::InvalidVideoId(_)));
        assert!(is_empty_dir(root.path()));
    }

    #[tokio::test]
    async fn test_tool_not_installed() {
        let root = tempfile::tempdir().unwrap();
        let opts = ExtractOptions {
            ytdlp_bin: root.path().join("missing").join("yt-dlp"),
            scratch_root: Some(root.path().to_path_buf()),
            ..ExtractOptions::default()
        };

        let err = extract_transcript("abc123", &opts).await.unwrap_err();
        assert!(matches!(err, TranscriptError::ToolNotInstalled { .. }), "{err:?}");
        assert!(is_empty_dir(root.path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_no_subtitles_removes_scratch() {
        let root = tempfile::tempdir().unwrap();
        let opts = sh_options("echo 'WARNING: There are no subtitles for the requested languages' >&2", root.path());

        let err = extract_transcript("abc123", &opts).await.unwrap_err();
        assert!(matches!(err, TranscriptError::NoSubtitles), "{err:?}");
        assert!(is_empty_dir(root.path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_extracts_preferred_language() {
        let root = tempfile::tempdir().unwrap();
        let script = "\
printf '%s\\n' WEBVTT '' '00:00:01.000 --> 00:00:02.000' 'english &amp; more' > abc123.en.vtt
printf '%s\\n' WEBVTT '' '00:00:01.000 --> 00:00:02.000' '<c>annyeong</c>' > abc123.ko.vtt
printf '%s\\n' WEBVTT '' '00:00:01.000 --> 00:00:02.000' 'wrong video' > zzz999.ko.vtt";
        let opts = sh_options(script, root.path());

        let transcript = extract_transcript("abc123", &opts).await.unwrap();
        assert_eq!(transcript.text, "annyeong");
        assert_eq!(transcript.language.as_deref(), Some("ko"));
        assert_eq!(transcript.format, crate::CaptionFormat::Vtt);
        assert_eq!(transcript.video_id, "abc123");
        assert!(is_empty_dir(root.path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_falls_back_to_srt() {
        let root = tempfile::tempdir().unwrap();
        let script = "printf '%s\\n' 1 '00:00:01,000 --> 00:00:02,000' 'Hello &amp; welcome' > abc123.en.srt";
        let opts = sh_options(script, root.path());

        let transcript = extract_transcript("abc123", &opts).await.unwrap();
        assert_eq!(transcript.text, "Hello & welcome");
        assert_eq!(transcript.language.as_deref(), Some("en"));
        assert_eq!(transcript.format, crate::CaptionFormat::Srt);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_empty_caption_file() {
        let root = tempfile::tempdir().unwrap();
        let opts = sh_options("printf 'WEBVTT\\n\\n' > abc123.en.vtt", root.path());

        let err = extract_transcript("abc123", &opts).await.unwrap_err();
        assert!(matches!(err, TranscriptError::EmptyTranscript { .. }), "{err:?}");
        assert!(is_empty_dir(root.path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tool_failure_is_classified() {
        let root = tempfile::tempdir().unwrap();
        let opts = sh_options("echo 'ERROR: [youtube] abc123: Private video' >&2; exit 1", root.path());

        let err = extract_transcript("abc123", &opts).await.unwrap_err();
        assert!(matches!(err, TranscriptError::PrivateVideo), "{err:?}");
        assert!(is_empty_dir(root.path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_partial_failure_keeps_written_file() {
        let root = tempfile::tempdir().unwrap();
        let script = "printf '%s\\n' 'got this one' > abc123.en.vtt; echo 'ERROR: HTTP Error 429' >&2; exit 1";
        let opts = sh_options(script, root.path());

        let transcript = extract_transcript("abc123", &opts).await.unwrap();
        assert_eq!(transcript.text, "got this one");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let opts = ExtractOptions {
            timeout: Duration::from_millis(200),
            ..sh_options("sleep 5", root.path())
        };

        let started = std::time::Instant::now();
        let err = extract_transcript("abc123", &opts).await.unwrap_err();
        assert!(matches!(err, TranscriptError::Timeout(_)), "{err:?}");
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(is_empty_dir(root.path()));
    }
}
