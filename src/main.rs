use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use clap::ValueEnum;
use eyre::{Result, bail, eyre};
use log::{debug, info, warn};
use serde::Serialize;

use ytchat::chat::{self, ChatMessage};
use ytchat::config::Config;
use ytchat::output;
use ytchat::reference::{self, ChannelRef, ParsedReference};
use ytchat::youtube::YouTubeClient;

mod cli;

use cli::{Cli, Commands, OutputFormat};

fn setup_logging() -> Result<()> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("ytchat.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ytchat")
        .join("logs")
}

fn tool_version(bin: &Path, args: &[String]) -> Option<String> {
    Command::new(bin)
        .args(args)
        .arg("--version")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| {
            String::from_utf8_lossy(&o.stdout)
                .trim()
                .lines()
                .next()
                .unwrap_or("")
                .to_string()
        })
}

/// Command line that runs yt-dlp, e.g. `python3 -m yt_dlp`
fn launcher_display(opts: &ytchat::ExtractOptions) -> String {
    std::iter::once(opts.ytdlp_bin.display().to_string())
        .chain(opts.ytdlp_args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn build_after_help(opts: &ytchat::ExtractOptions) -> String {
    let launcher = launcher_display(opts);
    let yt_dlp = tool_version(&opts.ytdlp_bin, &opts.ytdlp_args);

    let yt_dlp_line = match &yt_dlp {
        Some(v) => format!("  \x1b[32m✅\x1b[0m {launcher}     {v}"),
        None => format!("  \x1b[31m❌\x1b[0m {launcher}     (not found, needed for transcripts)"),
    };

    let log_path = log_dir().join("ytchat.log");

    format!(
        "\nREQUIRED TOOLS:\n{yt_dlp_line}\n\nENVIRONMENT:\n  GOOGLE_API_KEY     YouTube Data API (search, channel, videos, playlist(s), resolve, chat)\n  OPENAI_API_KEY     chat with OpenAI models\n  ANTHROPIC_API_KEY  chat with Claude models\n\nLogs are written to: {}",
        log_path.display()
    )
}

/// Print a value as text or JSON
fn emit<T: Serialize + ?Sized>(format: OutputFormat, value: &T, render: impl FnOnce(&T) -> String) -> Result<()> {
    let rendered = match format {
        OutputFormat::Text => render(value),
        OutputFormat::Json => output::render_json(value)?,
    };
    println!("{rendered}");
    Ok(())
}

fn read_stdin_lines() -> Result<Vec<String>> {
    let stdin = io::stdin();
    Ok(stdin.lock().lines().collect::<Result<Vec<_>, _>>()?)
}

/// Channel argument: `@handle`, a channel URL, or a bare channel ID
fn channel_reference(input: &str) -> ParsedReference {
    let input = input.trim();
    if let Some(handle) = input.strip_prefix('@') {
        return ParsedReference::Channel {
            channel: ChannelRef::Handle(handle.to_string()),
        };
    }
    if reference::is_reference(input) {
        return reference::interpret(input);
    }
    ParsedReference::Channel {
        channel: ChannelRef::Id(input.to_string()),
    }
}

/// A single `--output` file can only hold one transcript
fn check_output_target(inputs: &[String], output_path: Option<&Path>) -> Result<()> {
    let count = inputs.iter().filter(|i| !i.trim().is_empty()).count();
    match output_path {
        Some(path) if count > 1 => bail!(
            "--output {} given with {count} inputs; pass one URL per run or drop --output",
            path.display()
        ),
        _ => Ok(()),
    }
}

async fn run_transcript(
    cli_input: Option<String>,
    mut opts: ytchat::ExtractOptions,
    output_path: Option<PathBuf>,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let inputs = match cli_input {
        Some(input) => vec![input],
        None => read_stdin_lines()?,
    };

    if inputs.iter().all(|i| i.trim().is_empty()) {
        bail!("no URL or video ID provided\n\nUsage: ytchat transcript <URL>\n       echo <URL> | ytchat transcript");
    }
    check_output_target(&inputs, output_path.as_deref())?;

    opts.languages.retain(|l| !l.trim().is_empty());
    if opts.languages.is_empty() {
        opts.languages = ytchat::ExtractOptions::default().languages;
    }

    for raw in &inputs {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        let video_id = reference::video_id_from_input(raw).ok_or_else(|| {
            eyre!(
                "could not extract video ID from: {raw}\n\nSupported formats:\n  https://www.youtube.com/watch?v=ID\n  https://youtu.be/ID\n  <11-character video ID>"
            )
        })?;

        let transcript = ytchat::extract_transcript(&video_id, &opts).await.map_err(|e| {
            let kind = e.kind();
            eyre::Report::new(e).wrap_err(format!("no transcript for {video_id} [{kind}]"))
        })?;

        if verbose {
            eprintln!(
                "Video: {}\nLanguage: {}\nFormat: {}\nCharacters: {}",
                transcript.video_id,
                transcript.language.as_deref().unwrap_or("unknown"),
                transcript.format,
                transcript.text.len(),
            );
        }

        let rendered = match format {
            OutputFormat::Text => output::render_transcript(&transcript),
            OutputFormat::Json => output::render_json(&transcript)?,
        };

        if let Some(ref path) = output_path {
            std::fs::write(path, &rendered)?;
            if verbose {
                eprintln!("Output written to: {}", path.display());
            }
        } else {
            println!("{rendered}");
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_chat(
    client: &reqwest::Client,
    config: &Config,
    url: Option<String>,
    message: String,
    with_transcript: bool,
    model: String,
    history_path: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    let mut content = None;
    let mut transcript_text = None;

    if let Some(url) = url {
        let parsed = reference::interpret(&url);
        if parsed.is_unknown() {
            bail!("not a valid YouTube URL: {url}");
        }

        let yt = YouTubeClient::from_env(client.clone())?;
        content = Some(yt.resolve(&parsed).await?);

        if with_transcript {
            match &parsed {
                ParsedReference::Video { video_id, .. } => {
                    match ytchat::extract_transcript(video_id, &config.extract_options()).await {
                        Ok(t) => transcript_text = Some(t.text),
                        Err(e) => {
                            warn!("Continuing without transcript for {video_id}: {e}");
                            eprintln!("Transcript unavailable: {e}");
                        }
                    }
                }
                _ => eprintln!("Transcripts are only available for videos; continuing without one"),
            }
        }
    }

    if verbose {
        eprintln!(
            "Model: {model}\nContext: {}\nTranscript: {}",
            content.as_ref().map_or("none", |c| match c {
                ytchat::youtube::Content::Video { .. } => "video",
                ytchat::youtube::Content::Channel { .. } => "channel",
                ytchat::youtube::Content::Playlist { .. } => "playlist",
            }),
            transcript_text.as_ref().map_or(0, |t| t.len()),
        );
    }

    let mut messages = match &history_path {
        Some(path) => chat::load_history(path)?,
        None => Vec::new(),
    };
    messages.push(ChatMessage::user(message));

    let system = chat::build_system_prompt(content.as_ref(), transcript_text.as_deref())?;
    let reply = chat::chat(client, &messages, &system, &model).await?;
    println!("{reply}");

    if let Some(path) = &history_path {
        messages.push(ChatMessage::assistant(reply));
        chat::save_history(path, &messages)?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    // Load config file (non-fatal if missing/invalid)
    let config = Config::load().unwrap_or_default();

    let after_help = build_after_help(&config.extract_options());
    let cmd = <Cli as clap::CommandFactory>::command().after_help(after_help);
    let matches = cmd.get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)?;

    if cli.verbose {
        let config_path = ytchat::config::config_path();
        if config_path.exists() {
            eprintln!("Config: {}", config_path.display());
        }
    }

    // CLI flags take priority over config
    let format = cli
        .format
        .or_else(|| {
            config
                .default_format
                .as_deref()
                .and_then(|f| OutputFormat::from_str(f, true).ok())
        })
        .unwrap_or(OutputFormat::Text);
    debug!("Output format: {format:?}");

    let client = reqwest::Client::new();

    match cli.command {
        Commands::Parse { input } => {
            let parsed = reference::interpret(&input);
            emit(format, &parsed, output::render_reference)?;
        }
        Commands::Check { input } => {
            let is_youtube = reference::is_reference(&input);
            emit(format, &is_youtube, |yes| (if *yes { "youtube" } else { "not youtube" }).to_string())?;
            if !is_youtube {
                std::process::exit(1);
            }
        }
        Commands::Transcript {
            input,
            lang,
            timeout,
            output: output_path,
        } => {
            let mut opts = config.extract_options();
            if !lang.is_empty() {
                opts.languages = lang;
            }
            if let Some(secs) = timeout.filter(|s| *s > 0) {
                opts.timeout = Duration::from_secs(secs);
            }
            run_transcript(input, opts, output_path, format, cli.verbose).await?;
        }
        Commands::Search { query } => {
            let yt = YouTubeClient::from_env(client.clone())?;
            let channels = yt.search_channels(&query).await?;
            emit(format, channels.as_slice(), output::render_channels)?;
        }
        Commands::Channel { channel } => {
            let parsed = channel_reference(&channel);
            let yt = YouTubeClient::from_env(client.clone())?;
            let content = yt.resolve(&parsed).await?;
            emit(format, &content, output::render_content)?;
        }
        Commands::Videos {
            channel_id,
            max_results,
            page_token,
        } => {
            let yt = YouTubeClient::from_env(client.clone())?;
            let page = yt
                .channel_videos(&channel_id, max_results, page_token.as_deref())
                .await?;
            emit(format, &page, |p| match &p.next_page_token {
                Some(token) => format!("{}\n\nNext page: --page-token {token}", output::render_videos(&p.videos)),
                None => output::render_videos(&p.videos),
            })?;
        }
        Commands::Playlist { playlist_id } => {
            let yt = YouTubeClient::from_env(client.clone())?;
            let playlist = yt.playlist_videos(&playlist_id).await?;
            emit(format, &playlist, output::render_playlist)?;
        }
        Commands::Playlists { channel_id } => {
            let yt = YouTubeClient::from_env(client.clone())?;
            let playlists = yt.channel_playlists(&channel_id).await?;
            emit(format, playlists.as_slice(), output::render_playlists)?;
        }
        Commands::Resolve { input } => {
            let yt = YouTubeClient::from_env(client.clone())?;
            if reference::is_reference(&input) {
                let parsed = reference::interpret(&input);
                if parsed.is_unknown() {
                    bail!("not a supported YouTube URL: {input}");
                }
                let content = yt.resolve(&parsed).await?;
                emit(format, &content, output::render_content)?;
            } else {
                debug!("Not a YouTube URL, searching channels: {input}");
                let channels = yt.search_channels(&input).await?;
                emit(format, channels.as_slice(), output::render_channels)?;
            }
        }
        Commands::Chat {
            url,
            message,
            transcript,
            model,
            history,
        } => {
            let model = model
                .or_else(|| config.default_model.clone())
                .unwrap_or_else(|| chat::DEFAULT_MODEL.to_string());
            run_chat(&client, &config, url, message, transcript, model, history, cli.verbose).await?;
        }
    }

    Ok(())
}
