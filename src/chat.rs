use std::path::Path;

use eyre::{Result, WrapErr, bail};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::youtube::Content;

pub const DEFAULT_MODEL: &str = "gpt-4o";

const BASE_SYSTEM_PROMPT: &str = "You are an expert in analysing YouTube content. \
Help the user based on the videos, playlists and channels they share with you. You can:
- summarise and analyse video content
- put together a study plan
- recommend related topics
- suggest an order in which to watch videos
- pull out the key points

Always answer in a friendly, helpful way.";

/// Who sent a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Earlier turns of a conversation, stored as a JSON array; a missing file is an empty history
pub fn load_history(path: &Path) -> Result<Vec<ChatMessage>> {
    if !path.exists() {
        debug!("No chat history at {}", path.display());
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&content).wrap_err_with(|| format!("invalid chat history in {}", path.display()))
}

pub fn save_history(path: &Path, messages: &[ChatMessage]) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(messages)?)?;
    debug!("Saved {} chat messages to {}", messages.len(), path.display());
    Ok(())
}

/// System prompt carrying the content under discussion and, when available, its transcript
pub fn build_system_prompt(content: Option<&Content>, transcript: Option<&str>) -> Result<String> {
    let mut prompt = BASE_SYSTEM_PROMPT.to_string();

    if let Some(content) = content {
        prompt.push_str("\n\nContent currently being analysed:\n");
        prompt.push_str(&serde_json::to_string_pretty(content)?);
    }

    if let Some(text) = transcript.filter(|t| !t.trim().is_empty()) {
        prompt.push_str("\n\nVideo transcript:\n");
        prompt.push_str(text);
    }

    Ok(prompt)
}

/// Send a conversation to an LLM and return the assistant's reply
pub async fn chat(client: &reqwest::Client, messages: &[ChatMessage], system: &str, model: &str) -> Result<String> {
    if messages.is_empty() {
        bail!("no messages to send");
    }

    if is_anthropic_model(model) {
        chat_anthropic(client, messages, system, model).await
    } else {
        chat_openai(client, messages, system, model).await
    }
}

fn is_anthropic_model(model: &str) -> bool {
    model.starts_with("claude")
}

async fn chat_anthropic(client: &reqwest::Client, messages: &[ChatMessage], system: &str, model: &str) -> Result<String> {
    let api_key = std::env::var("ANTHROPIC_API_KEY")
        .map_err(|_| eyre::eyre!("ANTHROPIC_API_KEY environment variable not set (required for Claude models)"))?;

    debug!("Chatting via Anthropic API with model {model} ({} messages)", messages.len());

    let body = serde_json::json!({
        "model": model,
        "max_tokens": 4096,
        "system": system,
        "messages": messages,
    });

    let resp = client
        .post("https://api.anthropic.com/v1/messages")
        .header("x-api-key", &api_key)
        .header("anthropic-version", "2023-06-01")
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("Anthropic API returned {status}: {body}");
    }

    let json: serde_json::Value = resp.json().await?;
    extract_anthropic_text(&json)
}

fn extract_anthropic_text(json: &serde_json::Value) -> Result<String> {
    if let Some(content) = json.get("content").and_then(|c| c.as_array()) {
        let text: String = content
            .iter()
            .filter_map(|block| {
                if block.get("type")?.as_str()? == "text" {
                    block.get("text")?.as_str().map(|s| s.to_string())
                } else {
                    None
                }
            })
            .collect::<Vec<_>>()
            .join("");
        if !text.is_empty() {
            return Ok(text);
        }
    }
    bail!("unexpected Anthropic API response format");
}

fn openai_messages(messages: &[ChatMessage], system: &str) -> Vec<serde_json::Value> {
    std::iter::once(serde_json::json!({"role": "system", "content": system}))
        .chain(messages.iter().map(|m| serde_json::json!(m)))
        .collect()
}

async fn chat_openai(client: &reqwest::Client, messages: &[ChatMessage], system: &str, model: &str) -> Result<String> {
    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| eyre::eyre!("OPENAI_API_KEY environment variable not set (required for OpenAI models)"))?;

    debug!("Chatting via OpenAI API with model {model} ({} messages)", messages.len());

    let body = serde_json::json!({
        "model": model,
        "messages": openai_messages(messages, system),
    });

    let resp = client
        .post("https://api.openai.com/v1/chat/completions")
        .bearer_auth(&api_key)
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        bail!("OpenAI API returned {status}: {body}");
    }

    let json: serde_json::Value = resp.json().await?;
    extract_openai_text(&json)
}

fn extract_openai_text(json: &serde_json::Value) -> Result<String> {
    if let Some(text) = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
    {
        return Ok(text.to_string());
    }
    bail!("unexpected OpenAI API response format");
}
