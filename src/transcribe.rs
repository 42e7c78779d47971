use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::config::TranscriptionSettings;
use crate::error::{BotError, Result};

/// Longest text sent in a single Telegram message.
pub const MAX_MESSAGE_LEN: usize = 4000;

/// Languages offered on the lyrics keyboard, as (ISO code, display name).
pub const LYRICS_LANGUAGES: [(&str, &str); 14] = [
    ("en", "English"),
    ("fa", "Persian"),
    ("ru", "Russian"),
    ("ar", "Arabic"),
    ("fr", "French"),
    ("de", "German"),
    ("es", "Spanish"),
    ("tr", "Turkish"),
    ("hi", "Hindi"),
    ("it", "Italian"),
    ("pt", "Portuguese"),
    ("zh", "Chinese"),
    ("ja", "Japanese"),
    ("ko", "Korean"),
];

pub fn lyrics_language_code(name: &str) -> Option<&'static str> {
    let name = name.trim();
    LYRICS_LANGUAGES
        .iter()
        .find(|(_, display)| name.starts_with(display))
        .map(|(code, _)| *code)
}

pub fn lyrics_language_name(code: &str) -> Option<&'static str> {
    LYRICS_LANGUAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Client for an OpenAI-compatible `/audio/transcriptions` endpoint.
#[derive(Clone)]
pub struct Transcriber {
    client: reqwest::Client,
    settings: TranscriptionSettings,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl Transcriber {
    pub fn new(settings: TranscriptionSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            settings,
        }
    }

    pub async fn transcribe(&self, audio: &Path, language: &str) -> Result<String> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();

        let file_part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_for(audio))?;

        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", self.settings.model.clone())
            .text("language", language.to_string())
            .text("temperature", "0");

        info!("Transcribing {} as {}", audio.display(), language);
        let response = self
            .client
            .post(&self.settings.api_url)
            .bearer_auth(&self.settings.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body read error>".into());
            return Err(BotError::Transcription(format!("HTTP {status}: {body}")));
        }

        let result: TranscriptionResponse = response.json().await?;
        Ok(result.text)
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("ogg" | "oga" | "opus") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("wav") => "audio/wav",
        Some("m4a" | "aac") => "audio/mp4",
        _ => "audio/mpeg",
    }
}

/// Breaks lines after commas and periods and trims every line.
pub fn insert_newlines(text: &str) -> String {
    text.replace(',', ",\n")
        .replace('.', ".\n")
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splits `text` into parts of at most `limit` characters, preferring to cut
/// at a newline, then at a space.
pub fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        if rest.chars().count() <= limit {
            parts.push(rest.to_string());
            break;
        }

        let hard_cut = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let window = &rest[..hard_cut];
        let cut = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(hard_cut);

        parts.push(rest[..cut].to_string());
        rest = rest[cut..].trim_start_matches(['\n', ' ']);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newlines_follow_punctuation() {
        assert_eq!(insert_newlines("one, two. three"), "one,\ntwo.\nthree");
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(chunk_text("hello", 10), vec!["hello"]);
        assert!(chunk_text("", 10).is_empty());
    }

    #[test]
    fn chunks_prefer_line_then_space_boundaries() {
        let parts = chunk_text("aaaa\nbbbb cccc", 10);
        assert_eq!(parts, vec!["aaaa", "bbbb cccc"]);

        let parts = chunk_text("aaaa bbbb cccc", 10);
        assert_eq!(parts, vec!["aaaa bbbb", "cccc"]);

        let parts = chunk_text("abcdefghijkl", 5);
        assert_eq!(parts, vec!["abcde", "fghij", "kl"]);
    }

    #[test]
    fn chunks_respect_multibyte_characters() {
        let text = "سلام ".repeat(30);
        for part in chunk_text(&text, 12) {
            assert!(part.chars().count() <= 12);
        }
    }

    #[test]
    fn lyrics_languages_resolve() {
        assert_eq!(lyrics_language_code("Persian"), Some("fa"));
        assert_eq!(lyrics_language_code(" Korean "), Some("ko"));
        assert_eq!(lyrics_language_code("Klingon"), None);
        assert_eq!(lyrics_language_name("ja"), Some("Japanese"));
    }

    #[test]
    fn mime_follows_extension() {
        assert_eq!(mime_for(Path::new("a.OGG")), "audio/ogg");
        assert_eq!(mime_for(Path::new("a.mp3")), "audio/mpeg");
        assert_eq!(mime_for(Path::new("a.m4a")), "audio/mp4");
    }
}
