use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{BotError, Result};

const DEFAULT_TRANSCRIPTION_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub bot_username: String,
    pub owner_user_id: u64,
    pub downloads_dir: PathBuf,
    pub data_file: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub transcription: Option<TranscriptionSettings>,
    pub broadcast_delay: Duration,
    pub broadcast_prompt_timeout: Duration,
    pub donation: DonationAddresses,
}

#[derive(Debug, Clone)]
pub struct TranscriptionSettings {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Default)]
pub struct DonationAddresses {
    pub btc: String,
    pub eth: String,
    pub trx: String,
    pub usdt_trc20: String,
    pub usdt_erc20: String,
    pub shiba_bep20: String,
    pub shiba_erc20: String,
    pub doge: String,
    pub zarin_link: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or_empty = |key: &str| var(key).unwrap_or_default();

        let bot_token = var("BOT_TOKEN")
            .ok_or_else(|| BotError::Config("BOT_TOKEN not found in environment variables".into()))?;

        let transcription = var("TRANSCRIPTION_API_KEY").map(|api_key| TranscriptionSettings {
            api_url: var("TRANSCRIPTION_API_URL")
                .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_URL.to_string()),
            api_key,
            model: var("TRANSCRIPTION_MODEL").unwrap_or_else(|| "whisper-1".to_string()),
        });

        Ok(Config {
            bot_token,
            bot_username: or_empty("BOT_USERNAME").trim_start_matches('@').to_string(),
            owner_user_id: parse_or("OWNER_USER_ID", var("OWNER_USER_ID"), 0)?,
            downloads_dir: var("DOWNLOADS_DIR").unwrap_or_else(|| "downloads".into()).into(),
            data_file: var("DATA_FILE").unwrap_or_else(|| "data/users.json".into()).into(),
            ffmpeg_path: var("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".into()).into(),
            ffprobe_path: var("FFPROBE_PATH").unwrap_or_else(|| "ffprobe".into()).into(),
            transcription,
            broadcast_delay: Duration::from_millis(parse_or(
                "BROADCAST_DELAY_MS",
                var("BROADCAST_DELAY_MS"),
                3000,
            )?),
            broadcast_prompt_timeout: Duration::from_secs(parse_or(
                "BROADCAST_PROMPT_TIMEOUT_SECS",
                var("BROADCAST_PROMPT_TIMEOUT_SECS"),
                10,
            )?),
            donation: DonationAddresses {
                btc: or_empty("BTC_WALLET_ADDRESS"),
                eth: or_empty("ETH_WALLET_ADDRESS"),
                trx: or_empty("TRX_WALLET_ADDRESS"),
                usdt_trc20: or_empty("USDT_TRC20_WALLET_ADDRESS"),
                usdt_erc20: or_empty("USDT_ERC20_WALLET_ADDRESS"),
                shiba_bep20: or_empty("SHIBA_BEP20_WALLET_ADDRESS"),
                shiba_erc20: or_empty("SHIBA_ERC20_WALLET_ADDRESS"),
                doge: or_empty("DOGE_WALLET_ADDRESS"),
                zarin_link: or_empty("ZARIN_LINK_ADDRESS"),
            },
        })
    }

    /// The `🆔 @bot` line appended to captions, empty when the username is unknown.
    pub fn caption_suffix(&self) -> String {
        if self.bot_username.is_empty() {
            String::new()
        } else {
            format!("🆔 @{}", self.bot_username)
        }
    }

    pub fn lyrics_enabled(&self) -> bool {
        self.transcription.is_some()
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| BotError::Config(format!("{key} has an invalid value: {raw:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = config_from(&[]).unwrap_err();
        assert!(err.to_string().contains("BOT_TOKEN"));
    }

    #[test]
    fn defaults_are_applied() {
        let config = config_from(&[("BOT_TOKEN", "123:abc")]).unwrap();
        assert_eq!(config.owner_user_id, 0);
        assert_eq!(config.downloads_dir, PathBuf::from("downloads"));
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.broadcast_delay, Duration::from_secs(3));
        assert_eq!(config.broadcast_prompt_timeout, Duration::from_secs(10));
        assert!(!config.lyrics_enabled());
        assert_eq!(config.caption_suffix(), "");
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = config_from(&[("BOT_TOKEN", "t"), ("OWNER_USER_ID", "abc")]).unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
    }

    #[test]
    fn transcription_requires_an_api_key() {
        let config = config_from(&[
            ("BOT_TOKEN", "t"),
            ("TRANSCRIPTION_API_KEY", "sk-test"),
            ("TRANSCRIPTION_MODEL", "whisper-large"),
        ])
        .unwrap();
        let settings = config.transcription.unwrap();
        assert_eq!(settings.model, "whisper-large");
        assert_eq!(settings.api_url, DEFAULT_TRANSCRIPTION_URL);
    }

    #[test]
    fn caption_suffix_strips_at_sign() {
        let config = config_from(&[("BOT_TOKEN", "t"), ("BOT_USERNAME", "@MusicToolBot")]).unwrap();
        assert_eq!(config.caption_suffix(), "🆔 @MusicToolBot");
    }
}
