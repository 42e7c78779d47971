//! Localized strings for the six UI languages.
//!
//! Every table is embedded at compile time. Lookups fall back to English, and
//! a key that English does not know renders as `[missing] <key>`.

use std::collections::HashMap;
use std::sync::LazyLock;

use log::error;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Fa,
    Ru,
    Es,
    Fr,
    Ar,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::En,
        Language::Fa,
        Language::Ru,
        Language::Es,
        Language::Fr,
        Language::Ar,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fa => "fa",
            Language::Ru => "ru",
            Language::Es => "es",
            Language::Fr => "fr",
            Language::Ar => "ar",
        }
    }

    /// Label shown on the UI-language keyboard.
    pub fn button_label(self) -> &'static str {
        match self {
            Language::En => "🇬🇧 English",
            Language::Fa => "🇮🇷 فارسی",
            Language::Ru => "🇷🇺 Русский",
            Language::Es => "🇪🇸 Español",
            Language::Fr => "🇫🇷 Français",
            Language::Ar => "🇸🇦 العربية",
        }
    }

    /// The whole label, flag included, in any letter case.
    pub fn from_button_label(text: &str) -> Option<Language> {
        let text = text.trim().to_lowercase();
        Language::ALL
            .into_iter()
            .find(|lang| lang.button_label().to_lowercase() == text)
    }
}

static LOCALES: LazyLock<HashMap<Language, HashMap<String, String>>> = LazyLock::new(|| {
    let raw = [
        (Language::En, include_str!("locales/en.json")),
        (Language::Fa, include_str!("locales/fa.json")),
        (Language::Ru, include_str!("locales/ru.json")),
        (Language::Es, include_str!("locales/es.json")),
        (Language::Fr, include_str!("locales/fr.json")),
        (Language::Ar, include_str!("locales/ar.json")),
    ];

    raw.into_iter()
        .map(|(lang, json)| {
            let table = serde_json::from_str(json).unwrap_or_else(|err| {
                error!("Locale table {} is malformed: {}", lang.code(), err);
                HashMap::new()
            });
            (lang, table)
        })
        .collect()
});

fn lookup(lang: Language, key: &str) -> Option<&'static str> {
    LOCALES
        .get(&lang)
        .and_then(|table| table.get(key))
        .map(String::as_str)
}

pub fn t(lang: Language, key: &str) -> String {
    lookup(lang, key)
        .or_else(|| lookup(Language::En, key))
        .map(str::to_string)
        .unwrap_or_else(|| format!("[missing] {key}"))
}

/// Like [`t`], replacing every `{name}` placeholder with its value.
pub fn t_args(lang: Language, key: &str, args: &[(&str, &str)]) -> String {
    args.iter().fold(t(lang, key), |text, (name, value)| {
        text.replace(&format!("{{{name}}}"), value)
    })
}

/// Every reply-keyboard label the bot renders, in any language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    TagEditor,
    VoiceConverter,
    Cutter,
    BitrateChanger,
    Lyrics,
    Title,
    Artist,
    Album,
    Genre,
    AlbumArt,
    RemoveAlbumArt,
    Year,
    DiskNumber,
    TrackNumber,
    Back,
    NewFile,
}

impl Button {
    const ALL: [Button; 16] = [
        Button::TagEditor,
        Button::VoiceConverter,
        Button::Cutter,
        Button::BitrateChanger,
        Button::Lyrics,
        Button::Title,
        Button::Artist,
        Button::Album,
        Button::Genre,
        Button::AlbumArt,
        Button::RemoveAlbumArt,
        Button::Year,
        Button::DiskNumber,
        Button::TrackNumber,
        Button::Back,
        Button::NewFile,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Button::TagEditor => "btnTagAndArtEditor",
            Button::VoiceConverter => "btnMusicToVoiceConverter",
            Button::Cutter => "btnMusicCutter",
            Button::BitrateChanger => "btnBitrateChanger",
            Button::Lyrics => "btnLyrics",
            Button::Title => "btnTitle",
            Button::Artist => "btnArtist",
            Button::Album => "btnAlbum",
            Button::Genre => "btnGenre",
            Button::AlbumArt => "btnAlbumArt",
            Button::RemoveAlbumArt => "btnRemoveAlbumArt",
            Button::Year => "btnYear",
            Button::DiskNumber => "btnDiskNumber",
            Button::TrackNumber => "btnTrackNumber",
            Button::Back => "btnBack",
            Button::NewFile => "btnNewFile",
        }
    }

    pub fn label(self, lang: Language) -> String {
        t(lang, self.key())
    }

    pub fn parse(text: &str) -> Option<Button> {
        BUTTON_LABELS.get(text.trim()).copied()
    }
}

static BUTTON_LABELS: LazyLock<HashMap<String, Button>> = LazyLock::new(|| {
    let mut labels = HashMap::new();
    for lang in Language::ALL {
        for button in Button::ALL {
            if let Some(label) = lookup(lang, button.key()) {
                labels.insert(label.to_string(), button);
            }
        }
    }
    labels
});
