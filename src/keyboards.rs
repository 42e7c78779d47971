use teloxide::types::{KeyboardButton, KeyboardMarkup};

use crate::config::DonationAddresses;
use crate::handlers::donation::DonationMethod;
use crate::i18n::{Button, Language};
use crate::transcribe::LYRICS_LANGUAGES;

pub const BITRATES: [u32; 4] = [128, 192, 256, 320];

fn one_time(rows: Vec<Vec<KeyboardButton>>) -> KeyboardMarkup {
    KeyboardMarkup::new(rows).resize_keyboard().one_time_keyboard()
}

fn button(lang: Language, button: Button) -> KeyboardButton {
    KeyboardButton::new(button.label(lang))
}

/// Lays `labels` out two per row.
fn two_columns<I: IntoIterator<Item = String>>(labels: I) -> Vec<Vec<KeyboardButton>> {
    let labels: Vec<String> = labels.into_iter().collect();
    labels
        .chunks(2)
        .map(|pair| pair.iter().cloned().map(KeyboardButton::new).collect())
        .collect()
}

pub fn module_selector(lang: Language, lyrics_enabled: bool) -> KeyboardMarkup {
    let mut rows = vec![
        vec![button(lang, Button::TagEditor), button(lang, Button::VoiceConverter)],
        vec![button(lang, Button::Cutter), button(lang, Button::BitrateChanger)],
    ];
    if lyrics_enabled {
        rows.push(vec![button(lang, Button::Lyrics)]);
    }
    one_time(rows)
}

pub fn start_over(lang: Language) -> KeyboardMarkup {
    one_time(vec![vec![button(lang, Button::NewFile)]])
}

pub fn back(lang: Language) -> KeyboardMarkup {
    one_time(vec![vec![button(lang, Button::Back)]])
}

pub fn tag_editor(lang: Language) -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![
            button(lang, Button::Artist),
            button(lang, Button::Title),
            button(lang, Button::Album),
        ],
        vec![
            button(lang, Button::Genre),
            button(lang, Button::AlbumArt),
            button(lang, Button::RemoveAlbumArt),
        ],
        vec![
            button(lang, Button::Year),
            button(lang, Button::DiskNumber),
            button(lang, Button::TrackNumber),
        ],
        vec![button(lang, Button::Back)],
    ])
    .resize_keyboard()
}

pub fn bitrate_selector(lang: Language) -> KeyboardMarkup {
    let mut rows = two_columns(BITRATES.iter().map(|kbps| format!("{kbps} kb/s")));
    rows.push(vec![button(lang, Button::Back)]);
    one_time(rows)
}

pub fn language_selector() -> KeyboardMarkup {
    one_time(two_columns(
        Language::ALL.iter().map(|lang| lang.button_label().to_string()),
    ))
}

pub fn lyrics_languages(lang: Language) -> KeyboardMarkup {
    let mut rows = two_columns(LYRICS_LANGUAGES.iter().map(|(_, name)| name.to_string()));
    rows.push(vec![button(lang, Button::Back)]);
    one_time(rows)
}

/// Only the methods that have an address configured, two per row.
pub fn donation(addresses: &DonationAddresses) -> KeyboardMarkup {
    let labels = DonationMethod::ALL
        .into_iter()
        .filter(|method| method.is_configured(addresses))
        .map(|method| method.label().to_string());
    KeyboardMarkup::new(two_columns(labels)).resize_keyboard()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(markup: &KeyboardMarkup) -> Vec<Vec<String>> {
        markup
            .keyboard
            .iter()
            .map(|row| row.iter().map(|b| b.text.clone()).collect())
            .collect()
    }

    #[test]
    fn module_selector_hides_lyrics_without_transcription() {
        assert_eq!(labels(&module_selector(Language::En, false)).len(), 2);
        let rows = labels(&module_selector(Language::En, true));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], vec!["📝 Lyrics (AI ✨)"]);
    }

    #[test]
    fn bitrates_end_with_back() {
        let rows = labels(&bitrate_selector(Language::Ru));
        assert_eq!(rows[0], vec!["128 kb/s", "192 kb/s"]);
        assert_eq!(rows[1], vec!["256 kb/s", "320 kb/s"]);
        assert_eq!(rows[2], vec!["🔙 Назад"]);
    }

    #[test]
    fn language_selector_is_three_by_two() {
        let rows = labels(&language_selector());
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.len() == 2));
    }

    #[test]
    fn lyrics_keyboard_lists_every_language() {
        let rows = labels(&lyrics_languages(Language::En));
        assert_eq!(rows.len(), 8);
        assert_eq!(rows[0], vec!["English", "Persian"]);
        assert_eq!(rows[7], vec!["🔙 Back"]);
    }

    #[test]
    fn tag_editor_has_every_field() {
        let rows = labels(&tag_editor(Language::En));
        let all: Vec<String> = rows.concat();
        for b in [Button::Artist, Button::TrackNumber, Button::RemoveAlbumArt, Button::Back] {
            assert!(all.contains(&b.label(Language::En)));
        }
    }

    #[test]
    fn donation_shows_configured_methods_only() {
        let addresses = DonationAddresses {
            btc: "bc1".into(),
            usdt_erc20: "0xabc".into(),
            zarin_link: "https://zarinp.al/x".into(),
            ..DonationAddresses::default()
        };
        let rows = labels(&donation(&addresses));
        assert_eq!(rows, vec![vec!["Bitcoin (BTC)", "Tether (USDT)"], vec!["زرین پال"]]);
        assert!(labels(&donation(&DonationAddresses::default())).is_empty());
    }
}
