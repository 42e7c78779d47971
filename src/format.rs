use teloxide::utils::html;

use crate::i18n::{t_args, Language};
use crate::session::MusicTags;

/// `mm:ss`, or `00:00` for anything not positive.
pub fn seconds_to_mm_ss(seconds: i64) -> String {
    if seconds <= 0 {
        return "00:00".to_string();
    }
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

pub fn pretty_size(bytes: u64) -> String {
    const UNITS: [(u64, &str); 5] = [
        (1 << 50, "PB"),
        (1 << 40, "TB"),
        (1 << 30, "GB"),
        (1 << 20, "MB"),
        (1 << 10, "KB"),
    ];

    for (factor, suffix) in UNITS {
        if bytes >= factor {
            return format!("{} {}", bytes / factor, suffix);
        }
    }
    if bytes == 1 {
        "1 byte".to_string()
    } else {
        format!("{bytes} bytes")
    }
}

/// Maps Persian and Arabic-Indic digits to ASCII.
pub fn normalize_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '۰'..='۹' => char::from(b'0' + (c as u32 - '۰' as u32) as u8),
            '٠'..='٩' => char::from(b'0' + (c as u32 - '٠' as u32) as u8),
            _ => c,
        })
        .collect()
}

/// The localized HTML summary of a file's tags.
pub fn music_info(lang: Language, tags: &MusicTags) -> String {
    t_args(
        lang,
        "musicMetadataTemplate",
        &[
            ("artist", &html::escape(&tags.artist)),
            ("title", &html::escape(&tags.title)),
            ("album", &html::escape(&tags.album)),
            ("genre", &html::escape(&tags.genre)),
            ("year", &html::escape(&tags.year)),
            ("disknumber", &html::escape(&tags.disk_number)),
            ("tracknumber", &html::escape(&tags.track_number)),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(seconds_to_mm_ss(0), "00:00");
        assert_eq!(seconds_to_mm_ss(-5), "00:00");
        assert_eq!(seconds_to_mm_ss(75), "01:15");
        assert_eq!(seconds_to_mm_ss(600), "10:00");
        assert_eq!(seconds_to_mm_ss(6005), "100:05");
    }

    #[test]
    fn sizes_use_integer_amounts() {
        assert_eq!(pretty_size(0), "0 bytes");
        assert_eq!(pretty_size(1), "1 byte");
        assert_eq!(pretty_size(1023), "1023 bytes");
        assert_eq!(pretty_size(1536), "1 KB");
        assert_eq!(pretty_size(5 * (1 << 20) + 12), "5 MB");
        assert_eq!(pretty_size(3 << 30), "3 GB");
    }

    #[test]
    fn persian_and_arabic_digits_become_ascii() {
        assert_eq!(normalize_digits("۰۱:۲۳-٠٤:٥٦"), "01:23-04:56");
        assert_eq!(normalize_digits("abc 12"), "abc 12");
    }

    #[test]
    fn music_info_escapes_tags() {
        let tags = MusicTags {
            artist: "Tom & Jerry".into(),
            title: "<b>".into(),
            ..MusicTags::default()
        };
        let info = music_info(Language::En, &tags);
        assert!(info.contains("Tom &amp; Jerry"));
        assert!(info.contains("&lt;b&gt;"));
    }
}
