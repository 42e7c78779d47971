//! Everything that touches audio goes through `ffmpeg` and `ffprobe`.
//!
//! Argument lists are built by plain functions so they can be checked without
//! the binaries installed; [`Ffmpeg`] only runs them.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use log::debug;
use serde_json::Value;
use tokio::process::Command;

use crate::error::{BotError, Result};
use crate::session::MusicTags;

pub const THUMBNAIL_SIZE: u32 = 320;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeInfo {
    pub duration_secs: u32,
    pub tags: MusicTags,
    pub has_art: bool,
}

#[derive(Debug, Clone)]
pub struct Ffmpeg {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Ffmpeg {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Runs ffmpeg with `args`, turning a non-zero exit into [`BotError::Ffmpeg`].
    pub async fn run(&self, args: &[String]) -> Result<()> {
        debug!("Running {} {}", self.ffmpeg.display(), args.join(" "));
        let output = Command::new(&self.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(BotError::Ffmpeg {
                program: "ffmpeg".to_string(),
                stderr: last_lines(&String::from_utf8_lossy(&output.stderr), 5),
            });
        }
        Ok(())
    }

    pub async fn probe(&self, input: &Path) -> Result<ProbeInfo> {
        let output = Command::new(&self.ffprobe)
            .args(probe_args(input))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(BotError::Ffmpeg {
                program: "ffprobe".to_string(),
                stderr: last_lines(&String::from_utf8_lossy(&output.stderr), 5),
            });
        }
        parse_probe_output(&output.stdout)
    }

    pub async fn extract_art(&self, input: &Path, out: &Path) -> Result<()> {
        self.run(&extract_art_args(input, out)).await
    }

    pub async fn write_tags(
        &self,
        input: &Path,
        tags: &MusicTags,
        art: Option<&Path>,
        out: &Path,
    ) -> Result<()> {
        self.run(&write_tags_args(input, tags, art, out)).await
    }

    /// Strips the cover from `input` in place.
    pub async fn remove_art(&self, input: &Path) -> Result<()> {
        let tmp = sibling_temp(input);
        self.run(&remove_art_args(input, &tmp)).await?;
        tokio::fs::rename(&tmp, input).await?;
        Ok(())
    }

    pub async fn cut(&self, input: &Path, start: u32, duration: u32, out: &Path) -> Result<()> {
        self.run(&cut_args(input, start, duration, out)?).await
    }

    pub async fn change_bitrate(&self, input: &Path, kbps: u32, out: &Path) -> Result<()> {
        self.run(&bitrate_args(input, kbps, out)).await
    }

    pub async fn to_voice(&self, input: &Path, out: &Path) -> Result<()> {
        self.run(&voice_args(input, out)).await
    }

    pub async fn make_thumbnail(&self, art: &Path, out: &Path) -> Result<()> {
        self.run(&thumbnail_args(art, out)).await
    }
}

/// `song.mp3` becomes `song.tmp.mp3`, keeping the extension ffmpeg muxes by.
pub fn sibling_temp(path: &Path) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => path.with_file_name(format!("{stem}.tmp.{ext}")),
        None => path.with_file_name(format!("{stem}.tmp")),
    }
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Containers ffmpeg can store an attached picture in.
fn supports_cover(path: &Path) -> bool {
    matches!(extension(path).as_str(), "mp3" | "m4a" | "flac")
}

pub fn probe_args(input: &Path) -> Vec<String> {
    let mut args = strings(&["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"]);
    args.push(path_arg(input));
    args
}

pub fn extract_art_args(input: &Path, out: &Path) -> Vec<String> {
    let mut args = strings(&["-hide_banner", "-y", "-i"]);
    args.push(path_arg(input));
    args.extend(strings(&["-an", "-map", "0:v:0", "-c:v", "mjpeg", "-frames:v", "1"]));
    args.push(path_arg(out));
    args
}

pub fn write_tags_args(input: &Path, tags: &MusicTags, art: Option<&Path>, out: &Path) -> Vec<String> {
    let art = art.filter(|_| supports_cover(out));

    let mut args = strings(&["-hide_banner", "-y", "-i"]);
    args.push(path_arg(input));
    if let Some(art) = art {
        args.push("-i".into());
        args.push(path_arg(art));
    }

    args.extend(strings(&["-map", "0:a:0"]));
    match art {
        Some(_) => args.extend(strings(&["-map", "1:v:0"])),
        None if supports_cover(out) => args.extend(strings(&["-map", "0:v?"])),
        None => {}
    }
    args.extend(strings(&["-map_metadata", "0"]));

    let metadata = [
        ("artist", &tags.artist),
        ("title", &tags.title),
        ("album", &tags.album),
        ("genre", &tags.genre),
        ("date", &tags.year),
        ("disc", &tags.disk_number),
        ("track", &tags.track_number),
    ];
    for (key, value) in metadata {
        args.push("-metadata".into());
        args.push(format!("{key}={}", value.trim()));
    }

    args.extend(strings(&["-c", "copy"]));
    if supports_cover(out) {
        args.extend(strings(&["-disposition:v:0", "attached_pic"]));
    }
    if extension(out) == "mp3" {
        args.extend(strings(&["-id3v2_version", "3"]));
    }
    args.push(path_arg(out));
    args
}

pub fn remove_art_args(input: &Path, out: &Path) -> Vec<String> {
    let mut args = strings(&["-hide_banner", "-y", "-i"]);
    args.push(path_arg(input));
    args.extend(strings(&["-map", "0:a", "-map_metadata", "0", "-c:a", "copy"]));
    args.push(path_arg(out));
    args
}

/// Stream-copies `duration` seconds starting at `start`, keeping tags. The
/// cover is kept only for containers that can hold one.
pub fn cut_args(input: &Path, start: u32, duration: u32, out: &Path) -> Result<Vec<String>> {
    if duration == 0 {
        return Err(BotError::InvalidInput("cut duration must be positive".into()));
    }

    let mut args = strings(&["-hide_banner", "-y", "-ss"]);
    args.push(start.to_string());
    args.push("-t".into());
    args.push(duration.to_string());
    args.push("-i".into());
    args.push(path_arg(input));
    args.extend(strings(&["-map", "0:a:0"]));
    if supports_cover(out) {
        args.extend(strings(&["-map", "0:v?"]));
    }
    args.extend(strings(&["-map_metadata", "0", "-c", "copy"]));
    if supports_cover(out) {
        args.extend(strings(&["-disposition:v:0", "attached_pic"]));
    }
    args.push(path_arg(out));
    Ok(args)
}

pub fn bitrate_args(input: &Path, kbps: u32, out: &Path) -> Vec<String> {
    let mut args = strings(&["-hide_banner", "-y", "-i"]);
    args.push(path_arg(input));
    args.extend(strings(&["-map", "0:a:0", "-map", "0:v?", "-map_metadata", "0"]));
    args.extend(strings(&["-c:a", "libmp3lame", "-b:a"]));
    args.push(format!("{kbps}k"));
    args.extend(strings(&[
        "-ac",
        "2",
        "-ar",
        "44100",
        "-c:v",
        "copy",
        "-disposition:v:0",
        "attached_pic",
    ]));
    args.push(path_arg(out));
    args
}

/// Mono Opus tuned for voice messages, without any metadata.
pub fn voice_args(input: &Path, out: &Path) -> Vec<String> {
    let mut args = strings(&["-hide_banner", "-y", "-i"]);
    args.push(path_arg(input));
    args.extend(strings(&[
        "-map",
        "0:a:0",
        "-vn",
        "-sn",
        "-dn",
        "-map_metadata",
        "-1",
        "-ac",
        "1",
        "-c:a",
        "libopus",
        "-b:a",
        "32k",
        "-vbr",
        "on",
        "-compression_level",
        "10",
        "-frame_duration",
        "60",
        "-application",
        "voip",
    ]));
    args.push(path_arg(out));
    args
}

pub fn thumbnail_args(art: &Path, out: &Path) -> Vec<String> {
    let mut args = strings(&["-hide_banner", "-y", "-i"]);
    args.push(path_arg(art));
    args.push("-vf".into());
    args.push(format!(
        "scale={THUMBNAIL_SIZE}:{THUMBNAIL_SIZE}:force_original_aspect_ratio=decrease"
    ));
    args.extend(strings(&["-frames:v", "1", "-q:v", "3"]));
    args.push(path_arg(out));
    args
}

/// Reads duration, tags and cover presence from `ffprobe -print_format json`.
pub fn parse_probe_output(raw: &[u8]) -> Result<ProbeInfo> {
    let info: Value = serde_json::from_slice(raw)?;

    let streams = info["streams"].as_array().cloned().unwrap_or_default();
    let audio = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("audio"))
        .ok_or_else(|| BotError::Probe("no audio stream".into()))?;

    let duration = info["format"]["duration"]
        .as_str()
        .or_else(|| audio["duration"].as_str())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let has_art = streams.iter().any(|s| {
        s["codec_type"].as_str() == Some("video")
            && s["disposition"]["attached_pic"].as_i64() == Some(1)
    });

    let tag = |names: &[&str]| {
        [&info["format"]["tags"], &audio["tags"]]
            .into_iter()
            .filter_map(Value::as_object)
            .flat_map(|tags| tags.iter())
            .find(|(key, _)| names.iter().any(|n| key.eq_ignore_ascii_case(n)))
            .and_then(|(_, value)| value.as_str())
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };

    let tags = MusicTags {
        artist: tag(&["artist"]),
        title: tag(&["title"]),
        album: tag(&["album"]),
        genre: tag(&["genre"]),
        year: leading_number(&tag(&["date", "year", "tdrc", "tyer"])),
        disk_number: leading_number(&tag(&["disc", "discnumber", "tpos"])),
        track_number: leading_number(&tag(&["track", "tracknumber", "trck"])),
    };

    Ok(ProbeInfo {
        duration_secs: duration.max(0.0).round() as u32,
        tags,
        has_art,
    })
}

/// `"3/12"` and `"2021-05-01"` keep only their leading number.
fn leading_number(value: &str) -> String {
    value.chars().take_while(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "audio", "codec_name": "mp3", "duration": "201.5"},
            {"index": 1, "codec_type": "video", "codec_name": "mjpeg", "disposition": {"attached_pic": 1}}
        ],
        "format": {
            "duration": "201.534",
            "tags": {"ARTIST": "Daft Punk", "title": "Contact", "album": "RAM", "TRACK": "13/13", "date": "2013-05-17", "disc": "1/1", "genre": "Electronic"}
        }
    }"#;

    #[test]
    fn probe_output_is_parsed() {
        let info = parse_probe_output(PROBE.as_bytes()).unwrap();
        assert_eq!(info.duration_secs, 202);
        assert!(info.has_art);
        assert_eq!(info.tags.artist, "Daft Punk");
        assert_eq!(info.tags.track_number, "13");
        assert_eq!(info.tags.year, "2013");
        assert_eq!(info.tags.disk_number, "1");
    }

    #[test]
    fn stream_tags_are_a_fallback() {
        let raw = r#"{"streams":[{"codec_type":"audio","duration":"10.2","tags":{"TITLE":"Ogg Song"}}],"format":{}}"#;
        let info = parse_probe_output(raw.as_bytes()).unwrap();
        assert_eq!(info.duration_secs, 10);
        assert_eq!(info.tags.title, "Ogg Song");
        assert!(!info.has_art);
    }

    #[test]
    fn probe_without_audio_fails() {
        let raw = r#"{"streams":[{"codec_type":"video"}],"format":{"duration":"3.0"}}"#;
        assert!(matches!(parse_probe_output(raw.as_bytes()), Err(BotError::Probe(_))));
    }

    #[test]
    fn cut_copies_streams_and_validates_duration() {
        let args = cut_args(Path::new("in.mp3"), 10, 50, Path::new("out.mp3")).unwrap();
        assert_eq!(&args[..7], &["-hide_banner", "-y", "-ss", "10", "-t", "50", "-i"]);
        assert!(args.windows(2).any(|w| w == ["-c", "copy"]));
        assert_eq!(args.last().map(String::as_str), Some("out.mp3"));
        assert!(args.windows(2).any(|w| w == ["-map", "0:v?"]));
        assert!(args.iter().any(|a| a == "attached_pic"));
        assert!(cut_args(Path::new("in.mp3"), 10, 0, Path::new("out.mp3")).is_err());
    }

    #[test]
    fn cut_drops_cover_for_ogg_and_opus() {
        for (input, out) in [("in.ogg", "cut.ogg"), ("in.opus", "cut.opus")] {
            let args = cut_args(Path::new(input), 0, 30, Path::new(out)).unwrap();
            assert!(args.windows(2).any(|w| w == ["-map", "0:a:0"]));
            assert!(!args.iter().any(|a| a == "0:v?"), "{out}");
            assert!(!args.iter().any(|a| a == "attached_pic"), "{out}");
            assert!(args.windows(2).any(|w| w == ["-c", "copy"]));
        }
    }

    #[test]
    fn bitrate_reencodes_with_lame() {
        let args = bitrate_args(Path::new("in.flac"), 192, Path::new("out.mp3"));
        assert!(args.windows(2).any(|w| w == ["-c:a", "libmp3lame"]));
        assert!(args.windows(2).any(|w| w == ["-b:a", "192k"]));
        assert!(args.windows(2).any(|w| w == ["-ar", "44100"]));
    }

    #[test]
    fn voice_is_mono_opus_without_metadata() {
        let args = voice_args(Path::new("in.mp3"), Path::new("out.ogg"));
        assert!(args.windows(2).any(|w| w == ["-c:a", "libopus"]));
        assert!(args.windows(2).any(|w| w == ["-map_metadata", "-1"]));
        assert!(args.windows(2).any(|w| w == ["-ac", "1"]));
        assert!(args.windows(2).any(|w| w == ["-application", "voip"]));
    }

    #[test]
    fn write_tags_embeds_new_cover_in_mp3() {
        let tags = MusicTags {
            artist: "A".into(),
            year: "1999".into(),
            ..MusicTags::default()
        };
        let args = write_tags_args(
            Path::new("in.mp3"),
            &tags,
            Some(Path::new("cover.jpg")),
            Path::new("out.mp3"),
        );
        assert!(args.windows(2).any(|w| w == ["-i", "cover.jpg"]));
        assert!(args.windows(2).any(|w| w == ["-map", "1:v:0"]));
        assert!(args.windows(2).any(|w| w == ["-metadata", "artist=A"]));
        assert!(args.windows(2).any(|w| w == ["-metadata", "date=1999"]));
        assert!(args.windows(2).any(|w| w == ["-id3v2_version", "3"]));
    }

    #[test]
    fn write_tags_skips_cover_for_ogg() {
        let args = write_tags_args(
            Path::new("in.ogg"),
            &MusicTags::default(),
            Some(Path::new("cover.jpg")),
            Path::new("out.ogg"),
        );
        assert!(!args.iter().any(|a| a == "cover.jpg"));
        assert!(!args.iter().any(|a| a == "-id3v2_version"));
        assert!(!args.iter().any(|a| a == "attached_pic"));
    }

    #[test]
    fn thumbnail_fits_telegram_limit() {
        let args = thumbnail_args(Path::new("art.jpg"), Path::new("thumb.jpg"));
        assert!(args.iter().any(|a| a.starts_with("scale=320:320")));
    }

    #[test]
    fn temp_sibling_keeps_extension() {
        assert_eq!(sibling_temp(Path::new("/d/song.mp3")), PathBuf::from("/d/song.tmp.mp3"));
        assert_eq!(sibling_temp(Path::new("/d/song")), PathBuf::from("/d/song.tmp"));
    }

    #[test]
    fn stderr_is_trimmed_to_last_lines() {
        assert_eq!(last_lines("a\n\nb\nc\nd", 2), "c\nd");
    }
}
