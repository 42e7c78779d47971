//! Per-chat state that threads a user through the file operations.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use teloxide::types::MessageId;

use crate::files;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Module {
    #[default]
    None,
    TagEditor,
    Cutter,
    BitrateChanger,
    VoiceConverter,
    Lyrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagField {
    Artist,
    Title,
    Album,
    Genre,
    Year,
    DiskNumber,
    TrackNumber,
    AlbumArt,
}

impl TagField {
    pub fn is_numeric(self) -> bool {
        matches!(self, TagField::Year | TagField::DiskNumber | TagField::TrackNumber)
    }

    /// Locale key of the prompt asking for this field.
    pub fn prompt_key(self) -> &'static str {
        match self {
            TagField::Artist => "askForArtist",
            TagField::Title => "askForTitle",
            TagField::Album => "askForAlbum",
            TagField::Genre => "askForGenre",
            TagField::Year => "askForYear",
            TagField::DiskNumber => "askForDiskNumber",
            TagField::TrackNumber => "askForTrackNumber",
            TagField::AlbumArt => "askForAlbumArt",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicTags {
    pub artist: String,
    pub title: String,
    pub album: String,
    pub genre: String,
    pub year: String,
    pub disk_number: String,
    pub track_number: String,
}

impl MusicTags {
    /// Stores user input into a field. Numeric fields keep only an all-digit
    /// value and fall back to `0`; the return value tells whether that happened.
    pub fn set(&mut self, field: TagField, value: &str) -> bool {
        let value = value.trim();
        let slot = match field {
            TagField::Artist => &mut self.artist,
            TagField::Title => &mut self.title,
            TagField::Album => &mut self.album,
            TagField::Genre => &mut self.genre,
            TagField::Year => &mut self.year,
            TagField::DiskNumber => &mut self.disk_number,
            TagField::TrackNumber => &mut self.track_number,
            TagField::AlbumArt => return false,
        };

        if field.is_numeric() && !is_digits(value) {
            *slot = "0".to_string();
            return true;
        }
        *slot = value.to_string();
        false
    }
}

pub fn is_digits(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_digit())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusicFile {
    pub path: PathBuf,
    pub message_id: MessageId,
    pub duration_secs: u32,
    pub art_path: Option<PathBuf>,
    pub new_art_path: Option<PathBuf>,
}

impl MusicFile {
    /// The cover to show or embed: the uploaded one wins over the original.
    pub fn current_art(&self) -> Option<&Path> {
        self.new_art_path
            .as_deref()
            .or(self.art_path.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    pub music: Option<MusicFile>,
    pub module: Module,
    pub tags: MusicTags,
    pub current_tag: Option<TagField>,
    pub awaiting_broadcast_until: Option<DateTime<Utc>>,
}

impl Session {
    /// Clears the file state and removes every file in the user's directory.
    /// A pending broadcast prompt survives the reset.
    pub async fn reset(&mut self, downloads_dir: &Path, user_id: u64) {
        let dir = files::user_dir(downloads_dir, user_id);
        if let Err(err) = files::delete_user_files(&dir).await {
            warn!("Could not clean {}: {}", dir.display(), err);
        }
        *self = Session {
            awaiting_broadcast_until: self.awaiting_broadcast_until.take(),
            ..Session::default()
        };
    }

    pub fn has_music(&self) -> bool {
        self.music.is_some()
    }

    pub fn select_module(&mut self, module: Module) {
        self.module = module;
        self.current_tag = None;
    }

    pub fn is_awaiting_broadcast(&self, now: DateTime<Utc>) -> bool {
        self.awaiting_broadcast_until
            .is_some_and(|deadline| now <= deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn music(dir: &Path) -> MusicFile {
        MusicFile {
            path: dir.join("song.mp3"),
            message_id: MessageId(7),
            duration_secs: 180,
            art_path: Some(dir.join("song.mp3.jpg")),
            new_art_path: None,
        }
    }

    #[test]
    fn numeric_tags_accept_digits_only() {
        let mut tags = MusicTags::default();
        assert!(!tags.set(TagField::Year, "2021"));
        assert_eq!(tags.year, "2021");
        assert!(tags.set(TagField::TrackNumber, "three"));
        assert_eq!(tags.track_number, "0");
        assert!(!tags.set(TagField::Title, "  Hello  "));
        assert_eq!(tags.title, "Hello");
    }

    #[test]
    fn new_art_takes_precedence() {
        let dir = Path::new("/tmp/x");
        let mut file = music(dir);
        assert_eq!(file.current_art(), Some(dir.join("song.mp3.jpg").as_path()));
        file.new_art_path = Some(dir.join("cover.jpg"));
        assert_eq!(file.current_art(), Some(dir.join("cover.jpg").as_path()));
    }

    #[tokio::test]
    async fn reset_clears_files_and_keeps_broadcast_prompt() {
        let root = tempfile::tempdir().unwrap();
        let dir = files::create_user_dir(root.path(), 42).await.unwrap();
        tokio::fs::write(dir.join("song.mp3"), b"data").await.unwrap();

        let deadline = Utc::now() + Duration::seconds(10);
        let mut session = Session {
            music: Some(music(&dir)),
            module: Module::Cutter,
            current_tag: Some(TagField::Album),
            awaiting_broadcast_until: Some(deadline),
            ..Session::default()
        };

        session.reset(root.path(), 42).await;

        assert!(session.music.is_none());
        assert_eq!(session.module, Module::None);
        assert!(session.current_tag.is_none());
        assert_eq!(session.awaiting_broadcast_until, Some(deadline));
        assert!(!dir.join("song.mp3").exists());
    }

    #[test]
    fn broadcast_prompt_expires() {
        let now = Utc::now();
        let session = Session {
            awaiting_broadcast_until: Some(now - Duration::seconds(1)),
            ..Session::default()
        };
        assert!(!session.is_awaiting_broadcast(now));
        assert!(!Session::default().is_awaiting_broadcast(now));
    }
}
