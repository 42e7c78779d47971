use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::session::MusicTags;

const KNOWN_EXTENSIONS: [&str; 8] = ["mp3", "ogg", "oga", "flac", "wav", "m4a", "aac", "opus"];

pub fn user_dir(root: &Path, user_id: u64) -> PathBuf {
    root.join(user_id.to_string())
}

pub async fn create_user_dir(root: &Path, user_id: u64) -> Result<PathBuf> {
    let dir = user_dir(root, user_id);
    tokio::fs::create_dir_all(&dir).await?;
    Ok(dir)
}

/// Removes every file in `dir`. A missing directory is not an error.
pub async fn delete_user_files(dir: &Path) -> Result<()> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            delete_file(&entry.path()).await?;
        }
    }
    Ok(())
}

pub async fn delete_file(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirStats {
    pub files: u64,
    pub bytes: u64,
}

/// Counts files and their sizes under `dir`, recursively.
pub async fn dir_stats(dir: &Path) -> Result<DirStats> {
    let mut stats = DirStats::default();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => continue,
            Err(err) => return Err(err.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                pending.push(entry.path());
            } else {
                stats.files += 1;
                stats.bytes += metadata.len();
            }
        }
    }
    Ok(stats)
}

/// Picks a file extension from the MIME type first, then from the file name.
pub fn audio_extension(mime: Option<&str>, file_name: Option<&str>) -> Option<String> {
    if let Some(mime) = mime.map(str::to_ascii_lowercase) {
        let from_mime = if mime.contains("mpeg") || mime.contains("mp3") {
            Some("mp3")
        } else if mime.contains("ogg") {
            Some("ogg")
        } else if mime.contains("flac") {
            Some("flac")
        } else if mime.contains("wav") {
            Some("wav")
        } else if mime.contains("aac") || mime.contains("mp4") || mime.contains("m4a") {
            Some("m4a")
        } else {
            None
        };
        if let Some(ext) = from_mime {
            return Some(ext.to_string());
        }
    }

    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| KNOWN_EXTENSIONS.contains(&ext.as_str()))
}

/// `"Artist - Title"` with `Unknown` in place of empty tags.
pub fn output_file_name(tags: &MusicTags, extension: &str) -> String {
    let or_unknown = |value: &str| {
        let value = value.trim();
        if value.is_empty() {
            "Unknown".to_string()
        } else {
            value.replace(['/', '\\'], "-")
        }
    };
    format!(
        "{} - {}.{}",
        or_unknown(&tags.artist),
        or_unknown(&tags.title),
        extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_prefers_mime() {
        assert_eq!(audio_extension(Some("audio/mpeg"), Some("x.flac")).as_deref(), Some("mp3"));
        assert_eq!(audio_extension(Some("audio/x-flac"), None).as_deref(), Some("flac"));
        assert_eq!(audio_extension(Some("audio/mp4"), None).as_deref(), Some("m4a"));
        assert_eq!(audio_extension(Some("audio/x-wav"), None).as_deref(), Some("wav"));
    }

    #[test]
    fn extension_falls_back_to_file_name() {
        assert_eq!(audio_extension(Some("application/octet-stream"), Some("Song.OPUS")).as_deref(), Some("opus"));
        assert_eq!(audio_extension(None, Some("archive.zip")), None);
        assert_eq!(audio_extension(None, None), None);
    }

    #[test]
    fn output_name_uses_unknown_fallback() {
        let mut tags = MusicTags::default();
        assert_eq!(output_file_name(&tags, "mp3"), "Unknown - Unknown.mp3");
        tags.artist = "AC/DC".into();
        tags.title = "Thunderstruck".into();
        assert_eq!(output_file_name(&tags, "mp3"), "AC-DC - Thunderstruck.mp3");
    }

    #[tokio::test]
    async fn user_files_are_deleted_and_counted() {
        let root = tempfile::tempdir().unwrap();
        let dir = create_user_dir(root.path(), 1).await.unwrap();
        tokio::fs::write(dir.join("a.mp3"), vec![0u8; 10]).await.unwrap();
        tokio::fs::write(dir.join("a.jpg"), vec![0u8; 5]).await.unwrap();

        let stats = dir_stats(root.path()).await.unwrap();
        assert_eq!(stats, DirStats { files: 2, bytes: 15 });

        delete_user_files(&dir).await.unwrap();
        assert_eq!(dir_stats(root.path()).await.unwrap().files, 0);

        delete_user_files(&root.path().join("missing")).await.unwrap();
        delete_file(&dir.join("gone.mp3")).await.unwrap();
    }
}
