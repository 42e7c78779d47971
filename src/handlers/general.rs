use std::path::Path;

use log::{info, warn};
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, FileId, InputFile, KeyboardRemove, ParseMode, ReplyParameters};

use super::Ctx;
use crate::error::{BotError, Result};
use crate::files;
use crate::i18n::{self, Language};
use crate::keyboards;
use crate::media;
use crate::session::{Module, MusicFile, Session};

/// The Bot API refuses to serve larger downloads, whatever the duration.
const DOWNLOAD_MAX_BYTES: u32 = 20 * 1024 * 1024;

pub fn is_too_large(size_bytes: u32) -> bool {
    size_bytes > DOWNLOAD_MAX_BYTES
}

pub async fn download(bot: &Bot, file_id: &FileId, dst: &Path) -> Result<()> {
    let file = bot.get_file(file_id.clone()).await?;
    let mut out = tokio::fs::File::create(dst).await?;
    bot.download_file(&file.path, &mut out).await?;
    Ok(())
}

pub async fn start(ctx: &Ctx, session: &mut Session) -> Result<()> {
    ctx.reset(session).await;
    ctx.send_with(ctx.t("startMessage"), KeyboardRemove::new())
        .await?;
    show_language_selector(ctx).await
}

pub async fn start_over(ctx: &Ctx, session: &mut Session) -> Result<()> {
    ctx.reset(session).await;
    ctx.send_with(ctx.t("startOverMessage"), KeyboardRemove::new())
        .await?;
    Ok(())
}

/// The prompt is shown in every language since the user may not read the current one.
pub async fn show_language_selector(ctx: &Ctx) -> Result<()> {
    let text = Language::ALL
        .iter()
        .map(|lang| i18n::t(*lang, "chooseLanguage"))
        .collect::<Vec<_>>()
        .join("\n\n");
    ctx.send_with(text, keyboards::language_selector()).await?;
    Ok(())
}

pub async fn set_language(ctx: &Ctx, lang: Language) -> Result<()> {
    ctx.app.store.set_language(ctx.user_id, lang)?;
    info!("User {} switched language to {}", ctx.user_id, lang.code());

    ctx.send(i18n::t(lang, "languageChanged")).await?;
    ctx.send_with(i18n::t(lang, "startOverMessage"), KeyboardRemove::new())
        .await?;
    Ok(())
}

pub async fn help(ctx: &Ctx) -> Result<()> {
    ctx.send(ctx.t("helpMessage")).await?;
    Ok(())
}

pub async fn about(ctx: &Ctx) -> Result<()> {
    ctx.send(ctx.t("aboutMessage")).await?;
    Ok(())
}

pub async fn back(ctx: &Ctx, session: &mut Session) -> Result<()> {
    if !session.has_music() {
        return ctx.default_message().await;
    }
    ctx.module_selector(session).await
}

pub async fn ignore_file(ctx: &Ctx, session: &mut Session) -> Result<()> {
    ctx.reset(session).await;
    ctx.default_message().await
}

/// Free text that matched no button goes to whatever the user is doing.
pub async fn handle_responses(ctx: &Ctx, session: &mut Session, text: &str) -> Result<()> {
    if !session.has_music() {
        return ctx.default_message().await;
    }

    match session.module {
        Module::TagEditor => {
            ctx.send_with(ctx.t("askWhichTag"), keyboards::tag_editor(ctx.lang))
                .await?;
            Ok(())
        }
        Module::Cutter => super::cutter::handle_range(ctx, session, text).await,
        Module::Lyrics => {
            ctx.send_with(
                ctx.t("invalidLanguageSelection"),
                keyboards::lyrics_languages(ctx.lang),
            )
            .await?;
            Ok(())
        }
        Module::BitrateChanger => super::bitrate::show_keyboard(ctx, session).await,
        Module::None | Module::VoiceConverter => ctx.module_selector(session).await,
    }
}

pub async fn handle_audio(ctx: &Ctx, session: &mut Session) -> Result<()> {
    let Some(audio) = ctx.msg.audio() else {
        return Ok(());
    };

    ctx.reset(session).await;
    if let Err(err) = ctx.app.store.increment_files_sent(ctx.user_id) {
        warn!("Could not count file for {}: {}", ctx.user_id, err);
    }

    if is_too_large(audio.file.size) {
        info!(
            "Rejected {} byte file from {}",
            audio.file.size, ctx.user_id
        );
        ctx.send_with(ctx.t("errTooLargeFile"), keyboards::start_over(ctx.lang))
            .await?;
        return Ok(());
    }

    ctx.action(ChatAction::Typing).await;

    let dir = match files::create_user_dir(&ctx.app.config.downloads_dir, ctx.user_id).await {
        Ok(dir) => dir,
        Err(err) => return ctx.fail(session, "errCreatingUserFolder", &err).await,
    };

    let extension = files::audio_extension(
        audio.mime_type.as_ref().map(|m| m.essence_str()),
        audio.file_name.as_deref(),
    )
    .unwrap_or_else(|| "mp3".to_string());
    let path = dir.join(format!("{}.{extension}", ctx.msg.id.0));

    if let Err(err) = download(&ctx.bot, &audio.file.id, &path).await {
        return ctx.fail(session, "errOnDownloadAudioMessage", &err).await;
    }

    let info = match ctx.app.ffmpeg.probe(&path).await {
        Ok(info) => info,
        Err(err) => return ctx.fail(session, "errOnReadingTags", &err).await,
    };

    let art = dir.join(format!("{}.jpg", ctx.msg.id.0));
    let art_path = if info.has_art {
        match ctx.app.ffmpeg.extract_art(&path, &art).await {
            Ok(()) => Some(art),
            Err(err) => {
                warn!("Could not extract album art for {}: {}", ctx.user_id, err);
                None
            }
        }
    } else if let Some(thumb) = &audio.thumbnail {
        match download(&ctx.bot, &thumb.file.id, &art).await {
            Ok(()) => Some(art),
            Err(err) => {
                warn!("Could not download thumbnail for {}: {}", ctx.user_id, err);
                None
            }
        }
    } else {
        None
    };

    let mut tags = info.tags;
    if tags.artist.is_empty() {
        tags.artist = audio.performer.clone().unwrap_or_default();
    }
    if tags.title.is_empty() {
        tags.title = audio.title.clone().unwrap_or_default();
    }

    let duration_secs = if info.duration_secs > 0 {
        info.duration_secs
    } else {
        audio.duration.seconds()
    };

    info!(
        "User {} uploaded {} ({}s)",
        ctx.user_id,
        path.display(),
        duration_secs
    );

    session.music = Some(MusicFile {
        path,
        message_id: ctx.msg.id,
        duration_secs,
        art_path,
        new_art_path: None,
    });
    session.tags = tags;

    ctx.module_selector(session).await
}

/// Uploads a processed file back as audio, replying to the original upload,
/// and resets the session.
pub async fn send_audio_result(
    ctx: &Ctx,
    session: &mut Session,
    path: &Path,
    caption: &str,
) -> Result<()> {
    let Some(music) = session.music.clone() else {
        return ctx.default_message().await;
    };

    ctx.action(ChatAction::UploadVoice).await;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp3")
        .to_string();
    let file_name = files::output_file_name(&session.tags, &extension);

    let mut request = ctx
        .bot
        .send_audio(ctx.msg.chat.id, InputFile::file(path).file_name(file_name))
        .caption(ctx.with_signature(caption))
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(music.message_id).allow_sending_without_reply())
        .reply_markup(keyboards::start_over(ctx.lang));

    if !session.tags.artist.is_empty() {
        request = request.performer(session.tags.artist.clone());
    }
    if !session.tags.title.is_empty() {
        request = request.title(session.tags.title.clone());
    }
    if let Some(art) = music.current_art() {
        let thumb = art.with_file_name("thumb.jpg");
        match ctx.app.ffmpeg.make_thumbnail(art, &thumb).await {
            Ok(()) => request = request.thumbnail(InputFile::file(thumb)),
            Err(err) => warn!("Could not make thumbnail for {}: {}", ctx.user_id, err),
        }
    }

    if let Err(err) = request.await {
        return ctx.fail(session, "errOnUploading", &BotError::from(err)).await;
    }

    info!("Sent {} to {}", path.display(), ctx.user_id);
    ctx.reset(session).await;
    Ok(())
}

/// Where a derived file for `music` is written: same directory, new stem.
pub fn output_path(music: &MusicFile, stem: &str, extension: &str) -> std::path::PathBuf {
    music.path.with_file_name(format!("{stem}.{extension}"))
}

/// Derived files keep the original container unless told otherwise.
pub fn source_extension(music: &MusicFile) -> String {
    music
        .path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp3")
        .to_string()
}

/// Writes the session's tags and cover onto `file` in place.
pub async fn apply_tags(ctx: &Ctx, session: &Session, file: &Path) -> Result<()> {
    let art = session.music.as_ref().and_then(|m| m.current_art());
    let tmp = media::sibling_temp(file);
    ctx.app
        .ffmpeg
        .write_tags(file, &session.tags, art, &tmp)
        .await?;
    tokio::fs::rename(&tmp, file).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use teloxide::types::MessageId;

    #[test]
    fn files_are_limited_by_download_size() {
        assert!(!is_too_large(8_000_000));
        assert!(!is_too_large(DOWNLOAD_MAX_BYTES));
        assert!(is_too_large(DOWNLOAD_MAX_BYTES + 1));
        assert!(is_too_large(49_000_000));
    }

    #[test]
    fn derived_files_sit_next_to_the_source() {
        let music = MusicFile {
            path: PathBuf::from("/dl/42/17.flac"),
            message_id: MessageId(17),
            duration_secs: 60,
            art_path: None,
            new_art_path: None,
        };
        assert_eq!(source_extension(&music), "flac");
        assert_eq!(
            output_path(&music, "cut", "flac"),
            PathBuf::from("/dl/42/cut.flac")
        );
    }
}
