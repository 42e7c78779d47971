use log::info;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, ParseMode, ReplyMarkup};

use super::general::{apply_tags, download, send_audio_result};
use super::Ctx;
use crate::error::Result;
use crate::files;
use crate::format::{music_info, normalize_digits};
use crate::i18n::Button;
use crate::keyboards;
use crate::session::{Module, Session, TagField};

pub fn field_for(button: Button) -> Option<TagField> {
    Some(match button {
        Button::Artist => TagField::Artist,
        Button::Title => TagField::Title,
        Button::Album => TagField::Album,
        Button::Genre => TagField::Genre,
        Button::Year => TagField::Year,
        Button::DiskNumber => TagField::DiskNumber,
        Button::TrackNumber => TagField::TrackNumber,
        Button::AlbumArt => TagField::AlbumArt,
        _ => return None,
    })
}

/// Current tags as text, or as a photo caption when there is a cover.
async fn send_tags(ctx: &Ctx, session: &Session, markup: impl Into<ReplyMarkup>) -> Result<()> {
    let text = ctx.with_signature(&music_info(ctx.lang, &session.tags));
    let art = session
        .music
        .as_ref()
        .and_then(|m| m.current_art())
        .filter(|art| art.exists());

    match art {
        Some(art) => {
            ctx.action(ChatAction::UploadPhoto).await;
            ctx.bot
                .send_photo(ctx.msg.chat.id, InputFile::file(art))
                .caption(text)
                .parse_mode(ParseMode::Html)
                .reply_markup(markup)
                .await?;
        }
        None => {
            ctx.send_with(text, markup).await?;
        }
    }
    Ok(())
}

fn saved_message(ctx: &Ctx, done_key: &str) -> String {
    format!(
        "{}\n{}\n{}",
        ctx.t(done_key),
        ctx.t("clickPreviewMessage"),
        ctx.t("clickDoneMessage")
    )
}

pub async fn show(ctx: &Ctx, session: &mut Session) -> Result<()> {
    if !session.has_music() {
        return ctx.default_message().await;
    }
    session.select_module(Module::TagEditor);
    send_tags(ctx, session, keyboards::tag_editor(ctx.lang)).await?;
    ctx.send(ctx.t("askWhichTag")).await?;
    Ok(())
}

pub async fn ask_for_tag(ctx: &Ctx, session: &mut Session, button: Button) -> Result<()> {
    if !session.has_music() {
        return ctx.default_message().await;
    }
    let Some(field) = field_for(button) else {
        return Ok(());
    };

    session.module = Module::TagEditor;
    session.current_tag = Some(field);
    ctx.send_with(ctx.t(field.prompt_key()), keyboards::back(ctx.lang))
        .await?;
    Ok(())
}

pub async fn handle_text(ctx: &Ctx, session: &mut Session, text: &str) -> Result<()> {
    let Some(field) = session.current_tag else {
        return Ok(());
    };
    if field == TagField::AlbumArt {
        ctx.send_with(ctx.t("askForAlbumArt"), keyboards::back(ctx.lang))
            .await?;
        return Ok(());
    }

    let fell_back = session.tags.set(field, &normalize_digits(text));
    session.current_tag = None;

    if fell_back {
        ctx.send(ctx.t("expectedNumberMessage")).await?;
    }
    ctx.send_with(saved_message(ctx, "done"), keyboards::tag_editor(ctx.lang))
        .await?;
    Ok(())
}

pub async fn handle_photo(ctx: &Ctx, session: &mut Session) -> Result<()> {
    if !session.has_music() {
        return ctx.default_message().await;
    }
    if session.current_tag != Some(TagField::AlbumArt) {
        if session.module != Module::TagEditor {
            return ctx.module_selector(session).await;
        }
        ctx.send_with(ctx.t("askWhichTag"), keyboards::tag_editor(ctx.lang))
            .await?;
        return Ok(());
    }

    let Some(photo) = ctx
        .msg
        .photo()
        .and_then(|sizes| sizes.iter().max_by_key(|p| p.width * p.height))
    else {
        return Ok(());
    };

    let dir = ctx.user_dir();
    let path = dir.join(format!("art-{}.jpg", ctx.msg.id.0));
    if let Err(err) = download(&ctx.bot, &photo.file.id, &path).await {
        return ctx.fail(session, "errOnDownloadPhotoMessage", &err).await;
    }

    if let Some(music) = session.music.as_mut() {
        if let Some(previous) = music.new_art_path.replace(path) {
            files::delete_file(&previous).await?;
        }
    }
    session.current_tag = None;
    info!("User {} uploaded new album art", ctx.user_id);

    ctx.send_with(
        saved_message(ctx, "albumArtChanged"),
        keyboards::tag_editor(ctx.lang),
    )
    .await?;
    Ok(())
}

pub async fn remove_art(ctx: &Ctx, session: &mut Session) -> Result<()> {
    let Some(music) = session.music.as_mut() else {
        return ctx.default_message().await;
    };

    let path = music.path.clone();
    let old = [music.art_path.take(), music.new_art_path.take()];
    if let Err(err) = ctx.app.ffmpeg.remove_art(&path).await {
        return ctx.fail(session, "errOnUpdatingTags", &err).await;
    }
    for art in old.iter().flatten() {
        files::delete_file(art).await?;
    }

    session.module = Module::TagEditor;
    session.current_tag = None;
    ctx.send_with(
        saved_message(ctx, "albumArtRemoved"),
        keyboards::tag_editor(ctx.lang),
    )
    .await?;
    Ok(())
}

pub async fn preview(ctx: &Ctx, session: &mut Session) -> Result<()> {
    if !session.has_music() {
        return ctx.default_message().await;
    }
    send_tags(ctx, session, keyboards::tag_editor(ctx.lang)).await
}

pub async fn finish(ctx: &Ctx, session: &mut Session) -> Result<()> {
    let Some(music) = session.music.clone() else {
        return ctx.default_message().await;
    };

    ctx.action(ChatAction::UploadVoice).await;
    if let Err(err) = apply_tags(ctx, session, &music.path).await {
        return ctx.fail(session, "errOnUpdatingTags", &err).await;
    }

    info!("User {} saved tags", ctx.user_id);
    send_audio_result(ctx, session, &music.path, "").await
}
