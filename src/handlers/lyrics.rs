use chrono::Utc;
use log::info;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, ReplyParameters};

use super::Ctx;
use crate::error::Result;
use crate::keyboards;
use crate::session::{Module, Session};
use crate::transcribe::{chunk_text, insert_newlines, lyrics_language_name, MAX_MESSAGE_LEN};

/// Above this many messages the lyrics go out as a text file.
const MAX_PARTS: usize = 6;

#[derive(Debug, PartialEq)]
pub enum LyricsReply {
    Messages(Vec<String>),
    Document(String),
}

/// Decides how `text` is delivered: one message, a few, or a file.
pub fn plan_reply(text: &str) -> LyricsReply {
    if text.chars().count() <= MAX_MESSAGE_LEN {
        return LyricsReply::Messages(vec![text.to_string()]);
    }
    let parts = chunk_text(text, MAX_MESSAGE_LEN);
    if parts.len() > MAX_PARTS {
        LyricsReply::Document(text.to_string())
    } else {
        LyricsReply::Messages(parts)
    }
}

pub async fn show_languages(ctx: &Ctx, session: &mut Session) -> Result<()> {
    if !ctx.app.config.lyrics_enabled() {
        return ctx.module_selector(session).await;
    }
    if !session.has_music() {
        return ctx.default_message().await;
    }
    session.select_module(Module::Lyrics);
    ctx.send_with(
        ctx.t("lyricsSelectLanguageHelp"),
        keyboards::lyrics_languages(ctx.lang),
    )
    .await?;
    Ok(())
}

pub async fn transcribe(ctx: &Ctx, session: &mut Session, code: &str) -> Result<()> {
    let Some(transcriber) = &ctx.app.transcriber else {
        return ctx.module_selector(session).await;
    };
    let Some(music) = session.music.clone() else {
        return ctx.default_message().await;
    };

    let premium = ctx
        .app
        .store
        .get(ctx.user_id)?
        .is_some_and(|user| user.has_premium(Utc::now()));
    if !premium {
        ctx.send(ctx.t("premiumFeatureMessageAdmin")).await?;
        return Ok(());
    }

    ctx.action(ChatAction::Typing).await;
    let text = match transcriber.transcribe(&music.path, code).await {
        Ok(text) => insert_newlines(text.trim()),
        Err(err) => return ctx.fail(session, "errOnTranscribing", &err).await,
    };
    info!("Transcribed lyrics for {} ({} chars)", ctx.user_id, text.len());

    let chosen = format!(
        "{}: {} ({code})",
        ctx.t("lyricsLanguageChosen"),
        lyrics_language_name(code).unwrap_or(code)
    );
    let reply = if text.is_empty() {
        chosen.clone()
    } else {
        format!("{chosen}\n\n{text}")
    };

    match plan_reply(&reply) {
        LyricsReply::Messages(parts) => {
            let last = parts.len().saturating_sub(1);
            for (index, part) in parts.into_iter().enumerate() {
                let request = ctx
                    .bot
                    .send_message(ctx.msg.chat.id, part)
                    .reply_parameters(ReplyParameters::new(ctx.msg.id));
                if index == last {
                    request.reply_markup(keyboards::start_over(ctx.lang)).await?;
                } else {
                    request.await?;
                }
            }
        }
        LyricsReply::Document(text) => {
            ctx.action(ChatAction::UploadDocument).await;
            ctx.bot
                .send_document(
                    ctx.msg.chat.id,
                    InputFile::memory(text.into_bytes()).file_name("lyrics.txt"),
                )
                .caption(chosen)
                .reply_parameters(ReplyParameters::new(ctx.msg.id))
                .reply_markup(keyboards::start_over(ctx.lang))
                .await?;
        }
    }

    ctx.reset(session).await;
    Ok(())
}
