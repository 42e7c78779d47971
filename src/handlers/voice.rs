use log::info;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, ParseMode, ReplyParameters};

use super::general::output_path;
use super::Ctx;
use crate::error::{BotError, Result};
use crate::keyboards;
use crate::session::{Module, Session};

pub async fn convert(ctx: &Ctx, session: &mut Session) -> Result<()> {
    let Some(music) = session.music.clone() else {
        return ctx.default_message().await;
    };
    session.select_module(Module::VoiceConverter);
    ctx.action(ChatAction::RecordVoice).await;

    let out = output_path(&music, "voice", "ogg");
    if let Err(err) = ctx.app.ffmpeg.to_voice(&music.path, &out).await {
        return ctx.fail(session, "errOnConverting", &err).await;
    }

    ctx.action(ChatAction::UploadVoice).await;
    let sent = ctx
        .bot
        .send_voice(ctx.msg.chat.id, InputFile::file(&out))
        .caption(ctx.with_signature(""))
        .parse_mode(ParseMode::Html)
        .reply_parameters(ReplyParameters::new(music.message_id).allow_sending_without_reply())
        .reply_markup(keyboards::start_over(ctx.lang))
        .await;
    if let Err(err) = sent {
        return ctx.fail(session, "errOnUploading", &BotError::from(err)).await;
    }

    info!("Sent voice message to {}", ctx.user_id);
    ctx.reset(session).await;
    Ok(())
}
