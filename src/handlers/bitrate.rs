use log::info;

use super::general::{apply_tags, output_path, send_audio_result};
use super::Ctx;
use crate::error::Result;
use crate::keyboards::{self, BITRATES};
use crate::session::{Module, Session};

/// `"192 kb/s"` to `192`, for the bitrates offered on the keyboard only.
pub fn parse_bitrate(label: &str) -> Option<u32> {
    let kbps = label.split_whitespace().next()?.parse().ok()?;
    BITRATES.contains(&kbps).then_some(kbps)
}

pub async fn show_keyboard(ctx: &Ctx, session: &mut Session) -> Result<()> {
    if !session.has_music() {
        return ctx.default_message().await;
    }
    session.select_module(Module::BitrateChanger);
    ctx.send_with(
        ctx.t("bitrateChangerHelp"),
        keyboards::bitrate_selector(ctx.lang),
    )
    .await?;
    Ok(())
}

pub async fn change_bitrate(ctx: &Ctx, session: &mut Session, label: &str) -> Result<()> {
    let Some(music) = session.music.clone() else {
        return ctx.default_message().await;
    };
    let Some(kbps) = parse_bitrate(label) else {
        return show_keyboard(ctx, session).await;
    };

    let out = output_path(&music, &format!("{kbps}kbps"), "mp3");
    if let Err(err) = ctx.app.ffmpeg.change_bitrate(&music.path, kbps, &out).await {
        return ctx.fail(session, "errOnConverting", &err).await;
    }
    if let Err(err) = apply_tags(ctx, session, &out).await {
        return ctx.fail(session, "errOnUpdatingTags", &err).await;
    }

    info!("User {} changed bitrate to {}", ctx.user_id, kbps);
    send_audio_result(ctx, session, &out, &format!("🎙 {kbps} kb/s")).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_offered_bitrates_are_accepted() {
        assert_eq!(parse_bitrate("320 kb/s"), Some(320));
        assert_eq!(parse_bitrate("128 kb/s"), Some(128));
        assert_eq!(parse_bitrate("999 kb/s"), None);
        assert_eq!(parse_bitrate("kb/s"), None);
    }
}
