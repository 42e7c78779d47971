use log::info;
use thiserror::Error;

use super::general::{apply_tags, output_path, send_audio_result, source_extension};
use super::Ctx;
use crate::error::Result;
use crate::format::{normalize_digits, seconds_to_mm_ss};
use crate::keyboards;
use crate::session::{Module, Session};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    #[error("malformed range")]
    Malformed,
    #[error("range is out of the file duration")]
    OutOfRange,
    #[error("range does not end after it starts")]
    StartNotBeforeEnd,
}

impl RangeError {
    fn message_key(self) -> &'static str {
        match self {
            RangeError::Malformed => "errMalformedRange",
            RangeError::OutOfRange => "errOutOfRange",
            RangeError::StartNotBeforeEnd => "errBeginningPointIsGreater",
        }
    }
}

fn number(part: &str) -> std::result::Result<u32, RangeError> {
    if part.is_empty() {
        return Ok(0);
    }
    if !part.chars().all(|c| c.is_ascii_digit()) {
        return Err(RangeError::Malformed);
    }
    part.parse().map_err(|_| RangeError::Malformed)
}

/// `mm:ss`; a part without a colon counts as minutes.
fn minutes_seconds(part: &str) -> std::result::Result<u32, RangeError> {
    let (minutes, seconds) = part.split_once(':').unwrap_or((part, ""));
    number(minutes)?
        .checked_mul(60)
        .and_then(|m| m.checked_add(number(seconds).ok()?))
        .ok_or(RangeError::Malformed)
}

/// Parses `ss-ss` or `mm:ss-mm:ss` into start and end seconds, ignoring
/// spaces, and checks it against `duration_secs`.
pub fn parse_cutting_range(
    text: &str,
    duration_secs: u32,
) -> std::result::Result<(u32, u32), RangeError> {
    let text: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let (start, end) = text.split_once('-').ok_or(RangeError::Malformed)?;

    let (start, end) = if text.contains(':') {
        (minutes_seconds(start)?, minutes_seconds(end)?)
    } else {
        if start.is_empty() || end.is_empty() {
            return Err(RangeError::Malformed);
        }
        (number(start)?, number(end)?)
    };

    if start > duration_secs || end > duration_secs {
        return Err(RangeError::OutOfRange);
    }
    if start >= end {
        return Err(RangeError::StartNotBeforeEnd);
    }
    Ok((start, end))
}

pub async fn show_help(ctx: &Ctx, session: &mut Session) -> Result<()> {
    let Some(music) = &session.music else {
        return ctx.default_message().await;
    };
    let duration = seconds_to_mm_ss(i64::from(music.duration_secs));

    session.select_module(Module::Cutter);
    ctx.send_with(
        ctx.t_args("musicCutterHelp", &[("duration", &duration)]),
        keyboards::back(ctx.lang),
    )
    .await?;
    Ok(())
}

pub async fn handle_range(ctx: &Ctx, session: &mut Session, text: &str) -> Result<()> {
    let Some(music) = session.music.clone() else {
        return ctx.default_message().await;
    };

    let (start, end) = match parse_cutting_range(&normalize_digits(text), music.duration_secs) {
        Ok(range) => range,
        Err(err) => {
            let duration = seconds_to_mm_ss(i64::from(music.duration_secs));
            ctx.send(ctx.t_args(err.message_key(), &[("duration", &duration)]))
                .await?;
            return show_help(ctx, session).await;
        }
    };

    let out = output_path(&music, "cut", &source_extension(&music));
    if let Err(err) = ctx.app.ffmpeg.cut(&music.path, start, end - start, &out).await {
        return ctx.fail(session, "errOnConverting", &err).await;
    }
    if let Err(err) = apply_tags(ctx, session, &out).await {
        return ctx.fail(session, "errOnUpdatingTags", &err).await;
    }

    info!("User {} cut {}-{}", ctx.user_id, start, end);
    let caption = ctx.t_args(
        "fromTo",
        &[
            ("from", &seconds_to_mm_ss(i64::from(start))),
            ("to", &seconds_to_mm_ss(i64::from(end))),
        ],
    );
    send_audio_result(ctx, session, &out, &caption).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_seconds_and_minutes() {
        assert_eq!(parse_cutting_range("75-120", 200), Ok((75, 120)));
        assert_eq!(parse_cutting_range(" 0:10 - 2:30 ", 200), Ok((10, 150)));
        assert_eq!(parse_cutting_range("00:05-01:00", 200), Ok((5, 60)));
        assert_eq!(parse_cutting_range(":5-1:", 200), Ok((5, 60)));
    }

    #[test]
    fn rejects_malformed_ranges() {
        assert_eq!(parse_cutting_range("75", 200), Err(RangeError::Malformed));
        assert_eq!(parse_cutting_range("a-b", 200), Err(RangeError::Malformed));
        assert_eq!(parse_cutting_range("-5-10", 200), Err(RangeError::Malformed));
        assert_eq!(parse_cutting_range("1:x-2:00", 200), Err(RangeError::Malformed));
    }

    #[test]
    fn checks_bounds_and_order() {
        assert_eq!(parse_cutting_range("10-250", 200), Err(RangeError::OutOfRange));
        assert_eq!(parse_cutting_range("4:00-4:10", 200), Err(RangeError::OutOfRange));
        assert_eq!(parse_cutting_range("120-75", 200), Err(RangeError::StartNotBeforeEnd));
        assert_eq!(parse_cutting_range("60-60", 200), Err(RangeError::StartNotBeforeEnd));
        assert_eq!(parse_cutting_range("0-200", 200), Ok((0, 200)));
    }
}
