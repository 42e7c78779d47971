//! Owner and admin commands. Replies here are English only; a non-admin
//! sending one of these commands gets no answer.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use log::{error, info};
use teloxide::prelude::*;
use teloxide::types::UserId;
use teloxide::utils::html;

use super::Ctx;
use crate::broadcast;
use crate::error::Result;
use crate::files::{self, DirStats};
use crate::format::pretty_size;
use crate::i18n::Language;
use crate::session::Session;
use crate::store::UserRecord;

const USERS_PER_MESSAGE: usize = 90;

pub fn parse_user_id(arg: &str) -> Option<u64> {
    arg.trim().parse().ok().filter(|id| *id > 0)
}

/// `<user id> <days>`; zero days revokes premium.
pub fn parse_premium_args(arg: &str) -> Option<(u64, i64)> {
    let mut parts = arg.split_whitespace();
    let user_id = parse_user_id(parts.next()?)?;
    let days = parts.next()?.parse().ok().filter(|d: &i64| *d >= 0)?;
    parts.next().is_none().then_some((user_id, days))
}

pub fn stats_text(by_language: &BTreeMap<String, u64>, downloads: DirStats) -> String {
    let total: u64 = by_language.values().sum();
    let mut text = format!("👥 {total} users are using this bot!\n\n");
    for lang in Language::ALL {
        let count = by_language.get(lang.code()).copied().unwrap_or(0);
        text.push_str(&format!("{} users: {count}\n", lang.button_label()));
    }
    text.push_str(&format!(
        "\n📁 There are {} files on the filesystem, occupying {}",
        downloads.files,
        pretty_size(downloads.bytes)
    ));
    text
}

/// One message per [`USERS_PER_MESSAGE`] users, each with a page header.
pub fn user_pages(users: &[UserRecord]) -> Vec<String> {
    let chunks: Vec<&[UserRecord]> = users.chunks(USERS_PER_MESSAGE).collect();
    let pages = chunks.len();

    chunks
        .into_iter()
        .enumerate()
        .map(|(index, chunk)| {
            let lines: Vec<String> = chunk
                .iter()
                .map(|user| {
                    let name = user
                        .username
                        .as_deref()
                        .map(|name| format!("@{}", html::escape(name)))
                        .unwrap_or_else(|| "-".to_string());
                    format!("{}: {name}: {}", user.user_id, user.number_of_files_sent)
                })
                .collect();
            format!(
                "👥 List of users ({} total) - Page {}/{pages}:\n\n{}",
                users.len(),
                index + 1,
                lines.join("\n")
            )
        })
        .collect()
}

fn is_admin(ctx: &Ctx) -> Result<bool> {
    ctx.app.store.is_admin(ctx.user_id)
}

fn is_owner(ctx: &Ctx) -> Result<bool> {
    ctx.app.store.is_owner(ctx.user_id)
}

pub async fn add_admin(ctx: &Ctx, arg: &str) -> Result<()> {
    if !is_owner(ctx)? {
        return Ok(());
    }
    let Some(user_id) = parse_user_id(arg) else {
        ctx.send(format!("The user ID <code>{}</code> is malformed", html::escape(arg)))
            .await?;
        return Ok(());
    };

    let text = if ctx.app.store.add_admin(user_id)? {
        info!("{} made {} an admin", ctx.user_id, user_id);
        format!("User {user_id} has been added as admins.")
    } else {
        format!("User {user_id} is already an admin.")
    };
    ctx.send(text).await?;
    Ok(())
}

pub async fn del_admin(ctx: &Ctx, arg: &str) -> Result<()> {
    if !is_owner(ctx)? {
        return Ok(());
    }
    let Some(user_id) = parse_user_id(arg) else {
        ctx.send(format!("The user ID <code>{}</code> is malformed", html::escape(arg)))
            .await?;
        return Ok(());
    };

    let text = if ctx.app.store.remove_admin(user_id)? {
        info!("{} removed admin {}", ctx.user_id, user_id);
        format!("User {user_id} is no longer an admin")
    } else {
        format!("User {user_id} is not an admin")
    };
    ctx.send(text).await?;
    Ok(())
}

pub async fn stats(ctx: &Ctx) -> Result<()> {
    if !is_admin(ctx)? {
        return Ok(());
    }
    let by_language = ctx.app.store.count_by_language()?;
    let downloads = files::dir_stats(&ctx.app.config.downloads_dir).await?;
    ctx.send(stats_text(&by_language, downloads)).await?;
    Ok(())
}

pub async fn list_users(ctx: &Ctx, arg: &str) -> Result<()> {
    if !is_admin(ctx)? {
        return Ok(());
    }
    let limit = if arg.is_empty() {
        None
    } else {
        match arg.parse::<usize>() {
            Ok(limit) if limit > 0 => Some(limit),
            _ => {
                ctx.send(format!("The limit <code>{}</code> is malformed", html::escape(arg)))
                    .await?;
                return Ok(());
            }
        }
    };

    let users = ctx.app.store.list_users(limit)?;
    if users.is_empty() {
        ctx.send("👥 There are no users yet.").await?;
        return Ok(());
    }
    for page in user_pages(&users) {
        ctx.send(page).await?;
    }
    Ok(())
}

pub async fn premium(ctx: &Ctx, arg: &str) -> Result<()> {
    if !is_owner(ctx)? {
        return Ok(());
    }
    let Some((user_id, days)) = parse_premium_args(arg) else {
        ctx.send("Usage: <code>/premium &lt;user id&gt; &lt;days&gt;</code>")
            .await?;
        return Ok(());
    };

    let expires_at = (days > 0).then(|| Utc::now() + TimeDelta::days(days));
    if !ctx.app.store.set_premium(user_id, expires_at)? {
        ctx.send(format!("User {user_id} was not found.")).await?;
        return Ok(());
    }

    let text = match expires_at {
        Some(expires) => format!(
            "⭐️ Premium for {user_id} is active until {}.",
            expires.format("%Y-%m-%d %H:%M UTC")
        ),
        None => format!("Premium for {user_id} was revoked."),
    };
    info!("{} set premium of {} to {:?}", ctx.user_id, user_id, expires_at);
    ctx.send(text).await?;
    Ok(())
}

pub async fn send_to_all(ctx: &Ctx, session: &mut Session) -> Result<()> {
    if !is_admin(ctx)? {
        return Ok(());
    }
    if ctx.app.broadcaster.is_running() {
        ctx.send("ℹ️ A broadcast is already running. Use /cancel_sendtoall first.")
            .await?;
        return Ok(());
    }
    let timeout = TimeDelta::from_std(ctx.app.config.broadcast_prompt_timeout)
        .unwrap_or(TimeDelta::seconds(10));
    session.awaiting_broadcast_until = Some(Utc::now() + timeout);

    ctx.send("✅ Now send the message you want to send to all users.\n❌ Use /cancel_sendtoall to cancel.")
        .await?;
    Ok(())
}

pub async fn cancel_send_to_all(ctx: &Ctx, session: &mut Session) -> Result<()> {
    if !is_admin(ctx)? {
        return Ok(());
    }
    session.awaiting_broadcast_until = None;

    let text = if ctx.app.broadcaster.cancel() {
        info!("{} cancelled the broadcast", ctx.user_id);
        "❌ Broadcasting canceled. No further messages will be sent."
    } else {
        "ℹ️ No active broadcast to cancel."
    };
    ctx.send(text).await?;
    Ok(())
}

/// Copies the current message to every user in the background.
pub async fn broadcast_message(ctx: &Ctx, session: &mut Session) -> Result<()> {
    session.awaiting_broadcast_until = None;

    let Some(token) = ctx.app.broadcaster.begin() else {
        ctx.send("ℹ️ A broadcast is already running. Use /cancel_sendtoall first.")
            .await?;
        return Ok(());
    };

    let targets: Vec<u64> = match ctx.app.store.list_users(None) {
        Ok(users) => users.into_iter().map(|user| user.user_id).collect(),
        Err(err) => {
            ctx.app.broadcaster.finish(&token);
            return Err(err);
        }
    };

    let app = Arc::clone(&ctx.app);
    let bot = ctx.bot.clone();
    let admin_chat = ctx.msg.chat.id;
    let message_id = ctx.msg.id;

    tokio::spawn(async move {
        let report = broadcast::run(targets, app.config.broadcast_delay, token.clone(), |user_id| {
            let bot = bot.clone();
            async move {
                bot.copy_message(ChatId::from(UserId(user_id)), admin_chat, message_id)
                    .disable_notification(true)
                    .await
                    .map(|_| ())
            }
        })
        .await;

        app.broadcaster.finish(&token);
        if let Err(err) = bot.send_message(admin_chat, report.summary()).await {
            error!("Could not send broadcast summary: {}", err);
        }
    });

    ctx.send("🚀 Broadcasting started in the background.").await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(user_id: u64, username: Option<&str>, files: u64) -> UserRecord {
        let now = Utc::now();
        UserRecord {
            user_id,
            username: username.map(str::to_string),
            language: Language::En,
            number_of_files_sent: files,
            premium_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn user_ids_must_be_positive_numbers() {
        assert_eq!(parse_user_id(" 12345 "), Some(12345));
        assert_eq!(parse_user_id("0"), None);
        assert_eq!(parse_user_id("@someone"), None);
        assert_eq!(parse_user_id(""), None);
    }

    #[test]
    fn premium_takes_id_and_days() {
        assert_eq!(parse_premium_args("42 30"), Some((42, 30)));
        assert_eq!(parse_premium_args("42 0"), Some((42, 0)));
        assert_eq!(parse_premium_args("42"), None);
        assert_eq!(parse_premium_args("42 -1"), None);
        assert_eq!(parse_premium_args("42 30 extra"), None);
    }

    #[test]
    fn users_are_paged_by_ninety() {
        let users: Vec<UserRecord> = (1..=95)
            .map(|id| user(id, (id == 1).then_some("first_one"), id * 2))
            .collect();
        let pages = user_pages(&users);
        assert_eq!(pages.len(), 2);
        assert!(pages[0].starts_with("👥 List of users (95 total) - Page 1/2:\n\n1: @first_one: 2\n2: -: 4"));
        assert!(pages[1].starts_with("👥 List of users (95 total) - Page 2/2:\n\n91: -: 182"));
    }

    #[test]
    fn stats_cover_every_language() {
        let counts = BTreeMap::from([("en".to_string(), 3), ("fa".to_string(), 2)]);
        let text = stats_text(&counts, DirStats { files: 4, bytes: 3 * 1024 * 1024 });
        assert!(text.starts_with("👥 5 users are using this bot!"));
        assert!(text.contains("🇮🇷 فارسی users: 2"));
        assert!(text.contains("🇸🇦 العربية users: 0"));
        assert!(text.ends_with("There are 4 files on the filesystem, occupying 3 MB"));
    }
}
