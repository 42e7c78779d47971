//! Update routing. Commands go through [`Command`]; every other message is
//! matched against keyboard labels first and then handed to the module the
//! user is currently in.

pub mod admin;
pub mod bitrate;
pub mod general;
pub mod cutter;
pub mod donation;
pub mod lyrics;
pub mod tag_editor;
pub mod voice;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use lazy_regex::{lazy_regex, Lazy, Regex};
use log::{error, info, warn};
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::{HandlerExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{ChatAction, KeyboardRemove, ParseMode, ReplyMarkup, ReplyParameters};
use teloxide::utils::command::{BotCommands, ParseError};

use crate::error::{BotError, Result};
use crate::files;
use donation::DonationMethod;
use crate::i18n::{self, Button, Language};
use crate::keyboards;
use crate::session::{Module, Session};
use crate::transcribe;
use crate::AppState;

pub type BotDialogue = Dialogue<Session, InMemStorage<Session>>;

static BITRATE_RE: Lazy<Regex> = lazy_regex!(r"^\d{3}\s{1}kb/s$");

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "start the bot.")]
    Start,
    #[command(description = "start over with a new file.")]
    New,
    #[command(description = "change the bot language.")]
    Language,
    #[command(description = "show how to use the bot.")]
    Help,
    #[command(description = "about this bot.")]
    About,
    #[command(description = "preview your tag changes.")]
    Preview,
    #[command(description = "save your tag changes.")]
    Done,
    #[command(description = "support the bot.")]
    Donate,
    #[command(hide, parse_with = optional_arg)]
    AddAdmin(String),
    #[command(hide, parse_with = optional_arg)]
    DelAdmin(String),
    #[command(hide)]
    Stats,
    #[command(hide, parse_with = optional_arg)]
    ListUsers(String),
    #[command(hide)]
    SendToAll,
    #[command(hide, rename = "cancel_sendtoall")]
    CancelSendToAll,
    #[command(hide, parse_with = optional_arg)]
    Premium(String),
}

fn optional_arg(input: String) -> std::result::Result<(String,), ParseError> {
    Ok((input.trim().to_string(),))
}

/// One update's worth of context: who sent it, in which language, and the
/// shared application state.
pub struct Ctx {
    pub bot: Bot,
    pub msg: Message,
    pub app: Arc<AppState>,
    pub user_id: u64,
    pub lang: Language,
}

impl Ctx {
    /// Records the sender in the store. Updates without a sender are skipped.
    pub fn new(bot: Bot, msg: Message, app: Arc<AppState>) -> Option<Self> {
        let user = msg.from.as_ref()?;
        let user_id = user.id.0;
        let lang = match app.store.upsert(user_id, user.username.as_deref()) {
            Ok(record) => record.language,
            Err(err) => {
                error!("Could not save user {}: {}", user_id, err);
                Language::default()
            }
        };
        Some(Self {
            bot,
            msg,
            app,
            user_id,
            lang,
        })
    }

    pub fn t(&self, key: &str) -> String {
        i18n::t(self.lang, key)
    }

    pub fn t_args(&self, key: &str, args: &[(&str, &str)]) -> String {
        i18n::t_args(self.lang, key, args)
    }

    pub fn user_dir(&self) -> PathBuf {
        files::user_dir(&self.app.config.downloads_dir, self.user_id)
    }

    /// Appends the bot's `🆔 @name` line, if one is configured.
    pub fn with_signature(&self, text: &str) -> String {
        let suffix = self.app.config.caption_suffix();
        match (text.is_empty(), suffix.is_empty()) {
            (_, true) => text.to_string(),
            (true, false) => suffix,
            (false, false) => format!("{text}\n\n{suffix}"),
        }
    }

    pub async fn send(&self, text: impl Into<String>) -> Result<Message> {
        Ok(self
            .bot
            .send_message(self.msg.chat.id, text)
            .parse_mode(ParseMode::Html)
            .await?)
    }

    pub async fn send_with(
        &self,
        text: impl Into<String>,
        markup: impl Into<ReplyMarkup>,
    ) -> Result<Message> {
        Ok(self
            .bot
            .send_message(self.msg.chat.id, text)
            .parse_mode(ParseMode::Html)
            .reply_markup(markup)
            .await?)
    }

    pub async fn reply_with(
        &self,
        text: impl Into<String>,
        markup: impl Into<ReplyMarkup>,
    ) -> Result<Message> {
        Ok(self
            .bot
            .send_message(self.msg.chat.id, text)
            .parse_mode(ParseMode::Html)
            .reply_parameters(ReplyParameters::new(self.msg.id))
            .reply_markup(markup)
            .await?)
    }

    /// Chat actions are cosmetic; a failure is only logged.
    pub async fn action(&self, action: ChatAction) {
        if let Err(err) = self.bot.send_chat_action(self.msg.chat.id, action).await {
            warn!("Could not send chat action to {}: {}", self.user_id, err);
        }
    }

    pub async fn reset(&self, session: &mut Session) {
        session
            .reset(&self.app.config.downloads_dir, self.user_id)
            .await;
    }

    pub async fn default_message(&self) -> Result<()> {
        self.send_with(self.t("defaultMessage"), KeyboardRemove::new())
            .await?;
        Ok(())
    }

    /// Leaves the current module and offers all of them again.
    pub async fn module_selector(&self, session: &mut Session) -> Result<()> {
        session.select_module(Module::None);
        self.reply_with(
            self.t("askWhichModule"),
            keyboards::module_selector(self.lang, self.app.config.lyrics_enabled()),
        )
        .await?;
        Ok(())
    }

    /// Sends a localized error with the start-over keyboard and resets the session.
    pub async fn fail(&self, session: &mut Session, key: &str, err: &BotError) -> Result<()> {
        error!("User {} failed with {}: {}", self.user_id, key, err);
        self.reset(session).await;
        self.send_with(self.t(key), keyboards::start_over(self.lang))
            .await?;
        Ok(())
    }
}

pub fn schema() -> UpdateHandler<BotError> {
    Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<Session>, Session>()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(on_command),
        )
        .branch(dptree::endpoint(on_message))
}

async fn on_command(
    bot: Bot,
    dialogue: BotDialogue,
    msg: Message,
    cmd: Command,
    mut session: Session,
    app: Arc<AppState>,
) -> Result<()> {
    let Some(ctx) = Ctx::new(bot, msg, app) else {
        return Ok(());
    };
    info!("{} sent {:?}", ctx.user_id, cmd);

    if let Err(err) = route_command(&ctx, &mut session, cmd).await {
        error!("Error handling command from {}: {}", ctx.user_id, err);
    }
    dialogue.update(session).await?;
    Ok(())
}

async fn route_command(ctx: &Ctx, session: &mut Session, cmd: Command) -> Result<()> {
    match cmd {
        Command::Start => general::start(ctx, session).await,
        Command::New => general::start_over(ctx, session).await,
        Command::Language => general::show_language_selector(ctx).await,
        Command::Help => general::help(ctx).await,
        Command::About => general::about(ctx).await,
        Command::Preview => tag_editor::preview(ctx, session).await,
        Command::Done => tag_editor::finish(ctx, session).await,
        Command::Donate => donation::show_methods(ctx).await,
        Command::AddAdmin(arg) => admin::add_admin(ctx, &arg).await,
        Command::DelAdmin(arg) => admin::del_admin(ctx, &arg).await,
        Command::Stats => admin::stats(ctx).await,
        Command::ListUsers(arg) => admin::list_users(ctx, &arg).await,
        Command::SendToAll => admin::send_to_all(ctx, session).await,
        Command::CancelSendToAll => admin::cancel_send_to_all(ctx, session).await,
        Command::Premium(arg) => admin::premium(ctx, &arg).await,
    }
}

async fn on_message(
    bot: Bot,
    dialogue: BotDialogue,
    msg: Message,
    mut session: Session,
    app: Arc<AppState>,
) -> Result<()> {
    let Some(ctx) = Ctx::new(bot, msg, app) else {
        return Ok(());
    };

    if let Err(err) = route_message(&ctx, &mut session).await {
        error!("Error handling message from {}: {}", ctx.user_id, err);
    }
    dialogue.update(session).await?;
    Ok(())
}

async fn route_message(ctx: &Ctx, session: &mut Session) -> Result<()> {
    if session.awaiting_broadcast_until.is_some() {
        if session.is_awaiting_broadcast(Utc::now()) && ctx.app.store.is_admin(ctx.user_id)? {
            return admin::broadcast_message(ctx, session).await;
        }
        session.awaiting_broadcast_until = None;
    }

    if ctx.msg.audio().is_some() {
        return general::handle_audio(ctx, session).await;
    }
    if ctx.msg.photo().is_some() {
        return tag_editor::handle_photo(ctx, session).await;
    }

    let Some(text) = ctx.msg.text().map(str::trim) else {
        return general::ignore_file(ctx, session).await;
    };

    match classify(session, text, ctx.app.config.lyrics_enabled()) {
        Route::Button(button) => route_button(ctx, session, button).await,
        Route::TagInput => tag_editor::handle_text(ctx, session, text).await,
        Route::LyricsLanguage(code) => lyrics::transcribe(ctx, session, code).await,
        Route::SetLanguage(lang) => general::set_language(ctx, lang).await,
        Route::Bitrate => bitrate::change_bitrate(ctx, session, text).await,
        Route::ModuleSelector => ctx.module_selector(session).await,
        Route::Donation(method) => donation::show_address(ctx, method).await,
        Route::Responses => general::handle_responses(ctx, session, text).await,
    }
}

/// Where a text message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Button(Button),
    /// Value for the tag the user picked last.
    TagInput,
    LyricsLanguage(&'static str),
    SetLanguage(Language),
    Bitrate,
    ModuleSelector,
    Donation(DonationMethod),
    /// Free text for the current module.
    Responses,
}

/// Keyboard buttons win over everything. A selected tag takes any other
/// text as its value, so labels of other keyboards can be used as tags.
pub fn classify(session: &Session, text: &str, lyrics_enabled: bool) -> Route {
    let text = text.trim();

    if let Some(button) = Button::parse(text) {
        return Route::Button(button);
    }
    if session.has_music() && session.current_tag.is_some() {
        return Route::TagInput;
    }
    if lyrics_enabled && session.module == Module::Lyrics {
        if let Some(code) = transcribe::lyrics_language_code(text) {
            return Route::LyricsLanguage(code);
        }
    }
    if let Some(lang) = Language::from_button_label(text) {
        return Route::SetLanguage(lang);
    }
    if BITRATE_RE.is_match(text) {
        return match (session.has_music(), session.module) {
            (true, Module::BitrateChanger) => Route::Bitrate,
            (true, _) => Route::ModuleSelector,
            (false, _) => Route::Responses,
        };
    }
    if let Some(method) = DonationMethod::parse(text) {
        return Route::Donation(method);
    }
    Route::Responses
}

async fn route_button(ctx: &Ctx, session: &mut Session, button: Button) -> Result<()> {
    match button {
        Button::NewFile => general::start_over(ctx, session).await,
        Button::Back => general::back(ctx, session).await,
        Button::TagEditor => tag_editor::show(ctx, session).await,
        Button::VoiceConverter => voice::convert(ctx, session).await,
        Button::Cutter => cutter::show_help(ctx, session).await,
        Button::BitrateChanger => bitrate::show_keyboard(ctx, session).await,
        Button::Lyrics => lyrics::show_languages(ctx, session).await,
        Button::Title
        | Button::Artist
        | Button::Album
        | Button::Genre
        | Button::AlbumArt
        | Button::Year
        | Button::DiskNumber
        | Button::TrackNumber => tag_editor::ask_for_tag(ctx, session, button).await,
        Button::RemoveAlbumArt => tag_editor::remove_art(ctx, session).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MusicFile, TagField};
    use teloxide::types::MessageId;

    fn parse(text: &str) -> Command {
        Command::parse(text, "music_tool_bot").unwrap()
    }

    #[test]
    fn commands_parse() {
        assert_eq!(parse("/start"), Command::Start);
        assert_eq!(parse("/cancel_sendtoall"), Command::CancelSendToAll);
        assert_eq!(parse("/addadmin 12345"), Command::AddAdmin("12345".into()));
        assert_eq!(parse("/listusers"), Command::ListUsers(String::new()));
        assert_eq!(parse("/premium 5 30"), Command::Premium("5 30".into()));
    }

    #[test]
    fn hidden_commands_are_not_advertised() {
        let advertised: Vec<String> = Command::bot_commands()
            .into_iter()
            .map(|c| c.command)
            .collect();
        assert!(advertised.iter().any(|c| c.ends_with("done")));
        assert!(!advertised.iter().any(|c| c.contains("admin")));
    }

    fn with_music(module: Module, current_tag: Option<TagField>) -> Session {
        Session {
            music: Some(MusicFile {
                path: PathBuf::from("/dl/42/7.mp3"),
                message_id: MessageId(7),
                duration_secs: 180,
                art_path: None,
                new_art_path: None,
            }),
            module,
            current_tag,
            ..Session::default()
        }
    }

    #[test]
    fn selected_tag_takes_other_keyboard_labels_as_values() {
        let session = with_music(Module::TagEditor, Some(TagField::Artist));
        for text in ["Tether", "Tether (USDT)", "320 kb/s", "🇬🇧 English", "English", "Shiba"] {
            assert_eq!(classify(&session, text, true), Route::TagInput, "{text}");
        }
    }

    #[test]
    fn buttons_work_while_a_tag_is_selected() {
        let session = with_music(Module::TagEditor, Some(TagField::Title));
        let back = Button::Back.label(Language::En);
        let new_file = Button::NewFile.label(Language::Fa);
        let year = Button::Year.label(Language::Ru);
        assert_eq!(classify(&session, &back, true), Route::Button(Button::Back));
        assert_eq!(classify(&session, &new_file, true), Route::Button(Button::NewFile));
        assert_eq!(classify(&session, &year, true), Route::Button(Button::Year));
    }

    #[test]
    fn tag_editor_without_a_tag_uses_free_text_handling() {
        let session = with_music(Module::TagEditor, None);
        assert_eq!(classify(&session, "Some artist", true), Route::Responses);
    }

    #[test]
    fn cutter_ranges_go_to_the_module() {
        let session = with_music(Module::Cutter, None);
        assert_eq!(classify(&session, "0:10-1:20", true), Route::Responses);
        assert_eq!(classify(&session, "oops", true), Route::Responses);
    }

    #[test]
    fn bitrate_labels_only_convert_inside_the_bitrate_changer() {
        let inside = with_music(Module::BitrateChanger, None);
        assert_eq!(classify(&inside, "192 kb/s", true), Route::Bitrate);

        let cutter = with_music(Module::Cutter, None);
        assert_eq!(classify(&cutter, "192 kb/s", true), Route::ModuleSelector);

        assert_eq!(classify(&Session::default(), "192 kb/s", true), Route::Responses);
    }

    #[test]
    fn lyrics_languages_are_only_read_in_the_lyrics_module() {
        let lyrics = with_music(Module::Lyrics, None);
        assert_eq!(classify(&lyrics, "Spanish", true), Route::LyricsLanguage("es"));
        assert_eq!(classify(&lyrics, "Spanish", false), Route::Responses);

        let idle = with_music(Module::None, None);
        assert_eq!(classify(&idle, "Spanish", true), Route::Responses);
    }

    #[test]
    fn language_and_donation_labels_outside_tag_input() {
        let idle = with_music(Module::None, None);
        assert_eq!(
            classify(&idle, "🇮🇷 فارسی", true),
            Route::SetLanguage(Language::Fa)
        );
        assert_eq!(classify(&idle, "english version please", true), Route::Responses);
        assert_eq!(
            classify(&idle, "Tether (USDT)", true),
            Route::Donation(DonationMethod::Tether)
        );
        assert_eq!(classify(&idle, "Tether", true), Route::Responses);
        assert_eq!(
            classify(&Session::default(), "Bitcoin (BTC)", true),
            Route::Donation(DonationMethod::Bitcoin)
        );
    }

    #[test]
    fn bitrate_labels_match() {
        assert!(BITRATE_RE.is_match("320 kb/s"));
        assert!(!BITRATE_RE.is_match("32 kb/s"));
        assert!(!BITRATE_RE.is_match("320kb/s"));
    }
}
