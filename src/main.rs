use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

// Import the logging macros
use log::{info, warn};

use music_tool_bot::config::Config;
use music_tool_bot::handlers::{schema, Command};
use music_tool_bot::session::Session;
use music_tool_bot::store::{JsonUserStore, UserStore};
use music_tool_bot::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from `.env` file
    dotenv().ok();

    // Initialize the logger
    pretty_env_logger::init();

    let config = Config::from_env().context("Failed to read configuration")?;

    tokio::fs::create_dir_all(&config.downloads_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.downloads_dir.display()))?;

    let store = JsonUserStore::open(&config.data_file)
        .with_context(|| format!("Failed to open {}", config.data_file.display()))?;
    if config.owner_user_id != 0 {
        store
            .seed_owner(config.owner_user_id)
            .context("Failed to register the owner")?;
    }

    if config.transcription.is_none() {
        warn!("TRANSCRIPTION_API_KEY is not set, lyrics are disabled");
    }

    // Initialize the bot with the token
    let bot = Bot::new(&config.bot_token);
    if let Err(err) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Could not register bot commands: {}", err);
    }

    let state = Arc::new(AppState::new(config, Arc::new(store)));

    info!("Starting the music tool bot...");

    // Start the bot's event loop
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![InMemStorage::<Session>::new(), state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
