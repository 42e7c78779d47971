pub mod broadcast;
pub mod config;
pub mod error;
pub mod files;
pub mod format;
pub mod handlers;
pub mod i18n;
pub mod keyboards;
pub mod media;
pub mod session;
pub mod store;
pub mod transcribe;

use std::sync::Arc;

use broadcast::Broadcaster;
use config::Config;
use media::Ffmpeg;
use store::UserStore;
use transcribe::Transcriber;

/// Shared by every handler through the dispatcher's dependencies.
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn UserStore>,
    pub ffmpeg: Ffmpeg,
    pub transcriber: Option<Transcriber>,
    pub broadcaster: Broadcaster,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn UserStore>) -> Self {
        let ffmpeg = Ffmpeg::new(&config.ffmpeg_path, &config.ffprobe_path);
        let transcriber = config.transcription.clone().map(Transcriber::new);
        Self {
            config,
            store,
            ffmpeg,
            transcriber,
            broadcaster: Broadcaster::default(),
        }
    }
}
