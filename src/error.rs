use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Telegram API error: {0}")]
    Request(#[from] teloxide::RequestError),

    #[error("Telegram download error: {0}")]
    Download(#[from] teloxide::DownloadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{program} failed: {stderr}")]
    Ffmpeg { program: String, stderr: String },

    #[error("Could not read media info: {0}")]
    Probe(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dialogue storage error: {0}")]
    Dialogue(String),
}

impl From<teloxide::dispatching::dialogue::InMemStorageError> for BotError {
    fn from(err: teloxide::dispatching::dialogue::InMemStorageError) -> Self {
        BotError::Dialogue(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
