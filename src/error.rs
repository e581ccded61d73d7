use thiserror::Error;

#[derive(Error, Debug)]
pub enum VidriffError {
    #[error("Video processing failed: {0}")]
    VideoProcessing(String),

    #[error("Audio generation failed: {0}")]
    Generation(String),

    #[error("Prompt must be provided to generate audio")]
    EmptyPrompt,

    #[error("Invalid duration: {0}")]
    InvalidDuration(f64),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Action not allowed in the current session state: {0}")]
    InvalidState(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VidriffError>;
