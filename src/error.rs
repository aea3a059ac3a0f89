use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilmceptionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Model artifacts missing, corrupt or dimensionally inconsistent
    #[error("Load error: {0}")]
    Load(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// Writing the translation artifact failed; translations themselves are still valid
    #[error("Failed to persist translations to {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, FilmceptionError>;
