use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Empty query")]
    EmptyQuery,

    #[error("Turn superseded by a newer submission")]
    Superseded,

    #[error("Turn task error: {0}")]
    Turn(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, AssistantError>;
