use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Credential format errors
    #[error("Invalid PIN code: {0}")]
    InvalidPin(String),

    #[error("Invalid card UID: {0}")]
    InvalidCardUid(String),

    #[error("Invalid time window: {0}")]
    InvalidTimeWindow(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration key: {0}")]
    MissingConfig(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
