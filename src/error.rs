use std::fmt;

#[derive(Debug)]
pub enum HostError {
    Validation(String),
    Transport(String),
    Persistence(String),
    Config(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HostError::Validation(msg) => write!(f, "Validation error: {}", msg),
            HostError::Transport(msg) => write!(f, "Transport error: {}", msg),
            HostError::Persistence(msg) => write!(f, "Persistence error: {}", msg),
            HostError::Config(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for HostError {}

pub type Result<T> = std::result::Result<T, HostError>;

// Conversion helpers
impl From<std::io::Error> for HostError {
    fn from(err: std::io::Error) -> Self {
        HostError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for HostError {
    fn from(err: serde_json::Error) -> Self {
        HostError::Persistence(err.to_string())
    }
}
