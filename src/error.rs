use thiserror::Error;

#[derive(Error, Debug)]
pub enum CiQueryError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("No environment named '{0}' found in the configuration")]
    InvalidEnvironment(String),

    #[error("No system named '{0}' found in the configuration")]
    InvalidSystem(String),

    #[error("No system matches the given filters. Known systems: {}", .systems.join(", "))]
    NoValidSystem { systems: Vec<String> },

    #[error("No enabled system remains after filtering")]
    NoEnabledSystem,

    #[error("No source matches the given filters. Known sources: {}", .sources.join(", "))]
    NoValidSources { sources: Vec<String> },

    #[error("Jenkins request failed: {0}")]
    Jenkins(String),

    #[error("Zuul request failed with status {status}: {message}")]
    Zuul { status: u16, message: String },

    #[error(transparent)]
    Pattern(#[from] regex::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CiQueryError>;
