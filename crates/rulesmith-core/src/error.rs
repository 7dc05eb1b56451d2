use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("directory not found: {0}")]
    DirNotFound(String),

    #[error("invalid pattern '{pattern}' in config: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("invalid output path '{0}': must be relative and stay inside the output directory")]
    InvalidOutputPath(String),

    #[error("master file has no content: {0}")]
    EmptyMaster(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, RuleError>;
