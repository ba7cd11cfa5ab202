use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid name '{0}': must contain at least one letter or digit")]
    InvalidName(String),
    #[error("invalid path '{0}': must be relative and stay inside the project")]
    InvalidPath(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("template error: {0}")]
    Template(#[from] tera::Error),
    #[error("settings error: {0}")]
    Settings(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
