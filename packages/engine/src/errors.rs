//! Error types for the engine

use folio_model::ModelError;
use folio_view::ViewError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("View error: {0}")]
    View(#[from] ViewError),

    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Cannot map {0} between model and view")]
    Mapping(String),

    #[error("Root `{0}` is not editable")]
    UnknownRoot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Model(err) => err.code(),
            EngineError::View(err) => err.code(),
            EngineError::Command(err) => err.code(),
            EngineError::Mapping(_) => "mapper-position-not-found",
            EngineError::UnknownRoot(_) => "editor-root-not-exist",
            EngineError::Io(_) => "editor-config-io",
            EngineError::Config(_) => "editor-config-invalid",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    #[error("Command `{0}` does not exist")]
    Unknown(String),

    #[error("Command `{0}` is already registered")]
    Duplicate(String),

    #[error("Invalid argument for `{command}`: {message}")]
    InvalidArgument { command: String, message: String },
}

impl CommandError {
    pub fn code(&self) -> &'static str {
        match self {
            CommandError::Unknown(_) => "commandcollection-command-not-found",
            CommandError::Duplicate(_) => "commandcollection-command-exists",
            CommandError::InvalidArgument { .. } => "command-invalid-argument",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
