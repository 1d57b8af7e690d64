//! Error types for the model

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Operation base version {operation} does not match document version {document}")]
    VersionMismatch { operation: u64, document: u64 },

    #[error("Operation has no base version (document version {document})")]
    MissingBaseVersion { document: u64 },

    #[error("Root `{0}` already exists")]
    DuplicateRoot(String),

    #[error("Root `{0}` does not exist")]
    RootNotFound(String),

    #[error("Path {path:?} does not point into an element of root `{root}`")]
    InvalidPath { root: String, path: Vec<usize> },

    #[error("Offset {offset} is out of bounds (max offset {max})")]
    OffsetOutOfBounds { offset: usize, max: usize },

    #[error("Node is not an element")]
    NotAnElement,

    #[error("Trying to move a range into itself")]
    MoveIntoItself,

    #[error("Range is not flat")]
    RangeNotFlat,

    #[error("Attribute `{key}` has a value different from the operation's old value")]
    WrongOldValue { key: String },

    #[error("Element at the position is named `{found}`, expected `{expected}`")]
    WrongElementName { expected: String, found: String },

    #[error("Marker `{0}` already exists")]
    MarkerExists(String),

    #[error("Marker `{0}` does not exist")]
    MarkerNotFound(String),

    #[error("Cannot merge: {0}")]
    InvalidMerge(&'static str),

    #[error("Cannot split: {0}")]
    InvalidSplit(&'static str),

    #[error("Cannot wrap: {0}")]
    InvalidWrap(&'static str),

    #[error("Invalid model data: {0}")]
    Parse(String),
}

impl ModelError {
    /// Stable identifier of the error, usable in logs and assertions
    pub fn code(&self) -> &'static str {
        match self {
            ModelError::VersionMismatch { .. } => "model-document-applyoperation-wrong-version",
            ModelError::MissingBaseVersion { .. } => "model-document-applyoperation-no-version",
            ModelError::DuplicateRoot(_) => "model-document-createroot-name-exists",
            ModelError::RootNotFound(_) => "model-document-getroot-root-not-exist",
            ModelError::InvalidPath { .. } => "model-position-path-incorrect",
            ModelError::OffsetOutOfBounds { .. } => "model-position-offset-out-of-bounds",
            ModelError::NotAnElement => "model-position-parent-incorrect",
            ModelError::MoveIntoItself => "move-operation-range-into-itself",
            ModelError::RangeNotFlat => "model-range-not-flat",
            ModelError::WrongOldValue { .. } => "attribute-operation-wrong-old-value",
            ModelError::WrongElementName { .. } => "rename-operation-wrong-name",
            ModelError::MarkerExists(_) => "writer-addmarker-marker-exists",
            ModelError::MarkerNotFound(_) => "writer-removemarker-no-marker",
            ModelError::InvalidMerge(_) => "writer-merge-invalid",
            ModelError::InvalidSplit(_) => "writer-split-invalid",
            ModelError::InvalidWrap(_) => "writer-wrap-invalid",
            ModelError::Parse(_) => "model-dev-utils-parse",
        }
    }
}

impl From<folio_common::MarkupError> for ModelError {
    fn from(e: folio_common::MarkupError) -> Self {
        ModelError::Parse(e.to_string())
    }
}

pub type ModelResult<T> = Result<T, ModelError>;
