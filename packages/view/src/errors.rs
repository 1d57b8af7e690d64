//! Error types for the view

use thiserror::Error;

use crate::node::ViewNodeId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewError {
    #[error("View root `{0}` does not exist")]
    RootNotFound(String),

    #[error("View root `{0}` already exists")]
    DuplicateRoot(String),

    #[error("Offset {offset} is out of bounds of view node {node:?}")]
    OffsetOutOfBounds { node: ViewNodeId, offset: usize },

    #[error("View node {0:?} has no parent")]
    NoParent(ViewNodeId),

    #[error("Range boundaries are in different containers")]
    RangeNotFlat,

    #[error("Element passed to `{0}` must be an attribute element")]
    NotAnAttributeElement(&'static str),

    #[error("Cannot insert {0:?} here: only text and inline elements go into attribute elements")]
    InvalidInsert(ViewNodeId),

    #[error("Cannot break a container element")]
    CannotBreakContainer,

    #[error(transparent)]
    Html(#[from] HtmlError),
}

impl ViewError {
    /// Stable identifier of the error, usable in logs and assertions
    pub fn code(&self) -> &'static str {
        match self {
            ViewError::RootNotFound(_) => "view-document-root-not-exist",
            ViewError::DuplicateRoot(_) => "view-document-root-exists",
            ViewError::OffsetOutOfBounds { .. } => "view-position-offset-out-of-bounds",
            ViewError::NoParent(_) => "view-position-before-root",
            ViewError::RangeNotFlat => "view-writer-invalid-range-container",
            ViewError::NotAnAttributeElement(_) => "view-writer-wrap-invalid-attribute",
            ViewError::InvalidInsert(_) => "view-writer-insert-invalid-node",
            ViewError::CannotBreakContainer => "view-writer-cannot-break-container",
            ViewError::Html(_) => "view-html-invalid",
        }
    }
}

/// Errors raised while reading HTML
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HtmlError {
    #[error("Malformed HTML: {0}")]
    Markup(#[from] folio_common::MarkupError),
}

pub type ViewResult<T> = Result<T, ViewError>;
