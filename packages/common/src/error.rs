use thiserror::Error;

/// Errors raised while tokenizing tag-based markup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarkupError {
    #[error("Unexpected character at byte {offset}")]
    UnexpectedCharacter { offset: usize },

    #[error("Unterminated tag `{name}` starting at byte {offset}")]
    UnterminatedTag { name: String, offset: usize },

    #[error("Malformed attribute in tag `{name}` at byte {offset}")]
    MalformedAttribute { name: String, offset: usize },
}

impl MarkupError {
    pub fn offset(&self) -> usize {
        match self {
            MarkupError::UnexpectedCharacter { offset }
            | MarkupError::UnterminatedTag { offset, .. }
            | MarkupError::MalformedAttribute { offset, .. } => *offset,
        }
    }
}
