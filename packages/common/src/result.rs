use crate::error::MarkupError;

/// Result type alias for markup tokenizing
pub type MarkupResult<T> = Result<T, MarkupError>;
