use thiserror::Error;

use super::models::WordId;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum VocabError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Word not found: {0}")]
    NotFound(WordId),

    #[error("Note not found: {0}")]
    NoteNotFound(uuid::Uuid),

    #[error("Word already exists: {0}")]
    DuplicateWord(String),

    #[error("Invalid grade: {0}")]
    InvalidGrade(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl VocabError {
    /// True for failures that may succeed when retried (transient storage problems).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(err) => err.is_retryable(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, VocabError>;
