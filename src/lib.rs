//! Wordhoard: a personal vocabulary builder with spaced repetition.

pub mod config;
pub mod storage;
pub mod vocab;

pub use config::{AppConfig, SchedulerConfig};
pub use storage::{CommitGate, JsonFileStorage, MemoryStorage, StorageError, VocabularyStorage};
pub use vocab::{Grade, SharedVocabulary, VocabError, VocabularyManager, Word, WordId, WordPatch, WordStatus};
