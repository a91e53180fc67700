//! Vocabulary learning for Wordhoard
//!
//! This module provides:
//! - Word entries with descriptive metadata, tags and notes
//! - Spaced repetition scheduling with status promotion
//! - The manager owning the collection and persisting every change
//! - Change notifications and a thread-safe shared handle

pub mod algorithm;
pub mod error;
pub mod events;
pub mod manager;
pub mod models;
pub mod shared;

pub use algorithm::Grade;
pub use error::{Result, VocabError};
pub use events::{VocabularyEvent, VocabularyObserver};
pub use manager::{DueWords, SortOrder, Statistics, VocabularyManager, WordPage};
pub use models::*;
pub use shared::SharedVocabulary;
