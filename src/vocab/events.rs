//! Change notifications
//!
//! Observers are called synchronously, once a change is in storage. With
//! auto-save on that is right after the mutation; with it off, events are
//! queued and delivered after the next successful flush, following its
//! `Saved` event. A failed mutation or flush never produces word events, and
//! changes discarded by a reload never produce any.

use super::algorithm::Grade;
use super::models::{Note, Word, WordId};

#[derive(Debug, Clone, Copy)]
pub enum VocabularyEvent<'a> {
    WordAdded(&'a Word),
    WordUpdated(&'a Word),
    WordReviewed { word: &'a Word, grade: Grade },
    NoteAdded { word: &'a Word, note: &'a Note },
    WordRemoved(WordId),
    /// The collection was written to storage
    Saved { word_count: usize },
}

pub trait VocabularyObserver: Send + Sync {
    fn on_event(&self, event: &VocabularyEvent<'_>);
}

impl<F> VocabularyObserver for F
where
    F: Fn(&VocabularyEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &VocabularyEvent<'_>) {
        self(event)
    }
}

/// An event held back until the change behind it has been written
#[derive(Debug, Clone)]
pub(crate) enum PendingEvent {
    WordAdded(Word),
    WordUpdated(Word),
    WordReviewed(Word, Grade),
    NoteAdded(Word, Note),
    WordRemoved(WordId),
}

impl PendingEvent {
    pub(crate) fn as_event(&self) -> VocabularyEvent<'_> {
        match self {
            Self::WordAdded(word) => VocabularyEvent::WordAdded(word),
            Self::WordUpdated(word) => VocabularyEvent::WordUpdated(word),
            Self::WordReviewed(word, grade) => VocabularyEvent::WordReviewed { word, grade: *grade },
            Self::NoteAdded(word, note) => VocabularyEvent::NoteAdded { word, note },
            Self::WordRemoved(id) => VocabularyEvent::WordRemoved(*id),
        }
    }
}
