//! The vocabulary manager
//!
//! Owns the in-memory collection, applies reviews through the scheduler and
//! writes every committed change through the storage port. When a write
//! fails, the in-memory change is undone before the error is returned, so
//! memory never drifts away from what is on disk. A write that times out is
//! cancelled before it can land.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::algorithm::{self, Grade};
use super::error::{Result, VocabError};
use super::events::{PendingEvent, VocabularyEvent, VocabularyObserver};
use super::models::*;
use crate::config::AppConfig;
use crate::storage::{self, BackupInfo, CommitGate, StorageError, VocabularyStorage, WordMap};

/// Ordering for [`VocabularyManager::list_words`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Alphabetical,
    AddedTime,
    ReviewTime,
    Completeness,
    Status,
    ReviewCount,
}

impl FromStr for SortOrder {
    type Err = VocabError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['-', '_'], "").as_str() {
            "alphabetical" | "alpha" | "text" => Ok(Self::Alphabetical),
            "added" | "addedtime" => Ok(Self::AddedTime),
            "reviewed" | "reviewtime" => Ok(Self::ReviewTime),
            "completeness" => Ok(Self::Completeness),
            "status" => Ok(Self::Status),
            "reviewcount" | "reviews" => Ok(Self::ReviewCount),
            other => Err(VocabError::InvalidInput(format!("unknown sort order '{}'", other))),
        }
    }
}

/// One page of a sorted listing
#[derive(Debug, Clone)]
pub struct WordPage<'a> {
    pub words: Vec<&'a Word>,
    /// 1-based
    pub page: usize,
    pub total_pages: usize,
    pub total_count: usize,
}

/// Collection-wide statistics
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_words: usize,
    pub by_status: BTreeMap<WordStatus, usize>,
    pub average_completeness: f64,
    pub due_now: usize,
    pub notes_count: usize,
    pub tag_count: usize,
    pub total_reviews: u64,
    /// Share of all reviews answered Good or Easy
    pub accuracy: Option<f64>,
    pub last_added: Option<DateTime<Utc>>,
    pub last_reviewed: Option<DateTime<Utc>>,
}

/// Words due for review, earliest first. Built fresh on every query.
pub struct DueWords<'a> {
    inner: std::vec::IntoIter<&'a Word>,
}

impl<'a> Iterator for DueWords<'a> {
    type Item = &'a Word;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for DueWords<'_> {}

/// How to undo one in-memory change
enum Undo {
    Put(Word),
    Remove(WordId),
}

pub struct VocabularyManager {
    storage: Arc<dyn VocabularyStorage>,
    config: AppConfig,
    words: WordMap,
    /// Normalized text -> id, for duplicate detection
    index: HashMap<String, WordId>,
    observers: Vec<Box<dyn VocabularyObserver>>,
    /// Staged changes not yet written (auto-save off, or a failed flush)
    dirty: bool,
    /// Events for staged changes, delivered once they are written
    pending: Vec<PendingEvent>,
}

impl VocabularyManager {
    /// Load the collection from `storage`. The manager only exists once this
    /// has succeeded.
    pub fn load(storage: Arc<dyn VocabularyStorage>, config: AppConfig) -> Result<Self> {
        let config = config.normalized();
        let timeout = config.storage_timeout();

        let loaded = {
            let storage = Arc::clone(&storage);
            run_storage_call(timeout, None, move || storage.load())
        };
        let words = match loaded {
            Ok(words) => words,
            Err(e) => {
                log::error!("Failed to load vocabulary from {}: {}", storage.describe(), e);
                return Err(e.into());
            }
        };

        let mut manager = Self {
            storage,
            config,
            words: WordMap::new(),
            index: HashMap::new(),
            observers: Vec::new(),
            dirty: false,
            pending: Vec::new(),
        };
        manager.replace_collection(words);
        log::info!(
            "Vocabulary ready: {} words from {}",
            manager.words.len(),
            manager.storage.describe()
        );
        Ok(manager)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Register an observer for committed changes
    pub fn subscribe(&mut self, observer: impl VocabularyObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    // ==================== Queries ====================

    pub fn get(&self, id: WordId) -> Option<&Word> {
        self.words.get(&id)
    }

    /// Look a word up by its text, ignoring case and extra whitespace
    pub fn find_by_text(&self, text: &str) -> Option<&Word> {
        self.index
            .get(&normalize_text(text))
            .and_then(|id| self.words.get(id))
    }

    /// All words in id order
    pub fn words(&self) -> impl Iterator<Item = &Word> {
        self.words.values()
    }

    /// Words whose `next_review_at` is at or before `now`, earliest first.
    ///
    /// New and suspended words are never due.
    pub fn words_due_for_review(&self, now: DateTime<Utc>) -> DueWords<'_> {
        let mut due: Vec<&Word> = self.words.values().filter(|w| w.is_due(now)).collect();
        due.sort_by(|a, b| {
            a.learning_data
                .next_review_at
                .cmp(&b.learning_data.next_review_at)
                .then_with(|| a.normalized_text().cmp(&b.normalized_text()))
                .then_with(|| a.id.cmp(&b.id))
        });
        DueWords {
            inner: due.into_iter(),
        }
    }

    /// Earliest upcoming review among active words
    pub fn next_review_at(&self) -> Option<DateTime<Utc>> {
        self.words
            .values()
            .filter(|w| w.is_active())
            .filter_map(|w| w.learning_data.next_review_at)
            .min()
    }

    /// Search text, primary definition, tags and notes.
    ///
    /// Exact matches come first, then matches in the word itself, then the
    /// most complete entries.
    pub fn search(&self, query: &str, limit: Option<usize>) -> Vec<&Word> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Vec::new();
        }

        let mut results: Vec<&Word> = self
            .words
            .values()
            .filter(|w| {
                w.text.to_lowercase().contains(&query)
                    || w.core.primary_definition.to_lowercase().contains(&query)
                    || w.tags.iter().any(|t| t.to_lowercase().contains(&query))
                    || w.notes.iter().any(|n| n.content.to_lowercase().contains(&query))
            })
            .collect();

        results.sort_by(|a, b| {
            let rank = |w: &Word| {
                let text = w.text.to_lowercase();
                (text == query, text.contains(&query))
            };
            rank(b)
                .cmp(&rank(a))
                .then_with(|| b.completeness.total_cmp(&a.completeness))
                .then_with(|| a.normalized_text().cmp(&b.normalized_text()))
        });

        results.truncate(limit.unwrap_or(self.config.search_result_limit));
        results
    }

    pub fn words_by_status(&self, status: WordStatus) -> Vec<&Word> {
        self.words.values().filter(|w| w.status == status).collect()
    }

    pub fn words_by_tag(&self, tag: &str) -> Vec<&Word> {
        let tag = tag.trim().trim_start_matches('#');
        self.words.values().filter(|w| w.tags.contains(tag)).collect()
    }

    /// Every tag in use with the number of words carrying it
    pub fn all_tags(&self) -> BTreeMap<String, usize> {
        let mut tags = BTreeMap::new();
        for word in self.words.values() {
            for tag in &word.tags {
                *tags.entry(tag.clone()).or_insert(0) += 1;
            }
        }
        tags
    }

    /// A sorted, paginated listing. `page` is 1-based.
    pub fn list_words(&self, sort: SortOrder, reverse: bool, page: usize, page_size: usize) -> WordPage<'_> {
        let mut words: Vec<&Word> = self.words.values().collect();

        match sort {
            SortOrder::Alphabetical => words.sort_by_key(|w| w.normalized_text()),
            SortOrder::AddedTime => words.sort_by_key(|w| w.added_at),
            SortOrder::ReviewTime => words.sort_by_key(|w| w.learning_data.last_reviewed_at),
            SortOrder::Completeness => words.sort_by(|a, b| a.completeness.total_cmp(&b.completeness)),
            SortOrder::Status => words.sort_by_key(|w| w.status),
            SortOrder::ReviewCount => words.sort_by_key(|w| w.learning_data.review_count),
        }
        if reverse {
            words.reverse();
        }

        let page_size = page_size.max(1);
        let page = page.max(1);
        let total_count = words.len();
        let total_pages = total_count.div_ceil(page_size);

        let words = words
            .into_iter()
            .skip((page - 1) * page_size)
            .take(page_size)
            .collect();

        WordPage {
            words,
            page,
            total_pages,
            total_count,
        }
    }

    pub fn statistics(&self, now: DateTime<Utc>) -> Statistics {
        let mut by_status: BTreeMap<WordStatus, usize> =
            WordStatus::ALL.iter().map(|s| (*s, 0)).collect();
        let mut completeness = 0.0;
        let mut total_reviews: u64 = 0;
        let mut correct: u64 = 0;

        for word in self.words.values() {
            *by_status.entry(word.status).or_insert(0) += 1;
            completeness += word.completeness;
            total_reviews += word.learning_data.review_count as u64;
            correct += word.learning_data.correct_count as u64;
        }

        let total_words = self.words.len();
        Statistics {
            total_words,
            by_status,
            average_completeness: if total_words == 0 {
                0.0
            } else {
                completeness / total_words as f64
            },
            due_now: self.words.values().filter(|w| w.is_due(now)).count(),
            notes_count: self.words.values().map(|w| w.notes.len()).sum(),
            tag_count: self.all_tags().len(),
            total_reviews,
            accuracy: if total_reviews == 0 {
                None
            } else {
                Some(correct as f64 / total_reviews as f64)
            },
            last_added: self.words.values().map(|w| w.added_at).max(),
            last_reviewed: self
                .words
                .values()
                .filter_map(|w| w.learning_data.last_reviewed_at)
                .max(),
        }
    }

    /// Interval each grade would give this word right now, Again..Easy
    pub fn preview_intervals(&self, id: WordId, now: DateTime<Utc>) -> Result<[f64; 4]> {
        let word = self.get(id).ok_or(VocabError::NotFound(id))?;
        Ok(algorithm::preview_intervals(
            &word.learning_data,
            word.status,
            now,
            &self.config.scheduler,
        ))
    }

    // ==================== Mutations ====================

    /// Add a new word. The text must not duplicate an existing entry
    /// (compared case- and whitespace-insensitively).
    pub fn add(&mut self, text: &str, metadata: WordPatch) -> Result<Word> {
        let metadata = WordPatch { text: None, ..metadata };

        let mut word = Word::new(text, Utc::now())?;
        if self.index.contains_key(&word.normalized_text()) {
            return Err(VocabError::DuplicateWord(word.text));
        }
        word.apply_patch(&metadata)?;
        word.tags.extend(normalize_tags(&self.config.default_tags));
        word.learning_data = LearningData::with_ease(
            self.config.scheduler.initial_ease,
            &self.config.scheduler.ease_bounds,
        );

        let id = word.id;
        let event = PendingEvent::WordAdded(word.clone());
        self.put_word(word);
        self.commit(vec![Undo::Remove(id)], vec![event])?;

        let word = &self.words[&id];
        log::info!("Added word '{}' ({})", word.text, id);
        Ok(word.clone())
    }

    /// Edit descriptive metadata. Learning data and status are not touched.
    pub fn update_metadata(&mut self, id: WordId, patch: &WordPatch) -> Result<Word> {
        let current = self.words.get(&id).ok_or(VocabError::NotFound(id))?;
        if patch.is_empty() {
            return Ok(current.clone());
        }

        let mut updated = current.clone();
        updated.apply_patch(patch)?;

        // Only a change of text can collide; loaded duplicates stay editable
        let key = updated.normalized_text();
        if key != current.normalized_text() {
            if let Some(other) = self.index.get(&key) {
                if *other != id {
                    return Err(VocabError::DuplicateWord(updated.text));
                }
            }
        }

        let event = PendingEvent::WordUpdated(updated.clone());
        let previous = self.put_word(updated);
        self.commit(previous.map(Undo::Put).into_iter().collect(), vec![event])?;

        Ok(self.words[&id].clone())
    }

    /// Record a review outcome at `now`.
    pub fn apply_review(&mut self, id: WordId, grade: Grade, now: DateTime<Utc>) -> Result<Word> {
        let current = self.words.get(&id).ok_or(VocabError::NotFound(id))?;
        if current.status == WordStatus::Suspended {
            return Err(VocabError::InvalidInput(format!(
                "'{}' is suspended; resume it before reviewing",
                current.text
            )));
        }

        let result = algorithm::review(
            &current.learning_data,
            current.status,
            grade,
            now,
            &self.config.scheduler,
        );

        let mut updated = current.clone();
        let from = updated.status;
        updated.learning_data = result.learning_data;
        updated.status = result.status;

        let event = PendingEvent::WordReviewed(updated.clone(), grade);
        let previous = self.put_word(updated);
        self.commit(previous.map(Undo::Put).into_iter().collect(), vec![event])?;

        let word = &self.words[&id];
        log::info!(
            "Reviewed '{}' as {}: {} -> {}, next review {}",
            word.text,
            grade,
            from,
            word.status,
            word.learning_data
                .next_review_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "not scheduled".to_string())
        );
        Ok(word.clone())
    }

    /// Like [`apply_review`](Self::apply_review), with the grade given as a
    /// name (`good`) or rating (`3`).
    pub fn apply_review_rating(&mut self, id: WordId, rating: &str, now: DateTime<Utc>) -> Result<Word> {
        let grade: Grade = rating.parse()?;
        self.apply_review(id, grade, now)
    }

    pub fn add_note<I, S>(&mut self, id: WordId, content: &str, tags: I) -> Result<Note>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let current = self.words.get(&id).ok_or(VocabError::NotFound(id))?;
        let note = Note::new(content, tags, Utc::now())?;

        let mut updated = current.clone();
        updated.add_note(note.clone());
        let event = PendingEvent::NoteAdded(updated.clone(), note.clone());
        let previous = self.put_word(updated);
        self.commit(previous.map(Undo::Put).into_iter().collect(), vec![event])?;

        Ok(note)
    }

    pub fn remove_note(&mut self, id: WordId, note_id: Uuid) -> Result<Note> {
        let current = self.words.get(&id).ok_or(VocabError::NotFound(id))?;
        let mut updated = current.clone();
        let note = updated
            .remove_note(note_id)
            .ok_or(VocabError::NoteNotFound(note_id))?;

        let event = PendingEvent::WordUpdated(updated.clone());
        let previous = self.put_word(updated);
        self.commit(previous.map(Undo::Put).into_iter().collect(), vec![event])?;

        Ok(note)
    }

    /// Take a word out of the review cycle. Learning data is kept as is.
    pub fn suspend(&mut self, id: WordId) -> Result<Word> {
        let current = self.words.get(&id).ok_or(VocabError::NotFound(id))?;
        if current.status == WordStatus::Suspended {
            return Ok(current.clone());
        }

        let mut updated = current.clone();
        updated.suspended_from = Some(updated.status);
        updated.status = WordStatus::Suspended;
        self.replace_and_commit(updated)
    }

    /// Return a suspended word to the stage it was suspended from.
    pub fn resume(&mut self, id: WordId) -> Result<Word> {
        let current = self.words.get(&id).ok_or(VocabError::NotFound(id))?;
        if current.status != WordStatus::Suspended {
            return Err(VocabError::InvalidInput(format!("'{}' is not suspended", current.text)));
        }

        let mut updated = current.clone();
        updated.status = updated.suspended_from.take().unwrap_or_else(|| {
            if updated.learning_data.next_review_at.is_some() {
                WordStatus::Learning
            } else {
                WordStatus::New
            }
        });
        self.replace_and_commit(updated)
    }

    /// Forget all review progress: back to New with default learning data.
    pub fn reset_progress(&mut self, id: WordId) -> Result<Word> {
        let current = self.words.get(&id).ok_or(VocabError::NotFound(id))?;
        let mut updated = current.clone();
        updated.status = WordStatus::New;
        updated.suspended_from = None;
        updated.learning_data = LearningData::with_ease(
            self.config.scheduler.initial_ease,
            &self.config.scheduler.ease_bounds,
        );
        self.replace_and_commit(updated)
    }

    pub fn remove(&mut self, id: WordId) -> Result<()> {
        let removed = self.take_word(id).ok_or(VocabError::NotFound(id))?;
        let text = removed.text.clone();
        self.commit(vec![Undo::Put(removed)], vec![PendingEvent::WordRemoved(id)])?;

        log::info!("Removed word '{}' ({})", text, id);
        Ok(())
    }

    /// Remove several words with a single write. Returns the ids that were
    /// not found; nothing is removed if the write fails.
    pub fn remove_many(&mut self, ids: &[WordId]) -> Result<Vec<WordId>> {
        let mut undo = Vec::new();
        let mut missing = Vec::new();
        for id in ids {
            match self.take_word(*id) {
                Some(word) => undo.push(Undo::Put(word)),
                None => missing.push(*id),
            }
        }
        if undo.is_empty() {
            return Ok(missing);
        }

        let events: Vec<PendingEvent> = undo
            .iter()
            .filter_map(|u| match u {
                Undo::Put(word) => Some(PendingEvent::WordRemoved(word.id)),
                Undo::Remove(_) => None,
            })
            .collect();
        let count = events.len();
        self.commit(undo, events)?;

        log::info!("Removed {} words", count);
        Ok(missing)
    }

    // ==================== Persistence ====================

    /// Write staged changes, then deliver their events. A no-op when
    /// nothing is pending. On failure both stay queued for the next try.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.persist()?;
        let pending = std::mem::take(&mut self.pending);
        self.deliver(&pending);
        Ok(())
    }

    /// Discard the in-memory collection and load it again from storage.
    pub fn reload(&mut self) -> Result<()> {
        if self.dirty {
            log::warn!("Reloading with unsaved changes; they are discarded");
        }
        let storage = Arc::clone(&self.storage);
        let words = run_storage_call(self.config.storage_timeout(), None, move || storage.load())?;
        self.replace_collection(words);
        self.dirty = false;
        self.pending.clear();
        Ok(())
    }

    /// Back up the persisted collection. Failure is reported, nothing else
    /// is affected.
    pub fn backup(&self) -> Result<BackupInfo> {
        match self.storage.backup() {
            Ok(info) => Ok(info),
            Err(e) => {
                log::warn!("Backup failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Run a backup on a background thread. Its outcome is only logged and
    /// returned through the handle.
    pub fn spawn_backup(&self) -> JoinHandle<storage::Result<BackupInfo>> {
        let storage = Arc::clone(&self.storage);
        thread::spawn(move || {
            let result = storage.backup();
            match &result {
                Ok(info) => log::info!("Background backup done: {}", info.location),
                Err(e) => log::warn!("Background backup failed: {}", e),
            }
            result
        })
    }

    /// Tear down, writing anything still staged.
    pub fn close(mut self) -> Result<()> {
        self.flush()
    }

    // ==================== Internals ====================

    fn replace_collection(&mut self, words: WordMap) {
        let bounds = self.config.scheduler.ease_bounds;
        self.words = WordMap::new();
        self.index.clear();

        for (_, mut word) in words {
            if !bounds.contains(word.learning_data.ease_factor) {
                log::warn!(
                    "Word '{}' has ease factor {} outside {}..={}, clamping",
                    word.text,
                    word.learning_data.ease_factor,
                    bounds.min,
                    bounds.max
                );
                let ease = word.learning_data.ease_factor;
                word.learning_data.set_ease_factor(ease, &bounds);
            }
            if matches!(word.status, WordStatus::Learning | WordStatus::Reviewing)
                && word.learning_data.next_review_at.is_none()
            {
                log::warn!("Word '{}' is {} but unscheduled, marking it due", word.text, word.status);
                word.learning_data.next_review_at =
                    Some(word.learning_data.last_reviewed_at.unwrap_or(word.added_at));
            }
            word.refresh_completeness();

            let key = word.normalized_text();
            if let Some(existing) = self.index.get(&key) {
                log::warn!("Duplicate entries for '{}': {} and {}", word.text, existing, word.id);
                self.words.insert(word.id, word);
            } else {
                self.put_word(word);
            }
        }
    }

    /// Insert or replace a word, keeping the text index in step.
    fn put_word(&mut self, word: Word) -> Option<Word> {
        if let Some(old) = self.words.get(&word.id) {
            let old_key = old.normalized_text();
            self.unindex(&old_key, word.id);
        }
        self.index.insert(word.normalized_text(), word.id);
        self.words.insert(word.id, word)
    }

    fn take_word(&mut self, id: WordId) -> Option<Word> {
        let word = self.words.remove(&id)?;
        self.unindex(&word.normalized_text(), id);
        Some(word)
    }

    /// Drop `id` from the index under `key`. If loaded data holds another
    /// entry with the same text, the key moves to it so the text stays taken.
    fn unindex(&mut self, key: &str, id: WordId) {
        if self.index.get(key) != Some(&id) {
            return;
        }
        let duplicate = self
            .words
            .values()
            .find(|w| w.id != id && w.normalized_text() == key)
            .map(|w| w.id);
        match duplicate {
            Some(other) => {
                self.index.insert(key.to_string(), other);
            }
            None => {
                self.index.remove(key);
            }
        }
    }

    fn replace_and_commit(&mut self, updated: Word) -> Result<Word> {
        let id = updated.id;
        let event = PendingEvent::WordUpdated(updated.clone());
        let previous = self.put_word(updated);
        self.commit(previous.map(Undo::Put).into_iter().collect(), vec![event])?;

        Ok(self.words[&id].clone())
    }

    /// Persist a change that has already been applied in memory, undoing it
    /// if the write fails, then deliver its events. With auto-save off the
    /// change and its events are only staged.
    fn commit(&mut self, undo: Vec<Undo>, events: Vec<PendingEvent>) -> Result<()> {
        if !self.config.auto_save {
            self.dirty = true;
            self.pending.extend(events);
            return Ok(());
        }

        if let Err(e) = self.persist() {
            log::warn!("Rolling back in-memory change after failed save: {}", e);
            for step in undo.into_iter().rev() {
                match step {
                    Undo::Put(word) => {
                        self.put_word(word);
                    }
                    Undo::Remove(id) => {
                        self.take_word(id);
                    }
                }
            }
            return Err(e);
        }
        self.deliver(&events);
        Ok(())
    }

    fn persist(&mut self) -> Result<()> {
        let result = match self.config.storage_timeout() {
            None => self.storage.save(&self.words),
            Some(timeout) => {
                let storage = Arc::clone(&self.storage);
                let words = self.words.clone();
                let gate = Arc::new(CommitGate::new());
                let worker_gate = Arc::clone(&gate);
                run_storage_call(Some(timeout), Some(gate.as_ref()), move || {
                    storage.save_guarded(&words, &worker_gate)
                })
            }
        };

        match result {
            Ok(()) => {
                self.dirty = false;
                self.notify(&VocabularyEvent::Saved {
                    word_count: self.words.len(),
                });
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to save vocabulary to {}: {}", self.storage.describe(), e);
                Err(e.into())
            }
        }
    }

    fn notify(&self, event: &VocabularyEvent<'_>) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }

    fn deliver(&self, events: &[PendingEvent]) {
        for event in events {
            self.notify(&event.as_event());
        }
    }
}

/// Run a storage call, giving up after `timeout` if one is set.
///
/// On timeout the worker thread is left to finish on its own. With a `gate`,
/// the call is cancelled so it cannot publish anything afterwards; if the
/// worker already claimed the gate, its real result is awaited instead.
fn run_storage_call<T, F>(timeout: Option<Duration>, gate: Option<&CommitGate>, call: F) -> storage::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> storage::Result<T> + Send + 'static,
{
    let Some(timeout) = timeout else {
        return call();
    };

    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("wordhoard-storage".to_string())
        .spawn(move || {
            let _ = tx.send(call());
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            if gate.is_some_and(|g| !g.cancel()) {
                log::warn!("Storage call passed {:?} while committing, waiting for it", timeout);
                return rx.recv().unwrap_or_else(|_| {
                    Err(StorageError::Unavailable(
                        "storage worker stopped without a result".to_string(),
                    ))
                });
            }
            log::warn!("Storage call timed out after {:?}", timeout);
            Err(StorageError::Unavailable(format!("timed out after {:?}", timeout)))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(StorageError::Unavailable(
            "storage worker stopped without a result".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use chrono::Duration as ChronoDuration;
    use std::sync::Mutex;

    fn t0() -> DateTime<Utc> {
        "2026-03-01T08:00:00Z".parse().unwrap()
    }

    fn create_manager() -> (VocabularyManager, Arc<MemoryStorage>) {
        create_manager_with(AppConfig::default())
    }

    fn create_manager_with(config: AppConfig) -> (VocabularyManager, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let manager = VocabularyManager::load(storage.clone(), config).unwrap();
        (manager, storage)
    }

    #[test]
    fn test_add_word() {
        let (mut manager, storage) = create_manager();
        let word = manager.add("lexicon", WordPatch::default()).unwrap();

        assert_eq!(word.status, WordStatus::New);
        assert_eq!(word.learning_data.repetitions, 0);
        assert_eq!(word.learning_data.ease_factor, 2.5);
        assert_eq!(storage.save_count(), 1);
        assert_eq!(storage.load().unwrap().len(), 1);
    }

    #[test]
    fn test_add_duplicate_and_invalid() {
        let (mut manager, storage) = create_manager();
        manager.add("Ad hoc", WordPatch::default()).unwrap();

        let err = manager.add("  ad   HOC ", WordPatch::default()).unwrap_err();
        assert!(matches!(err, VocabError::DuplicateWord(_)));
        let err = manager.add("   ", WordPatch::default()).unwrap_err();
        assert!(matches!(err, VocabError::InvalidInput(_)));

        assert_eq!(manager.len(), 1);
        assert_eq!(storage.save_count(), 1);
    }

    #[test]
    fn test_add_applies_metadata_and_default_tags() {
        let mut config = AppConfig::default();
        config.default_tags = vec!["inbox".to_string()];
        let (mut manager, _storage) = create_manager_with(config);

        let word = manager
            .add(
                "ubiquitous",
                WordPatch {
                    primary_definition: Some("existing everywhere".to_string()),
                    tags: Some(vec!["gre".to_string()]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(word.core.primary_definition, "existing everywhere");
        assert!(word.tags.contains("gre") && word.tags.contains("inbox"));
        assert!(word.completeness > 0.0);
    }

    #[test]
    fn test_update_metadata() {
        let (mut manager, _storage) = create_manager();
        let word = manager.add("lexicon", WordPatch::default()).unwrap();
        manager.add("syntax", WordPatch::default()).unwrap();

        let updated = manager
            .update_metadata(
                word.id,
                &WordPatch {
                    part_of_speech: Some("noun".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.core.part_of_speech, "noun");
        assert_eq!(updated.learning_data, word.learning_data);

        let err = manager
            .update_metadata(
                word.id,
                &WordPatch {
                    text: Some("Syntax".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, VocabError::DuplicateWord(_)));

        let renamed = manager
            .update_metadata(
                word.id,
                &WordPatch {
                    text: Some("lexica".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(renamed.text, "lexica");
        assert!(manager.find_by_text("lexicon").is_none());
        assert_eq!(manager.find_by_text("LEXICA").unwrap().id, word.id);

        let missing = WordId::new();
        assert!(matches!(
            manager.update_metadata(missing, &WordPatch::default()),
            Err(VocabError::NotFound(_))
        ));
    }

    #[test]
    fn test_first_review_scenario() {
        let (mut manager, _storage) = create_manager();
        let word = manager.add("lexicon", WordPatch::default()).unwrap();

        let reviewed = manager.apply_review(word.id, Grade::Good, t0()).unwrap();
        assert_eq!(reviewed.status, WordStatus::Learning);
        assert_eq!(reviewed.learning_data.repetitions, 1);
        assert_eq!(reviewed.learning_data.last_reviewed_at, Some(t0()));
        assert_eq!(
            reviewed.learning_data.next_review_at,
            Some(t0() + ChronoDuration::days(3))
        );
    }

    #[test]
    fn test_review_errors() {
        let (mut manager, _storage) = create_manager();
        let word = manager.add("lexicon", WordPatch::default()).unwrap();

        assert!(matches!(
            manager.apply_review(WordId::new(), Grade::Good, t0()),
            Err(VocabError::NotFound(_))
        ));
        assert!(matches!(
            manager.apply_review_rating(word.id, "brilliant", t0()),
            Err(VocabError::InvalidGrade(_))
        ));

        manager.suspend(word.id).unwrap();
        assert!(matches!(
            manager.apply_review(word.id, Grade::Good, t0()),
            Err(VocabError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_failed_save_rolls_back_review() {
        let (mut manager, storage) = create_manager();
        let word = manager.add("lexicon", WordPatch::default()).unwrap();
        let before = manager.apply_review(word.id, Grade::Good, t0()).unwrap();

        storage.fail_next_saves(1);
        let err = manager
            .apply_review(word.id, Grade::Easy, t0() + ChronoDuration::days(3))
            .unwrap_err();
        assert!(err.is_retryable());

        let after = manager.get(word.id).unwrap();
        assert_eq!(after.learning_data.repetitions, before.learning_data.repetitions);
        assert_eq!(after.status, before.status);
        assert_eq!(after, &before);
        assert!(!manager.is_dirty());
    }

    #[test]
    fn test_failed_save_rolls_back_add_and_remove() {
        let (mut manager, storage) = create_manager();
        let keep = manager.add("lexicon", WordPatch::default()).unwrap();

        storage.fail_next_saves(1);
        assert!(manager.add("syntax", WordPatch::default()).is_err());
        assert!(manager.find_by_text("syntax").is_none());
        assert_eq!(manager.len(), 1);
        // The text is free again after the rollback
        manager.add("syntax", WordPatch::default()).unwrap();

        storage.fail_next_saves(1);
        assert!(manager.remove(keep.id).is_err());
        assert_eq!(manager.get(keep.id), Some(&keep));
        assert_eq!(manager.find_by_text("lexicon").unwrap().id, keep.id);
    }

    #[test]
    fn test_failed_rename_restores_index() {
        let (mut manager, storage) = create_manager();
        let word = manager.add("lexicon", WordPatch::default()).unwrap();

        storage.fail_next_saves(1);
        let patch = WordPatch {
            text: Some("glossary".to_string()),
            ..Default::default()
        };
        assert!(manager.update_metadata(word.id, &patch).is_err());
        assert!(manager.find_by_text("glossary").is_none());
        assert_eq!(manager.find_by_text("lexicon").unwrap().id, word.id);
    }

    #[test]
    fn test_due_words_ordered_and_filtered() {
        let (mut manager, _storage) = create_manager();
        let late = manager.add("late", WordPatch::default()).unwrap();
        let early = manager.add("early", WordPatch::default()).unwrap();
        let future = manager.add("future", WordPatch::default()).unwrap();
        manager.add("untouched", WordPatch::default()).unwrap();

        manager.apply_review(late.id, Grade::Hard, t0()).unwrap(); // due t0 + 1d
        manager.apply_review(early.id, Grade::Again, t0()).unwrap(); // due t0 + 12h
        manager.apply_review(future.id, Grade::Easy, t0()).unwrap(); // due t0 + 7d

        let now = t0() + ChronoDuration::days(2);
        let due: Vec<_> = manager.words_due_for_review(now).map(|w| w.text.clone()).collect();
        assert_eq!(due, vec!["early", "late"]);

        // Re-querying re-evaluates against the new time
        assert_eq!(manager.words_due_for_review(t0()).count(), 0);
        assert_eq!(manager.words_due_for_review(t0() + ChronoDuration::days(7)).len(), 3);
    }

    #[test]
    fn test_due_boundary_is_inclusive() {
        let (mut manager, _storage) = create_manager();
        let word = manager.add("edge", WordPatch::default()).unwrap();
        let reviewed = manager.apply_review(word.id, Grade::Good, t0()).unwrap();
        let at = reviewed.learning_data.next_review_at.unwrap();

        assert_eq!(manager.words_due_for_review(at).count(), 1);
        assert_eq!(manager.words_due_for_review(at - ChronoDuration::seconds(1)).count(), 0);
    }

    #[test]
    fn test_suspend_and_resume_keep_learning_data() {
        let (mut manager, _storage) = create_manager();
        let word = manager.add("lexicon", WordPatch::default()).unwrap();
        let reviewed = manager.apply_review(word.id, Grade::Good, t0()).unwrap();

        let suspended = manager.suspend(word.id).unwrap();
        assert_eq!(suspended.status, WordStatus::Suspended);
        assert_eq!(suspended.learning_data, reviewed.learning_data);
        assert_eq!(manager.words_due_for_review(t0() + ChronoDuration::days(30)).count(), 0);

        let resumed = manager.resume(word.id).unwrap();
        assert_eq!(resumed.status, WordStatus::Learning);
        assert_eq!(resumed.learning_data, reviewed.learning_data);
        assert!(resumed.suspended_from.is_none());

        assert!(matches!(manager.resume(word.id), Err(VocabError::InvalidInput(_))));
    }

    #[test]
    fn test_reset_progress() {
        let (mut manager, _storage) = create_manager();
        let word = manager.add("lexicon", WordPatch::default()).unwrap();
        manager.apply_review(word.id, Grade::Good, t0()).unwrap();

        let reset = manager.reset_progress(word.id).unwrap();
        assert_eq!(reset.status, WordStatus::New);
        assert_eq!(reset.learning_data.repetitions, 0);
        assert!(reset.learning_data.next_review_at.is_none());
    }

    #[test]
    fn test_notes() {
        let (mut manager, _storage) = create_manager();
        let word = manager.add("lexicon", WordPatch::default()).unwrap();

        let first = manager.add_note(word.id, "seen in a paper", ["reading"]).unwrap();
        manager.add_note(word.id, "ask about plural", Vec::<String>::new()).unwrap();
        assert!(manager.add_note(word.id, "  ", Vec::<String>::new()).is_err());

        let stored = manager.get(word.id).unwrap();
        assert_eq!(stored.notes.len(), 2);
        assert_eq!(stored.notes[0].id, first.id);

        manager.remove_note(word.id, first.id).unwrap();
        assert_eq!(manager.get(word.id).unwrap().notes.len(), 1);
        assert!(matches!(
            manager.remove_note(word.id, first.id),
            Err(VocabError::NoteNotFound(_))
        ));
    }

    #[test]
    fn test_remove() {
        let (mut manager, storage) = create_manager();
        let word = manager.add("lexicon", WordPatch::default()).unwrap();
        manager.remove(word.id).unwrap();

        assert!(manager.get(word.id).is_none());
        assert!(storage.load().unwrap().is_empty());
        assert!(matches!(manager.remove(word.id), Err(VocabError::NotFound(_))));
    }

    #[test]
    fn test_remove_many() {
        let (mut manager, storage) = create_manager();
        let a = manager.add("alpha", WordPatch::default()).unwrap();
        let b = manager.add("beta", WordPatch::default()).unwrap();
        manager.add("gamma", WordPatch::default()).unwrap();
        let saves = storage.save_count();

        let ghost = WordId::new();
        let missing = manager.remove_many(&[a.id, b.id, ghost]).unwrap();
        assert_eq!(missing, vec![ghost]);
        assert_eq!(manager.len(), 1);
        assert_eq!(storage.save_count(), saves + 1);
    }

    fn record_events(manager: &mut VocabularyManager) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        manager.subscribe(move |event: &VocabularyEvent<'_>| {
            let name = match event {
                VocabularyEvent::WordAdded(w) => format!("added:{}", w.text),
                VocabularyEvent::WordUpdated(w) => format!("updated:{}", w.text),
                VocabularyEvent::WordReviewed { word, grade } => format!("reviewed:{}:{}", word.text, grade),
                VocabularyEvent::NoteAdded { word, note } => format!("note:{}:{}", word.text, note.content),
                VocabularyEvent::WordRemoved(_) => "removed".to_string(),
                VocabularyEvent::Saved { word_count } => format!("saved:{}", word_count),
            };
            sink.lock().unwrap().push(name);
        });
        seen
    }

    #[test]
    fn test_deferred_saves_without_auto_save() {
        let mut config = AppConfig::default();
        config.auto_save = false;
        let (mut manager, storage) = create_manager_with(config);
        let seen = record_events(&mut manager);

        let word = manager.add("lexicon", WordPatch::default()).unwrap();
        manager.apply_review(word.id, Grade::Good, t0()).unwrap();
        assert!(manager.is_dirty());
        assert_eq!(storage.save_count(), 0);
        assert!(seen.lock().unwrap().is_empty());

        storage.fail_next_saves(1);
        assert!(manager.flush().is_err());
        assert!(manager.is_dirty());
        assert_eq!(manager.len(), 1);
        assert!(seen.lock().unwrap().is_empty());

        manager.close().unwrap();
        assert_eq!(storage.load().unwrap().len(), 1);
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["saved:1", "added:lexicon", "reviewed:lexicon:good"]
        );
    }

    #[test]
    fn test_reload_drops_staged_events() {
        let mut config = AppConfig::default();
        config.auto_save = false;
        let (mut manager, storage) = create_manager_with(config);
        let seen = record_events(&mut manager);

        let word = manager.add("lexicon", WordPatch::default()).unwrap();
        manager.add_note(word.id, "seen in a paper", Vec::<String>::new()).unwrap();
        manager.reload().unwrap();
        assert!(manager.is_empty());
        assert!(!manager.is_dirty());

        manager.add("syntax", WordPatch::default()).unwrap();
        manager.flush().unwrap();
        assert_eq!(storage.save_count(), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["saved:1", "added:syntax"]);

        // Nothing staged, nothing delivered again
        manager.flush().unwrap();
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_observers_only_see_committed_changes() {
        let (mut manager, storage) = create_manager();
        let seen = record_events(&mut manager);

        let word = manager.add("lexicon", WordPatch::default()).unwrap();
        storage.fail_next_saves(1);
        assert!(manager.apply_review(word.id, Grade::Good, t0()).is_err());
        manager.apply_review(word.id, Grade::Good, t0()).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec!["saved:1", "added:lexicon", "saved:1", "reviewed:lexicon:good"]
        );
    }

    #[test]
    fn test_storage_timeout() {
        let mut config = AppConfig::default();
        config.storage_timeout_ms = Some(20);
        let (mut manager, storage) = create_manager_with(config);
        let word = manager.add("lexicon", WordPatch::default()).unwrap();

        let saves = storage.save_count();

        storage.set_latency(Some(std::time::Duration::from_millis(200)));
        let err = manager.apply_review(word.id, Grade::Good, t0()).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(manager.get(word.id).unwrap().status, WordStatus::New);

        // Once the slow write has had time to finish, storage still agrees
        // with memory
        std::thread::sleep(std::time::Duration::from_millis(500));
        storage.set_latency(None);
        assert_eq!(storage.save_count(), saves);
        let stored = storage.load().unwrap();
        assert_eq!(stored[&word.id].status, WordStatus::New);
        assert_eq!(stored[&word.id].learning_data.repetitions, 0);

        // A fast write still goes through
        manager.apply_review(word.id, Grade::Good, t0()).unwrap();
        assert_eq!(storage.save_count(), saves + 1);
    }

    #[test]
    fn test_removing_loaded_duplicate_keeps_text_taken() {
        let storage = Arc::new(MemoryStorage::new());
        let mut words = WordMap::new();
        for text in ["lexicon", "Lexicon", "LEXICON"] {
            let word = Word::new(text, t0()).unwrap();
            words.insert(word.id, word);
        }
        storage.save(&words).unwrap();
        let mut manager = VocabularyManager::load(storage, AppConfig::default()).unwrap();
        assert_eq!(manager.len(), 3);

        let indexed = manager.find_by_text("lexicon").unwrap().id;

        // Copies the index does not point at can still be edited
        let other = manager.words().find(|w| w.id != indexed).unwrap().id;
        let tagged = WordPatch {
            add_tags: vec!["duplicate".to_string()],
            ..Default::default()
        };
        assert!(manager.update_metadata(other, &tagged).unwrap().tags.contains("duplicate"));

        manager.remove(indexed).unwrap();
        let next = manager.find_by_text("lexicon").unwrap().id;
        assert_ne!(next, indexed);
        assert!(matches!(
            manager.add("lexicon", WordPatch::default()),
            Err(VocabError::DuplicateWord(_))
        ));

        // Renaming away the indexed copy hands the text to the last one
        let patch = WordPatch {
            text: Some("glossary".to_string()),
            ..Default::default()
        };
        manager.update_metadata(next, &patch).unwrap();
        let last = manager.find_by_text("lexicon").unwrap().id;
        assert_ne!(last, next);
        assert!(manager.add("lexicon", WordPatch::default()).is_err());

        manager.remove(last).unwrap();
        assert!(manager.find_by_text("lexicon").is_none());
        manager.add("lexicon", WordPatch::default()).unwrap();
    }

    #[test]
    fn test_load_failures() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_raw_document("{\"version\": 7}");
        let err = VocabularyManager::load(storage.clone(), AppConfig::default()).err().unwrap();
        assert!(matches!(err, VocabError::Storage(StorageError::Corrupt(_))));
        assert!(!err.is_retryable());

        let storage = Arc::new(MemoryStorage::new());
        storage.set_unavailable(true);
        let err = VocabularyManager::load(storage, AppConfig::default()).err().unwrap();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_load_clamps_ease() {
        let storage = Arc::new(MemoryStorage::new());
        let mut word = Word::new("lexicon", t0()).unwrap();
        word.learning_data.ease_factor = 7.5;
        let mut words = WordMap::new();
        words.insert(word.id, word.clone());
        storage.save(&words).unwrap();

        let manager = VocabularyManager::load(storage, AppConfig::default()).unwrap();
        assert_eq!(manager.get(word.id).unwrap().learning_data.ease_factor, 3.0);
    }

    #[test]
    fn test_backup_failure_does_not_affect_mutations() {
        let (mut manager, _storage) = create_manager();
        // Nothing saved yet, so the backup has nothing to copy
        assert!(manager.backup().is_err());
        assert!(manager.spawn_backup().join().unwrap().is_err());

        manager.add("lexicon", WordPatch::default()).unwrap();
        let info = manager.spawn_backup().join().unwrap().unwrap();
        assert_eq!(info.word_count, 1);
        manager.add("syntax", WordPatch::default()).unwrap();
    }

    #[test]
    fn test_search_ranking() {
        let (mut manager, _storage) = create_manager();
        manager.add("lex", WordPatch::default()).unwrap();
        manager.add("lexicon", WordPatch::default()).unwrap();
        manager
            .add(
                "glossary",
                WordPatch {
                    primary_definition: Some("a list of lex items".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        manager.add("syntax", WordPatch::default()).unwrap();

        let results: Vec<_> = manager.search("LEX", None).into_iter().map(|w| w.text.as_str()).collect();
        assert_eq!(results, vec!["lex", "lexicon", "glossary"]);
        assert_eq!(manager.search("lex", Some(1)).len(), 1);
        assert!(manager.search("  ", None).is_empty());
    }

    #[test]
    fn test_tags_and_listing() {
        let (mut manager, _storage) = create_manager();
        for (text, tag) in [("charlie", "b"), ("alpha", "a"), ("bravo", "a")] {
            manager
                .add(
                    text,
                    WordPatch {
                        tags: Some(vec![tag.to_string()]),
                        ..Default::default()
                    },
                )
                .unwrap();
        }

        assert_eq!(manager.words_by_tag("#a").len(), 2);
        let tags = manager.all_tags();
        assert_eq!(tags.get("a"), Some(&2));
        assert_eq!(tags.get("b"), Some(&1));

        let page = manager.list_words(SortOrder::Alphabetical, false, 1, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.total_count, 3);
        let texts: Vec<_> = page.words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["alpha", "bravo"]);

        let page = manager.list_words(SortOrder::Alphabetical, true, 2, 2);
        assert_eq!(page.words[0].text, "alpha");
    }

    #[test]
    fn test_statistics() {
        let (mut manager, _storage) = create_manager();
        let a = manager.add("alpha", WordPatch::default()).unwrap();
        manager.add("beta", WordPatch::default()).unwrap();
        manager.apply_review(a.id, Grade::Good, t0()).unwrap();
        manager.add_note(a.id, "note", Vec::<String>::new()).unwrap();

        let stats = manager.statistics(t0() + ChronoDuration::days(5));
        assert_eq!(stats.total_words, 2);
        assert_eq!(stats.by_status[&WordStatus::New], 1);
        assert_eq!(stats.by_status[&WordStatus::Learning], 1);
        assert_eq!(stats.by_status[&WordStatus::Mastered], 0);
        assert_eq!(stats.due_now, 1);
        assert_eq!(stats.notes_count, 1);
        assert_eq!(stats.total_reviews, 1);
        assert_eq!(stats.accuracy, Some(1.0));
        assert_eq!(stats.last_reviewed, Some(t0()));
    }

    #[test]
    fn test_reload() {
        let (mut manager, storage) = create_manager();
        manager.add("lexicon", WordPatch::default()).unwrap();
        storage.save(&WordMap::new()).unwrap();

        manager.reload().unwrap();
        assert!(manager.is_empty());
    }
}
