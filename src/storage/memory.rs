use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;

use super::document::CollectionDocument;
use super::{cancelled_save, BackupInfo, CommitGate, Result, StorageError, VocabularyStorage, WordMap};

#[derive(Default)]
struct MemoryState {
    /// Serialized document, exactly as a file backend would hold it
    document: Option<String>,
    backups: Vec<String>,
    failing_saves: usize,
    unavailable: bool,
    latency: Option<Duration>,
    save_count: usize,
}

/// Keeps the collection in memory.
///
/// Useful for tests and for embedders that persist elsewhere. The document
/// is serialized on every save so loads see the same validation as the file
/// backend, and failures can be injected to exercise error paths.
#[derive(Default)]
pub struct MemoryStorage {
    state: Mutex<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage lock poisoned".to_string()))
    }

    /// Make the next `n` saves fail with `Unavailable`.
    pub fn fail_next_saves(&self, n: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_saves = n;
        }
    }

    /// Make every operation fail with `Unavailable` until switched off.
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.unavailable = unavailable;
        }
    }

    /// Delay every load and save by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut state) = self.state.lock() {
            state.latency = latency;
        }
    }

    /// Replace the stored document with arbitrary text.
    pub fn set_raw_document(&self, raw: impl Into<String>) {
        if let Ok(mut state) = self.state.lock() {
            state.document = Some(raw.into());
        }
    }

    pub fn raw_document(&self) -> Option<String> {
        self.state.lock().ok().and_then(|s| s.document.clone())
    }

    /// Number of successful saves so far
    pub fn save_count(&self) -> usize {
        self.state.lock().map(|s| s.save_count).unwrap_or(0)
    }

    pub fn backup_count(&self) -> usize {
        self.state.lock().map(|s| s.backups.len()).unwrap_or(0)
    }

    fn store(&self, words: &WordMap, gate: Option<&CommitGate>) -> Result<()> {
        self.wait();
        // Serialize before touching state, so a failure leaves the old document
        let raw = CollectionDocument::new(words.clone(), Utc::now()).to_json()?;

        let mut state = self.lock()?;
        if state.unavailable {
            return Err(StorageError::Unavailable("memory storage offline".to_string()));
        }
        if state.failing_saves > 0 {
            state.failing_saves -= 1;
            return Err(StorageError::Unavailable("simulated save failure".to_string()));
        }
        if gate.is_some_and(|g| !g.begin_commit()) {
            return Err(cancelled_save());
        }
        state.document = Some(raw);
        state.save_count += 1;
        Ok(())
    }

    fn wait(&self) {
        let latency = self.state.lock().ok().and_then(|s| s.latency);
        if let Some(latency) = latency {
            std::thread::sleep(latency);
        }
    }
}

impl VocabularyStorage for MemoryStorage {
    fn load(&self) -> Result<WordMap> {
        self.wait();
        let state = self.lock()?;
        if state.unavailable {
            return Err(StorageError::Unavailable("memory storage offline".to_string()));
        }
        match &state.document {
            Some(raw) => Ok(CollectionDocument::from_json(raw)?.words),
            None => Ok(WordMap::new()),
        }
    }

    fn save(&self, words: &WordMap) -> Result<()> {
        self.store(words, None)
    }

    fn save_guarded(&self, words: &WordMap, gate: &CommitGate) -> Result<()> {
        self.store(words, Some(gate))
    }

    fn backup(&self) -> Result<BackupInfo> {
        let mut state = self.lock()?;
        if state.unavailable {
            return Err(StorageError::Unavailable("memory storage offline".to_string()));
        }
        let raw = state
            .document
            .clone()
            .ok_or_else(|| StorageError::Unavailable("nothing to back up".to_string()))?;
        let word_count = CollectionDocument::from_json(&raw).map(|d| d.words.len()).unwrap_or(0);
        state.backups.push(raw);

        Ok(BackupInfo {
            location: format!("memory backup #{}", state.backups.len()),
            created_at: Utc::now(),
            word_count,
        })
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::models::Word;

    fn one_word() -> WordMap {
        let word = Word::new("lexicon", Utc::now()).unwrap();
        let mut words = WordMap::new();
        words.insert(word.id, word);
        words
    }

    #[test]
    fn test_round_trip() {
        let storage = MemoryStorage::new();
        assert!(storage.load().unwrap().is_empty());

        let words = one_word();
        storage.save(&words).unwrap();
        assert_eq!(storage.load().unwrap(), words);
        assert_eq!(storage.save_count(), 1);
    }

    #[test]
    fn test_failed_save_keeps_previous_document() {
        let storage = MemoryStorage::new();
        let words = one_word();
        storage.save(&words).unwrap();

        storage.fail_next_saves(1);
        assert!(storage.save(&WordMap::new()).is_err());
        assert_eq!(storage.load().unwrap(), words);

        // Only the next save was failing
        storage.save(&WordMap::new()).unwrap();
        assert!(storage.load().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_document() {
        let storage = MemoryStorage::new();
        storage.set_raw_document(r#"{"version": 99, "metadata": {}, "words": {}}"#);
        assert!(matches!(storage.load(), Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn test_unavailable() {
        let storage = MemoryStorage::new();
        storage.set_unavailable(true);
        assert!(matches!(storage.load(), Err(StorageError::Unavailable(_))));
        storage.set_unavailable(false);
        assert!(storage.load().is_ok());
    }

    #[test]
    fn test_cancelled_save_keeps_previous_document() {
        let storage = MemoryStorage::new();
        storage.save(&one_word()).unwrap();
        let before = storage.raw_document();

        let gate = CommitGate::new();
        assert!(gate.cancel());
        let err = storage.save_guarded(&WordMap::new(), &gate).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(storage.raw_document(), before);
        assert_eq!(storage.save_count(), 1);

        storage.save_guarded(&WordMap::new(), &CommitGate::new()).unwrap();
        assert!(storage.load().unwrap().is_empty());
    }

    #[test]
    fn test_backup_is_independent_copy() {
        let storage = MemoryStorage::new();
        assert!(storage.backup().is_err());

        storage.save(&one_word()).unwrap();
        let info = storage.backup().unwrap();
        assert_eq!(info.word_count, 1);

        storage.save(&WordMap::new()).unwrap();
        assert_eq!(storage.backup_count(), 1);
    }
}
