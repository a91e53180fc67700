use std::sync::{Arc, RwLock};

use super::error::{Result, VocabError};
use super::manager::VocabularyManager;
use crate::storage::StorageError;

/// A manager shared between threads.
///
/// Queries run under the read lock and may overlap; mutations take the write
/// lock and are serialized. The guard is dropped when the closure returns,
/// including on error.
#[derive(Clone)]
pub struct SharedVocabulary {
    inner: Arc<RwLock<VocabularyManager>>,
}

impl SharedVocabulary {
    pub fn new(manager: VocabularyManager) -> Self {
        Self {
            inner: Arc::new(RwLock::new(manager)),
        }
    }

    pub fn read<T>(&self, f: impl FnOnce(&VocabularyManager) -> T) -> Result<T> {
        let guard = self.inner.read().map_err(|_| poisoned())?;
        Ok(f(&guard))
    }

    pub fn write<T>(&self, f: impl FnOnce(&mut VocabularyManager) -> Result<T>) -> Result<T> {
        let mut guard = self.inner.write().map_err(|_| poisoned())?;
        f(&mut guard)
    }

    /// Take the manager back out, if this is the last handle.
    pub fn into_inner(self) -> Option<VocabularyManager> {
        Arc::try_unwrap(self.inner).ok()?.into_inner().ok()
    }
}

fn poisoned() -> VocabError {
    StorageError::Unavailable("vocabulary lock poisoned".to_string()).into()
}
