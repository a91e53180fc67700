//! Persistence for the vocabulary collection
//!
//! The manager only talks to [`VocabularyStorage`]. Two backends ship with
//! the crate:
//! - [`JsonFileStorage`]: a single versioned JSON document on disk with zip backups
//! - [`MemoryStorage`]: keeps the document in memory, with fault injection for tests

pub mod backup;
pub mod document;
mod json_storage;
mod memory;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::vocab::models::{Word, WordId};

pub use json_storage::JsonFileStorage;
pub use memory::MemoryStorage;

/// The full collection, keyed by word id.
pub type WordMap = BTreeMap<WordId, Word>;

#[derive(Error, Debug)]
pub enum StorageError {
    /// The medium could not be read or written. Retrying may succeed.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The persisted data is unreadable or has an unrecognized shape.
    #[error("Storage corrupt: {0}")]
    Corrupt(String),
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Unavailable(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Self::Unavailable(format!("IO error: {}", err))
        } else {
            Self::Corrupt(format!("JSON error: {}", err))
        }
    }
}

impl From<zip::result::ZipError> for StorageError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => Self::from(io),
            other => Self::Corrupt(format!("ZIP error: {}", other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Description of a backup produced by [`VocabularyStorage::backup`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupInfo {
    /// Where the backup lives (a file path, or a label for non-file backends)
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub word_count: usize,
}

const GATE_PENDING: u8 = 0;
const GATE_COMMITTING: u8 = 1;
const GATE_CANCELLED: u8 = 2;

/// Decides, once, whether a save may make its data visible.
///
/// The saving side calls [`CommitGate::begin_commit`] right before the step
/// that publishes the new document; the waiting side calls
/// [`CommitGate::cancel`] when it gives up. Exactly one of the two wins.
#[derive(Debug, Default)]
pub struct CommitGate {
    state: AtomicU8,
}

impl CommitGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the right to publish. False if the save was cancelled first.
    pub fn begin_commit(&self) -> bool {
        self.state
            .compare_exchange(GATE_PENDING, GATE_COMMITTING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Withdraw the save. False if it is already publishing.
    pub fn cancel(&self) -> bool {
        self.state
            .compare_exchange(GATE_PENDING, GATE_CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == GATE_CANCELLED
    }
}

pub(crate) fn cancelled_save() -> StorageError {
    StorageError::Unavailable("save cancelled before commit".to_string())
}

/// Persistence contract for the whole word collection.
///
/// Implementations must make `save` atomic from the caller's point of view:
/// when it returns an error, whatever was persisted before the call is still
/// loadable.
pub trait VocabularyStorage: Send + Sync {
    /// Load every word. A store that was never written is an empty collection.
    fn load(&self) -> Result<WordMap>;

    /// Replace the persisted collection with `words`.
    fn save(&self, words: &WordMap) -> Result<()>;

    /// Like `save`, but the new document is only published if `gate` can
    /// still be claimed at that point. A cancelled save leaves the previous
    /// document untouched and returns `Unavailable`.
    ///
    /// The default checks the gate before doing any work. Backends with a
    /// slow preparation step should override it and check as late as they
    /// can.
    fn save_guarded(&self, words: &WordMap, gate: &CommitGate) -> Result<()> {
        if !gate.begin_commit() {
            return Err(cancelled_save());
        }
        self.save(words)
    }

    /// Take a point-in-time copy of the persisted collection.
    fn backup(&self) -> Result<BackupInfo>;

    /// Short human-readable description used in log lines.
    fn describe(&self) -> String {
        "storage".to_string()
    }
}
