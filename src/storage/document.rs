//! The versioned on-disk representation of the collection
//!
//! ```json
//! {
//!   "version": 1,
//!   "metadata": { "savedAt": "...", "wordCount": 2 },
//!   "words": { "<id>": { ... }, "<id>": { ... } }
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Result, StorageError, WordMap};

/// Current document format version. Anything else is rejected on load.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub saved_at: DateTime<Utc>,
    pub word_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDocument {
    pub version: u32,
    pub metadata: DocumentMetadata,
    pub words: WordMap,
}

/// Only the version tag, so an unknown version is reported as such even when
/// the rest of the document no longer matches our schema.
#[derive(Deserialize)]
struct VersionHeader {
    version: Option<serde_json::Value>,
}

impl CollectionDocument {
    pub fn new(words: WordMap, saved_at: DateTime<Utc>) -> Self {
        Self {
            version: FORMAT_VERSION,
            metadata: DocumentMetadata {
                saved_at,
                word_count: words.len(),
            },
            words,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate a document.
    pub fn from_json(content: &str) -> Result<Self> {
        let header: VersionHeader = serde_json::from_str(content)?;
        match header.version {
            Some(serde_json::Value::Number(n)) if n.as_u64() == Some(FORMAT_VERSION as u64) => {}
            Some(other) => {
                return Err(StorageError::Corrupt(format!(
                    "unsupported format version {} (expected {})",
                    other, FORMAT_VERSION
                )))
            }
            None => return Err(StorageError::Corrupt("missing format version".to_string())),
        }

        let mut document: CollectionDocument = serde_json::from_str(content)?;
        document.validate()?;
        for word in document.words.values_mut() {
            word.refresh_completeness();
        }
        Ok(document)
    }

    fn validate(&self) -> Result<()> {
        if self.metadata.word_count != self.words.len() {
            return Err(StorageError::Corrupt(format!(
                "metadata says {} words but {} are present",
                self.metadata.word_count,
                self.words.len()
            )));
        }
        for (key, word) in &self.words {
            if *key != word.id {
                return Err(StorageError::Corrupt(format!(
                    "word keyed {} carries id {}",
                    key, word.id
                )));
            }
            if word.text.trim().is_empty() {
                return Err(StorageError::Corrupt(format!("word {} has empty text", key)));
            }
            if word.notes.iter().any(|n| n.content.trim().is_empty()) {
                return Err(StorageError::Corrupt(format!("word {} has an empty note", key)));
            }
        }
        Ok(())
    }
}
