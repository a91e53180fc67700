use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use super::backup::{self, list_backups, prune_backups, read_backup};
use super::document::CollectionDocument;
use super::{cancelled_save, BackupInfo, CommitGate, Result, StorageError, VocabularyStorage, WordMap};

/// Stores the whole collection as one versioned JSON document.
///
/// Saves write a sibling `.tmp` file, sync it and rename it over the live
/// file, so a failed save leaves the previous document in place.
pub struct JsonFileStorage {
    data_file: PathBuf,
    backup_dir: PathBuf,
    backup_enabled: bool,
    backup_count: usize,
}

impl JsonFileStorage {
    pub fn new(data_file: PathBuf, backup_dir: PathBuf) -> Self {
        Self {
            data_file,
            backup_dir,
            backup_enabled: true,
            backup_count: 5,
        }
    }

    pub fn with_backups(mut self, enabled: bool, count: usize) -> Self {
        self.backup_enabled = enabled;
        self.backup_count = count.max(1);
        self
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .data_file
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.data_file.with_file_name(name)
    }

    /// Backups of this data file, newest first
    pub fn list_backups(&self) -> Result<Vec<PathBuf>> {
        list_backups(&self.data_file, &self.backup_dir)
    }

    /// Replace the live data with the document stored in a backup archive.
    ///
    /// The archive is validated before anything on disk is touched. The live
    /// file is backed up first when backups are enabled; failing to do so is
    /// logged and does not stop the restore.
    pub fn restore_backup(&self, backup_path: &Path) -> Result<WordMap> {
        let (document, metadata) = read_backup(backup_path)?;

        if self.backup_enabled && self.data_file.exists() {
            match self.backup() {
                Ok(info) => log::info!("Saved current data to {} before restoring", info.location),
                Err(e) => log::warn!("Could not back up current data before restoring: {}", e),
            }
        }

        log::info!(
            "Restoring {} words from backup taken {}",
            metadata.word_count,
            metadata.created_at
        );
        self.save(&document.words)?;
        Ok(document.words)
    }

    fn write_document(&self, words: &WordMap, gate: Option<&CommitGate>) -> Result<()> {
        let document = CollectionDocument::new(words.clone(), Utc::now());
        let content = document.to_json()?;
        self.write_atomically(&content, gate)?;
        log::debug!("Saved {} words to {:?}", words.len(), self.data_file);
        Ok(())
    }

    /// Write `content` to the temp file, then rename it over the live file.
    /// With a gate, the rename only happens if the gate can be claimed.
    fn write_atomically(&self, content: &str, gate: Option<&CommitGate>) -> Result<()> {
        if let Some(parent) = self.data_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.tmp_path();
        let written = (|| -> std::io::Result<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
            Ok(())
        })();

        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        if gate.is_some_and(|g| !g.begin_commit()) {
            let _ = fs::remove_file(&tmp_path);
            return Err(cancelled_save());
        }

        if let Err(e) = fs::rename(&tmp_path, &self.data_file) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

impl VocabularyStorage for JsonFileStorage {
    fn load(&self) -> Result<WordMap> {
        let content = match fs::read_to_string(&self.data_file) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::info!("No data file at {:?}, starting with an empty collection", self.data_file);
                return Ok(WordMap::new());
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                return Err(StorageError::Corrupt(format!("{:?} is not valid UTF-8", self.data_file)));
            }
            Err(e) => return Err(e.into()),
        };

        let document = CollectionDocument::from_json(&content)?;
        log::info!(
            "Loaded {} words from {:?} (saved {})",
            document.words.len(),
            self.data_file,
            document.metadata.saved_at
        );
        Ok(document.words)
    }

    fn save(&self, words: &WordMap) -> Result<()> {
        self.write_document(words, None)
    }

    fn save_guarded(&self, words: &WordMap, gate: &CommitGate) -> Result<()> {
        self.write_document(words, Some(gate))
    }

    fn backup(&self) -> Result<BackupInfo> {
        if !self.backup_enabled {
            return Err(StorageError::Unavailable("backups are disabled".to_string()));
        }
        let info = backup::create_backup(&self.data_file, &self.backup_dir, Utc::now())?;
        if let Err(e) = prune_backups(&self.data_file, &self.backup_dir, self.backup_count) {
            log::warn!("Failed to prune old backups: {}", e);
        }
        Ok(info)
    }

    fn describe(&self) -> String {
        format!("json file {:?}", self.data_file)
    }
}
