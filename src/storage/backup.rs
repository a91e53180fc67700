//! Zip backups of the collection file
//!
//! Each backup is `<stem>.backup.<YYYYmmdd_HHMMSS_mmm>.zip` holding the data
//! file as it was at backup time plus `_backup_metadata.json`. The timestamp
//! format sorts lexicographically, so name order is age order.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::document::CollectionDocument;
use super::{BackupInfo, Result, StorageError};

const METADATA_ENTRY: &str = "_backup_metadata.json";

/// Backup metadata stored in the ZIP file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMetadata {
    pub version: String,
    pub created_at: DateTime<Utc>,
    /// File name of the data file inside the archive
    pub data_file: String,
    pub word_count: usize,
}

fn file_stem(data_file: &Path) -> String {
    data_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "vocabulary".to_string())
}

fn file_name(data_file: &Path) -> String {
    data_file
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "vocabulary.json".to_string())
}

pub fn backup_file_name(data_file: &Path, at: DateTime<Utc>) -> String {
    format!(
        "{}.backup.{}.zip",
        file_stem(data_file),
        at.format("%Y%m%d_%H%M%S_%3f")
    )
}

/// Copy the current data file into a new zip archive in `backup_dir`.
pub fn create_backup(data_file: &Path, backup_dir: &Path, at: DateTime<Utc>) -> Result<BackupInfo> {
    if !data_file.exists() {
        return Err(StorageError::Unavailable(format!(
            "nothing to back up: {:?} does not exist",
            data_file
        )));
    }

    let content = fs::read_to_string(data_file)?;
    let word_count = match CollectionDocument::from_json(&content) {
        Ok(document) => document.words.len(),
        Err(e) => {
            log::warn!("Backup: live data does not validate ({}), archiving it anyway", e);
            0
        }
    };

    fs::create_dir_all(backup_dir)?;
    let output_path = backup_dir.join(backup_file_name(data_file, at));
    let tmp_path = output_path.with_extension("zip.tmp");

    let metadata = BackupMetadata {
        version: "1.0".to_string(),
        created_at: at,
        data_file: file_name(data_file),
        word_count,
    };

    let written = write_archive(&tmp_path, &metadata, &content);
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    fs::rename(&tmp_path, &output_path)?;

    log::info!("Backup written to {:?} ({} words)", output_path, word_count);

    Ok(BackupInfo {
        location: output_path.to_string_lossy().into_owned(),
        created_at: at,
        word_count,
    })
}

fn write_archive(path: &Path, metadata: &BackupMetadata, content: &str) -> Result<()> {
    let file = File::create(path)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(metadata.data_file.as_str(), options)?;
    zip.write_all(content.as_bytes())?;

    let metadata_json = serde_json::to_string_pretty(metadata)?;
    zip.start_file(METADATA_ENTRY, options)?;
    zip.write_all(metadata_json.as_bytes())?;

    let file = zip.finish()?;
    file.sync_all()?;
    Ok(())
}

/// List backups of `data_file` in `backup_dir`, newest first
pub fn list_backups(data_file: &Path, backup_dir: &Path) -> Result<Vec<PathBuf>> {
    if !backup_dir.exists() {
        return Ok(Vec::new());
    }

    let prefix = format!("{}.backup.", file_stem(data_file));
    let mut backups = Vec::new();
    for entry in fs::read_dir(backup_dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if path.is_file() && name.starts_with(&prefix) && name.ends_with(".zip") {
            backups.push(path);
        }
    }

    backups.sort();
    backups.reverse();
    Ok(backups)
}

/// Delete all but the newest `keep` backups. Returns how many were removed.
pub fn prune_backups(data_file: &Path, backup_dir: &Path, keep: usize) -> Result<usize> {
    let backups = list_backups(data_file, backup_dir)?;
    let mut removed = 0;
    for old in backups.iter().skip(keep) {
        fs::remove_file(old)?;
        log::debug!("Removed old backup {:?}", old);
        removed += 1;
    }
    Ok(removed)
}

/// Read the archived document and its metadata from a backup
pub fn read_backup(path: &Path) -> Result<(CollectionDocument, BackupMetadata)> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;

    let metadata: BackupMetadata = {
        let index = archive
            .index_for_name(METADATA_ENTRY)
            .ok_or_else(|| StorageError::Corrupt(format!("{:?} has no backup metadata", path)))?;
        let mut entry = archive.by_index(index)?;
        let mut contents = String::new();
        entry.read_to_string(&mut contents)?;
        serde_json::from_str(&contents)?
    };

    let index = archive.index_for_name(&metadata.data_file).ok_or_else(|| {
        StorageError::Corrupt(format!("{:?} does not contain {}", path, metadata.data_file))
    })?;
    let mut entry = archive.by_index(index)?;
    let mut contents = String::new();
    entry.read_to_string(&mut contents)?;

    let document = CollectionDocument::from_json(&contents)?;
    Ok((document, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::WordMap;
    use crate::vocab::models::Word;
    use chrono::Duration;
    use tempfile::TempDir;

    fn t0() -> DateTime<Utc> {
        "2026-03-01T08:00:00Z".parse().unwrap()
    }

    fn write_collection(path: &Path, texts: &[&str]) -> WordMap {
        let mut words = WordMap::new();
        for text in texts {
            let word = Word::new(text, t0()).unwrap();
            words.insert(word.id, word);
        }
        let json = CollectionDocument::new(words.clone(), t0()).to_json().unwrap();
        fs::write(path, json).unwrap();
        words
    }

    #[test]
    fn test_backup_name_sorts_by_time() {
        let data = Path::new("/tmp/vocabulary.json");
        let a = backup_file_name(data, t0());
        let b = backup_file_name(data, t0() + Duration::milliseconds(5));
        assert_eq!(a, "vocabulary.backup.20260301_080000_000.zip");
        assert!(a < b);
    }

    #[test]
    fn test_create_and_read_backup() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("vocabulary.json");
        let words = write_collection(&data, &["lexicon", "syntax"]);

        let info = create_backup(&data, &temp.path().join("backups"), t0()).unwrap();
        assert_eq!(info.word_count, 2);

        let (document, metadata) = read_backup(Path::new(&info.location)).unwrap();
        assert_eq!(metadata.data_file, "vocabulary.json");
        assert_eq!(document.words, words);
    }

    #[test]
    fn test_backup_without_data_file() {
        let temp = TempDir::new().unwrap();
        let err = create_backup(&temp.path().join("missing.json"), temp.path(), t0()).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_prune_keeps_newest() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("vocabulary.json");
        let backups = temp.path().join("backups");
        write_collection(&data, &["lexicon"]);

        for i in 0..4 {
            create_backup(&data, &backups, t0() + Duration::seconds(i)).unwrap();
        }
        let removed = prune_backups(&data, &backups, 2).unwrap();
        assert_eq!(removed, 2);

        let remaining = list_backups(&data, &backups).unwrap();
        assert_eq!(remaining.len(), 2);
        let newest = remaining[0].file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(newest, backup_file_name(&data, t0() + Duration::seconds(3)));
    }
}
