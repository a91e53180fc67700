use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use wordhoard_lib::config::AppConfig;
use wordhoard_lib::storage::JsonFileStorage;
use wordhoard_lib::vocab::{VocabularyManager, Word, WordId};

/// Shared application state for CLI commands
pub struct App {
    pub storage: Arc<JsonFileStorage>,
    pub manager: VocabularyManager,
}

/// Resolve the config and file backend without loading
/// the collection.
pub fn open_storage(data_dir: Option<&Path>, config_path: Option<&Path>) -> Result<(AppConfig, JsonFileStorage)> {
    let data_dir = match data_dir {
        Some(dir) => dir.to_path_buf(),
        None => AppConfig::default_data_dir().context("Failed to get data directory")?,
    };

    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::default_path(&data_dir));
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let storage = JsonFileStorage::new(config.data_path(&data_dir), config.backup_path(&data_dir))
        .with_backups(config.backup_enabled, config.backup_count);

    Ok((config, storage))
}

impl App {
    /// Initialize from the data directory and load the collection
    pub fn open(data_dir: Option<&Path>, config_path: Option<&Path>) -> Result<Self> {
        let (config, storage) = open_storage(data_dir, config_path)?;
        let storage = Arc::new(storage);

        let manager = VocabularyManager::load(storage.clone(), config).with_context(|| {
            format!("Failed to load vocabulary from {}", storage.data_file().display())
        })?;

        Ok(Self {
            storage,
            manager,
        })
    }

    /// Find a word by id, exact text, or unique text prefix
    pub fn find_word(&self, query: &str) -> Result<Word> {
        if let Ok(id) = query.parse::<WordId>() {
            if let Some(word) = self.manager.get(id) {
                return Ok(word.clone());
            }
        }

        if let Some(word) = self.manager.find_by_text(query) {
            return Ok(word.clone());
        }

        let query_lower = query.trim().to_lowercase();
        let matches: Vec<&Word> = self
            .manager
            .words()
            .filter(|w| w.text.to_lowercase().starts_with(&query_lower))
            .collect();

        match matches.len() {
            0 => bail!("No word matching '{}'", query),
            1 => Ok(matches[0].clone()),
            _ => bail!(
                "Ambiguous word '{}'. Matches:\n{}",
                query,
                matches
                    .iter()
                    .map(|w| format!("  - {}", w.text))
                    .collect::<Vec<_>>()
                    .join("\n")
            ),
        }
    }

    /// Write anything still staged and release the collection
    pub fn close(self) -> Result<()> {
        self.manager.close().context("Failed to save vocabulary")
    }
}
