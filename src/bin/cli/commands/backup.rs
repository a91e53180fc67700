use std::path::Path;

use anyhow::{Context, Result};

use wordhoard_lib::storage::backup::read_backup;

use crate::app::{self, App};
use crate::OutputFormat;

pub fn run_backup(app: &App, format: &OutputFormat) -> Result<()> {
    let info = app.manager.backup().context("Backup failed")?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "location": info.location,
                "createdAt": info.created_at,
                "wordCount": info.word_count,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("Backed up {} words to {}", info.word_count, info.location);
        }
    }

    Ok(())
}

pub fn run_list(app: &App, format: &OutputFormat) -> Result<()> {
    let backups = app.storage.list_backups().context("Failed to list backups")?;

    match format {
        OutputFormat::Json => {
            let output: Vec<String> = backups.iter().map(|p| p.display().to_string()).collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if backups.is_empty() {
                println!("No backups in {}", app.storage.backup_dir().display());
                return Ok(());
            }
            for path in &backups {
                match read_backup(path) {
                    Ok((_, metadata)) => println!(
                        "{}  {} words  {}",
                        metadata.created_at.format("%Y-%m-%d %H:%M:%S"),
                        metadata.word_count,
                        path.display()
                    ),
                    Err(e) => println!("{}  (unreadable: {})", path.display(), e),
                }
            }
        }
    }

    Ok(())
}

/// Restore without loading the live collection, so a corrupt data file can
/// be replaced. The live file is backed up first when backups are enabled.
pub fn run_restore(
    data_dir: Option<&Path>,
    config_path: Option<&Path>,
    backup: Option<&Path>,
    format: &OutputFormat,
) -> Result<()> {
    let (_, storage) = app::open_storage(data_dir, config_path)?;

    let backup = match backup {
        Some(path) => path.to_path_buf(),
        None => storage
            .list_backups()
            .context("Failed to list backups")?
            .into_iter()
            .next()
            .context("No backups to restore from")?,
    };

    let words = storage
        .restore_backup(&backup)
        .with_context(|| format!("Failed to restore {}", backup.display()))?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "backup": backup.display().to_string(),
                "wordCount": words.len(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("Restored {} words from {}", words.len(), backup.display());
        }
    }

    Ok(())
}
