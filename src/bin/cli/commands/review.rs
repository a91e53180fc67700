use anyhow::{Context, Result};
use chrono::Utc;

use crate::app::App;
use crate::render::terminal;
use crate::OutputFormat;

pub fn run(app: &mut App, query: &str, grade: &str, format: &OutputFormat, use_color: bool) -> Result<()> {
    let word = app.find_word(query)?;
    let before = word.status;
    let now = Utc::now();

    let word = app
        .manager
        .apply_review_rating(word.id, grade, now)
        .with_context(|| format!("Failed to record review of '{}'", word.text))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&word)?);
        }
        OutputFormat::Plain => {
            let status = if before == word.status {
                terminal::status_label(word.status, 0, use_color)
            } else {
                format!(
                    "{} -> {}",
                    terminal::status_label(before, 0, use_color),
                    terminal::status_label(word.status, 0, use_color)
                )
            };
            println!("{}: {}", word.text, status);
            println!("Next review: {}", terminal::describe_due(&word, now));
        }
    }

    Ok(())
}
