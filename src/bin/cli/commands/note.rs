use anyhow::{Context, Result};

use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &mut App, query: &str, content: &str, tags: &[String], format: &OutputFormat) -> Result<()> {
    let word = app.find_word(query)?;
    let note = app
        .manager
        .add_note(word.id, content, tags)
        .with_context(|| format!("Failed to add note to '{}'", word.text))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&note)?);
        }
        OutputFormat::Plain => {
            println!("Added note to {} ({})", word.text, note.id);
        }
    }

    Ok(())
}
