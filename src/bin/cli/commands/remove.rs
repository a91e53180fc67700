use anyhow::{Context, Result};

use wordhoard_lib::vocab::Word;

use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &mut App, queries: &[String], format: &OutputFormat) -> Result<()> {
    let words = queries
        .iter()
        .map(|q| app.find_word(q))
        .collect::<Result<Vec<Word>>>()?;
    let ids: Vec<_> = words.iter().map(|w| w.id).collect();

    app.manager
        .remove_many(&ids)
        .context("Failed to remove words")?;

    match format {
        OutputFormat::Json => {
            let output: Vec<serde_json::Value> = words
                .iter()
                .map(|w| serde_json::json!({ "id": w.id, "text": w.text }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            for word in &words {
                println!("Removed {}", word.text);
            }
        }
    }

    Ok(())
}
