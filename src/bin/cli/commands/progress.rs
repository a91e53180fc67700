use anyhow::{Context, Result};

use crate::app::App;
use crate::OutputFormat;

#[derive(Clone, Copy, Debug)]
pub enum Action {
    Suspend,
    Resume,
    Reset,
}

pub fn run(app: &mut App, query: &str, action: Action, format: &OutputFormat) -> Result<()> {
    let word = app.find_word(query)?;

    let updated = match action {
        Action::Suspend => app.manager.suspend(word.id),
        Action::Resume => app.manager.resume(word.id),
        Action::Reset => app.manager.reset_progress(word.id),
    }
    .with_context(|| format!("Failed to update '{}'", word.text))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
        OutputFormat::Plain => {
            let verb = match action {
                Action::Suspend => "Suspended",
                Action::Resume => "Resumed",
                Action::Reset => "Reset",
            };
            println!("{} {} (now {})", verb, updated.text, updated.status);
        }
    }

    Ok(())
}
