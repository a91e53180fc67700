use anyhow::{Context, Result};

use wordhoard_lib::vocab::WordPatch;

use crate::app::App;
use crate::render::terminal::{self, Color};
use crate::OutputFormat;

/// Metadata given on the command line
pub struct Metadata {
    pub definition: Option<String>,
    pub part_of_speech: Option<String>,
    pub pronunciation: Option<String>,
    pub examples: Vec<String>,
    pub tags: Vec<String>,
    pub context: Option<String>,
}

impl From<Metadata> for WordPatch {
    fn from(m: Metadata) -> Self {
        WordPatch {
            primary_definition: m.definition,
            part_of_speech: m.part_of_speech,
            pronunciation: m.pronunciation,
            examples: (!m.examples.is_empty()).then_some(m.examples),
            add_tags: m.tags,
            context: m.context,
            ..Default::default()
        }
    }
}

pub fn run(
    app: &mut App,
    text: &str,
    metadata: Metadata,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let word = app
        .manager
        .add(text, metadata.into())
        .with_context(|| format!("Failed to add '{}'", text))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&word)?);
        }
        OutputFormat::Plain => {
            println!(
                "Added {} ({:.0}% complete)",
                terminal::paint(&word.text, Color::BOLD, use_color),
                word.completeness * 100.0
            );
            println!("  ID: {}", word.id);
            if !word.tags.is_empty() {
                println!("  Tags: {}", terminal::join_tags(&word.tags));
            }
        }
    }

    Ok(())
}
