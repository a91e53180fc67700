use anyhow::{bail, Context, Result};

use wordhoard_lib::vocab::{Difficulty, WordPatch};

use crate::app::App;
use crate::render::terminal::{self, Color};
use crate::OutputFormat;

/// Field changes given on the command line
#[derive(Debug, Default)]
pub struct Edits {
    pub text: Option<String>,
    pub definition: Option<String>,
    pub part_of_speech: Option<String>,
    pub pronunciation: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub context: Option<String>,
    pub etymology: Option<String>,
    pub memory_tip: Option<String>,
    pub source: Option<String>,
    /// Replaces all examples when non-empty
    pub examples: Vec<String>,
    pub synonyms: Vec<String>,
    pub antonyms: Vec<String>,
    pub add_tags: Vec<String>,
    pub remove_tags: Vec<String>,
}

fn non_empty(values: Vec<String>) -> Option<Vec<String>> {
    (!values.is_empty()).then_some(values)
}

impl From<Edits> for WordPatch {
    fn from(e: Edits) -> Self {
        WordPatch {
            text: e.text,
            primary_definition: e.definition,
            part_of_speech: e.part_of_speech,
            pronunciation: e.pronunciation,
            difficulty: e.difficulty,
            context: e.context,
            etymology: e.etymology,
            memory_tips: e.memory_tip,
            source: e.source,
            examples: non_empty(e.examples),
            synonyms: non_empty(e.synonyms),
            antonyms: non_empty(e.antonyms),
            add_tags: e.add_tags,
            remove_tags: e.remove_tags,
            ..Default::default()
        }
    }
}

pub fn run(app: &mut App, query: &str, edits: Edits, format: &OutputFormat, use_color: bool) -> Result<()> {
    let word = app.find_word(query)?;
    let patch = WordPatch::from(edits);
    if patch.is_empty() {
        bail!("Nothing to change for '{}'. See --help for the editable fields", word.text);
    }

    let updated = app
        .manager
        .update_metadata(word.id, &patch)
        .with_context(|| format!("Failed to edit '{}'", word.text))?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
        OutputFormat::Plain => {
            println!(
                "Updated {} ({:.0}% complete)",
                terminal::paint(&updated.text, Color::BOLD, use_color),
                updated.completeness * 100.0
            );
            if updated.text != word.text {
                println!("  Renamed from: {}", word.text);
            }
            if !updated.core.primary_definition.is_empty() {
                println!("  Definition: {}", updated.core.primary_definition);
            }
            if !updated.tags.is_empty() {
                println!("  Tags: {}", terminal::join_tags(&updated.tags));
            }
        }
    }

    Ok(())
}
