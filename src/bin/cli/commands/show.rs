use anyhow::Result;
use chrono::Utc;

use wordhoard_lib::vocab::algorithm::{format_interval, Grade};
use wordhoard_lib::vocab::WordStatus;

use crate::app::App;
use crate::render::terminal::{self, Color};
use crate::OutputFormat;

pub fn run(app: &App, query: &str, format: &OutputFormat, use_color: bool) -> Result<()> {
    let word = app.find_word(query)?;
    let now = Utc::now();

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&word)?);
        return Ok(());
    }

    // Header
    let mut header = terminal::paint(&word.text, Color::BOLD, use_color);
    if !word.core.pronunciation.is_empty() {
        header.push_str(&format!(" /{}/", word.core.pronunciation));
    }
    if !word.core.part_of_speech.is_empty() {
        header.push_str(&format!(" ({})", word.core.part_of_speech));
    }
    println!("{}", header);

    if !word.tags.is_empty() {
        println!("{}", terminal::paint(&terminal::join_tags(&word.tags), Color::DIM, use_color));
    }

    if !word.core.primary_definition.is_empty() {
        println!("\n{}", word.core.primary_definition);
    }
    for (i, definition) in word.extended.definitions.iter().enumerate() {
        println!("  {}. {}", i + 1, definition);
    }

    if !word.extended.examples.is_empty() {
        println!("\nExamples:");
        for example in &word.extended.examples {
            println!("  - {}", example);
        }
    }
    if !word.extended.synonyms.is_empty() {
        println!("\nSynonyms: {}", word.extended.synonyms.join(", "));
    }
    if !word.extended.antonyms.is_empty() {
        println!("Antonyms: {}", word.extended.antonyms.join(", "));
    }
    if !word.extended.etymology.is_empty() {
        println!("\nEtymology: {}", word.extended.etymology);
    }
    if !word.extended.memory_tips.is_empty() {
        println!("Memory tip: {}", word.extended.memory_tips);
    }
    if !word.context.is_empty() {
        println!("\nContext: {}", word.context);
    }

    if !word.notes.is_empty() {
        println!("\nNotes:");
        for note in &word.notes {
            let tags = if note.tags.is_empty() {
                String::new()
            } else {
                format!(" {}", terminal::join_tags(&note.tags))
            };
            println!(
                "  [{}] {}{}",
                note.created_at.format("%Y-%m-%d"),
                note.content,
                terminal::paint(&tags, Color::DIM, use_color)
            );
        }
    }

    // Learning progress
    let data = &word.learning_data;
    println!();
    println!(
        "Status: {}  Next: {}  Completeness: {:.0}%",
        terminal::status_label(word.status, 0, use_color),
        terminal::describe_due(&word, now),
        word.completeness * 100.0
    );
    println!(
        "Reviews: {} ({} correct)  Ease: {:.2}  Interval: {}",
        data.review_count,
        data.correct_count,
        data.ease_factor,
        format_interval(data.interval_days)
    );

    if let Ok(intervals) = app.manager.preview_intervals(word.id, now) {
        if word.status != WordStatus::Suspended {
            let preview = Grade::ALL
                .iter()
                .zip(intervals)
                .map(|(grade, days)| format!("{} {}", grade, format_interval(days)))
                .collect::<Vec<_>>()
                .join("  ");
            println!("{}", terminal::paint(&preview, Color::GRAY, use_color));
        }
    }
    println!("Added {} from {}", word.added_at.format("%Y-%m-%d"), word.source);

    Ok(())
}
