use anyhow::Result;

use crate::app::App;
use crate::render::terminal::{self, Color};
use crate::OutputFormat;

pub fn run(app: &App, query: &str, limit: Option<usize>, format: &OutputFormat, use_color: bool) -> Result<()> {
    let results = app.manager.search(query, limit);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        OutputFormat::Plain => {
            if results.is_empty() {
                println!("No results found for '{}'.", query);
                return Ok(());
            }

            let text_w = results
                .iter()
                .map(|w| w.text.chars().count())
                .max()
                .unwrap_or(4)
                .clamp(4, 30);
            let def_w = 50;

            println!("{:<text_w$} {:<def_w$} Status", "Word", "Definition", text_w = text_w, def_w = def_w);
            println!(
                "{} {} {}",
                "\u{2500}".repeat(text_w),
                "\u{2500}".repeat(def_w),
                "\u{2500}".repeat(10)
            );

            for word in &results {
                let definition = terminal::truncate(&word.core.primary_definition, def_w);
                println!(
                    "{:<text_w$} {:<def_w$} {}",
                    terminal::truncate(&word.text, text_w),
                    definition,
                    terminal::status_label(word.status, 0, use_color),
                    text_w = text_w,
                    def_w = def_w
                );
            }

            println!("\n{}", terminal::paint(&format!("{} results", results.len()), Color::DIM, use_color));
        }
    }

    Ok(())
}
