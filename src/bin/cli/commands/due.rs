use anyhow::Result;
use chrono::Utc;

use wordhoard_lib::vocab::Word;

use crate::app::App;
use crate::render::terminal;
use crate::OutputFormat;

pub fn run(app: &App, limit: Option<usize>, format: &OutputFormat, use_color: bool) -> Result<()> {
    let now = Utc::now();
    let due = app.manager.words_due_for_review(now);
    let total = due.len();
    let words: Vec<&Word> = due.take(limit.unwrap_or(usize::MAX)).collect();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&words)?);
        }
        OutputFormat::Plain => {
            if words.is_empty() {
                match app.manager.next_review_at() {
                    Some(at) => println!(
                        "Nothing due. Next review {}.",
                        at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
                    ),
                    None => println!("Nothing due."),
                }
                return Ok(());
            }

            terminal::print_word_table(&words, now, use_color);
            println!("\n{} words due", total);
        }
    }

    Ok(())
}
