use anyhow::Result;
use chrono::Utc;

use wordhoard_lib::vocab::{SortOrder, Word, WordStatus};

use crate::app::App;
use crate::render::terminal;
use crate::OutputFormat;

pub struct Filter {
    pub status: Option<String>,
    pub tag: Option<String>,
}

#[allow(clippy::too_many_arguments)]
pub fn run(
    app: &App,
    sort: SortOrder,
    reverse: bool,
    filter: Filter,
    page: usize,
    page_size: usize,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let status: Option<WordStatus> = filter.status.as_deref().map(str::parse).transpose()?;
    let tag = filter.tag.as_deref().map(|t| t.trim_start_matches('#'));

    let listing = app.manager.list_words(sort, reverse, 1, usize::MAX);
    let matching: Vec<&Word> = listing
        .words
        .into_iter()
        .filter(|w| status.map_or(true, |s| w.status == s))
        .filter(|w| tag.map_or(true, |t| w.tags.contains(t)))
        .collect();

    let page_size = page_size.max(1);
    let page = page.max(1);
    let total = matching.len();
    let total_pages = total.div_ceil(page_size);
    let words: Vec<&Word> = matching
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "words": words,
                "page": page,
                "totalPages": total_pages,
                "totalCount": total,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if words.is_empty() {
                println!("No words found.");
                return Ok(());
            }

            terminal::print_word_table(&words, Utc::now(), use_color);
            println!("\nPage {} of {} ({} words)", page, total_pages, total);
        }
    }

    Ok(())
}
