use chrono::{DateTime, Utc};

use wordhoard_lib::vocab::algorithm::format_interval;
use wordhoard_lib::vocab::{Word, WordStatus};

/// ANSI color codes
#[allow(dead_code)]
pub struct Color;

#[allow(dead_code)]
impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const MAGENTA: &str = "\x1b[35m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
}

pub fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

pub fn status_color(status: WordStatus) -> &'static str {
    match status {
        WordStatus::New => Color::BLUE,
        WordStatus::Learning => Color::YELLOW,
        WordStatus::Reviewing => Color::CYAN,
        WordStatus::Mastered => Color::GREEN,
        WordStatus::Suspended => Color::GRAY,
    }
}

/// Status name padded to `width`, colored when enabled
pub fn status_label(status: WordStatus, width: usize, use_color: bool) -> String {
    let padded = format!("{:<width$}", status.as_str(), width = width);
    paint(&padded, status_color(status), use_color)
}

/// When the word is next due, relative to `now`
pub fn describe_due(word: &Word, now: DateTime<Utc>) -> String {
    match word.learning_data.next_review_at {
        _ if !word.is_active() => "-".to_string(),
        None => "-".to_string(),
        Some(at) if at <= now => "due".to_string(),
        Some(at) => {
            let days = (at - now).num_seconds() as f64 / 86_400.0;
            format!("in {}", format_interval(days))
        }
    }
}

/// Cut `text` to at most `width` characters, marking the cut
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}

pub fn join_tags<'a>(tags: impl IntoIterator<Item = &'a String>) -> String {
    tags.into_iter()
        .map(|t| format!("#{}", t))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render a table of words: text, status, due, tags
pub fn print_word_table(words: &[&Word], now: DateTime<Utc>, use_color: bool) {
    let text_w = words
        .iter()
        .map(|w| w.text.chars().count())
        .max()
        .unwrap_or(4)
        .clamp(4, 30);
    let status_w = 10;
    let due_w = 10;

    println!(
        "{:<text_w$} {:<status_w$} {:<due_w$} Tags",
        "Word",
        "Status",
        "Next",
        text_w = text_w,
        status_w = status_w,
        due_w = due_w
    );
    println!(
        "{} {} {} {}",
        "\u{2500}".repeat(text_w),
        "\u{2500}".repeat(status_w),
        "\u{2500}".repeat(due_w),
        "\u{2500}".repeat(20)
    );

    for word in words {
        println!(
            "{:<text_w$} {} {:<due_w$} {}",
            truncate(&word.text, text_w),
            status_label(word.status, status_w, use_color),
            describe_due(word, now),
            join_tags(&word.tags),
            text_w = text_w,
            due_w = due_w
        );
    }
}
