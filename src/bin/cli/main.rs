mod app;
mod commands;
mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use wordhoard_lib::vocab::{Difficulty, SortOrder};

#[derive(Parser)]
#[command(name = "wordhoard-cli", about = "Wordhoard vocabulary builder", version)]
struct Cli {
    /// Data directory (default: the platform's local data dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file (default: <data dir>/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Add a new word
    Add {
        word: String,
        /// Primary definition
        #[arg(long)]
        definition: Option<String>,
        /// Part of speech
        #[arg(long)]
        pos: Option<String>,
        #[arg(long)]
        pronunciation: Option<String>,
        /// Example sentence (repeatable)
        #[arg(long = "example")]
        examples: Vec<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        /// Where the word was found
        #[arg(long)]
        context: Option<String>,
    },

    /// Edit a word's text or metadata. Review progress is kept.
    Edit {
        /// Word text or id
        word: String,
        /// New spelling
        #[arg(long)]
        text: Option<String>,
        /// Primary definition
        #[arg(long)]
        definition: Option<String>,
        /// Part of speech
        #[arg(long)]
        pos: Option<String>,
        #[arg(long)]
        pronunciation: Option<String>,
        /// easy, medium, hard, very-hard (or 1-4)
        #[arg(long)]
        difficulty: Option<Difficulty>,
        /// Where the word was found
        #[arg(long)]
        context: Option<String>,
        #[arg(long)]
        etymology: Option<String>,
        /// Memory tip
        #[arg(long)]
        tip: Option<String>,
        #[arg(long)]
        source: Option<String>,
        /// Example sentence, replacing existing ones (repeatable)
        #[arg(long = "example")]
        examples: Vec<String>,
        /// Synonym, replacing existing ones (repeatable)
        #[arg(long = "synonym")]
        synonyms: Vec<String>,
        /// Antonym, replacing existing ones (repeatable)
        #[arg(long = "antonym")]
        antonyms: Vec<String>,
        /// Tag to add (repeatable)
        #[arg(long = "add-tag")]
        add_tags: Vec<String>,
        /// Tag to remove (repeatable)
        #[arg(long = "remove-tag")]
        remove_tags: Vec<String>,
    },

    /// Show one word in full
    Show {
        /// Word text or id
        word: String,
    },

    /// List words
    List {
        /// alphabetical, added, reviewed, completeness, status, reviews
        #[arg(long, default_value = "alphabetical")]
        sort: SortOrder,
        #[arg(long)]
        reverse: bool,
        /// Only words with this status
        #[arg(long)]
        status: Option<String>,
        /// Only words with this tag
        #[arg(long)]
        tag: Option<String>,
        #[arg(long, default_value = "1")]
        page: usize,
        #[arg(long, default_value = "20")]
        page_size: usize,
    },

    /// List words due for review
    Due {
        /// Maximum words to show
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Record a review: again, hard, good, easy (or 1-4)
    Review {
        /// Word text or id
        word: String,
        grade: String,
    },

    /// Add a note to a word
    Note {
        /// Word text or id
        word: String,
        /// Note text (use "-" to read from stdin)
        content: String,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
    },

    /// Take a word out of the review cycle
    Suspend { word: String },

    /// Return a suspended word to reviews
    Resume { word: String },

    /// Forget review progress for a word
    Reset { word: String },

    /// Delete words
    Remove {
        /// Word texts or ids
        #[arg(required = true)]
        words: Vec<String>,
    },

    /// Search words, definitions, tags and notes
    Search {
        query: String,
        /// Maximum results (default from config)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List tags with counts
    Tags,

    /// Collection statistics
    Stats,

    /// Create a backup of the data file
    Backup {
        /// List existing backups instead
        #[arg(long)]
        list: bool,
    },

    /// Restore the data file from a backup (default: the newest)
    Restore { backup: Option<PathBuf> },
}

/// Read content from stdin when given as "-"
fn resolve_content(content: String) -> String {
    if content == "-" {
        let mut buf = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut buf).ok();
        buf
    } else {
        content
    }
}

fn split_tags(tags: Option<&str>) -> Vec<String> {
    tags.map(|t| {
        t.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && atty_check();
    let format = &cli.format;

    if let Command::Restore { backup } = &cli.command {
        return commands::backup::run_restore(
            cli.data_dir.as_deref(),
            cli.config.as_deref(),
            backup.as_deref(),
            format,
        );
    }

    let mut app = app::App::open(cli.data_dir.as_deref(), cli.config.as_deref())?;

    match cli.command {
        Command::Add { word, definition, pos, pronunciation, examples, tags, context } => {
            let metadata = commands::add::Metadata {
                definition,
                part_of_speech: pos,
                pronunciation,
                examples,
                tags: split_tags(tags.as_deref()),
                context,
            };
            commands::add::run(&mut app, &word, metadata, format, use_color)?;
        }
        Command::Edit {
            word,
            text,
            definition,
            pos,
            pronunciation,
            difficulty,
            context,
            etymology,
            tip,
            source,
            examples,
            synonyms,
            antonyms,
            add_tags,
            remove_tags,
        } => {
            let edits = commands::edit::Edits {
                text,
                definition,
                part_of_speech: pos,
                pronunciation,
                difficulty,
                context,
                etymology,
                memory_tip: tip,
                source,
                examples,
                synonyms,
                antonyms,
                add_tags,
                remove_tags,
            };
            commands::edit::run(&mut app, &word, edits, format, use_color)?;
        }
        Command::Show { word } => {
            commands::show::run(&app, &word, format, use_color)?;
        }
        Command::List { sort, reverse, status, tag, page, page_size } => {
            let filter = commands::list::Filter { status, tag };
            commands::list::run(&app, sort, reverse, filter, page, page_size, format, use_color)?;
        }
        Command::Due { limit } => {
            commands::due::run(&app, limit, format, use_color)?;
        }
        Command::Review { word, grade } => {
            commands::review::run(&mut app, &word, &grade, format, use_color)?;
        }
        Command::Note { word, content, tags } => {
            let content = resolve_content(content);
            commands::note::run(&mut app, &word, &content, &split_tags(tags.as_deref()), format)?;
        }
        Command::Suspend { word } => {
            commands::progress::run(&mut app, &word, commands::progress::Action::Suspend, format)?;
        }
        Command::Resume { word } => {
            commands::progress::run(&mut app, &word, commands::progress::Action::Resume, format)?;
        }
        Command::Reset { word } => {
            commands::progress::run(&mut app, &word, commands::progress::Action::Reset, format)?;
        }
        Command::Remove { words } => {
            commands::remove::run(&mut app, &words, format)?;
        }
        Command::Search { query, limit } => {
            commands::search::run(&app, &query, limit, format, use_color)?;
        }
        Command::Tags => {
            commands::tags::run(&app, format)?;
        }
        Command::Stats => {
            commands::stats::run(&app, format)?;
        }
        Command::Backup { list } => {
            if list {
                commands::backup::run_list(&app, format)?;
            } else {
                commands::backup::run_backup(&app, format)?;
            }
        }
        // Handled above, without loading the collection
        Command::Restore { .. } => {}
    }

    app.close()
}

/// Check if stdout is a terminal (for color support)
fn atty_check() -> bool {
    unsafe { libc_isatty(1) != 0 }
}

extern "C" {
    #[link_name = "isatty"]
    fn libc_isatty(fd: i32) -> i32;
}
