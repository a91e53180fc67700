use anyhow::Result;
use chrono::Utc;

use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &App, format: &OutputFormat) -> Result<()> {
    let stats = app.manager.statistics(Utc::now());

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        OutputFormat::Plain => {
            println!("Words:        {}", stats.total_words);
            for (status, count) in &stats.by_status {
                println!("  {:<11} {}", status.as_str(), count);
            }
            println!("Due now:      {}", stats.due_now);
            println!("Completeness: {:.0}%", stats.average_completeness * 100.0);
            println!("Notes:        {}", stats.notes_count);
            println!("Tags:         {}", stats.tag_count);
            match stats.accuracy {
                Some(accuracy) => println!(
                    "Reviews:      {} ({:.0}% correct)",
                    stats.total_reviews,
                    accuracy * 100.0
                ),
                None => println!("Reviews:      0"),
            }
            if let Some(at) = stats.last_reviewed {
                println!("Last review:  {}", at.format("%Y-%m-%d %H:%M"));
            }
            println!("Data file:    {}", app.storage.data_file().display());
        }
    }

    Ok(())
}
