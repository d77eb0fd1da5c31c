//! Search command - preview the tiered search for a query

use super::{build_pipeline, open_cache};
use crate::cli::args::{OutputFormat, SearchArgs};
use crate::config::Config;
use crate::error::TunecastResult;
use crate::model::TrackRef;
use crate::scheduler::format_duration;

/// Execute the search command
pub async fn execute(args: SearchArgs, config: &Config) -> TunecastResult<()> {
    let query = args.query.join(" ");
    let pipeline = build_pipeline(config, open_cache(config, false).await?);

    let tracks = pipeline
        .search(&query, args.limit.max(1), &pipeline.default_filters())
        .await;

    match args.format {
        OutputFormat::Table => print_table(&query, pipeline.provider_name(), &tracks),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&tracks)?),
    }
    Ok(())
}

fn print_table(query: &str, provider: &str, tracks: &[TrackRef]) {
    if tracks.is_empty() {
        println!("No results for '{}' from {}.", query, provider);
        return;
    }

    println!("{:<14} {:<6} {:<28} {}", "ID", "LENGTH", "ARTIST", "TITLE");
    println!("{}", "-".repeat(80));
    for track in tracks {
        println!(
            "{:<14} {:<6} {:<28} {}",
            track.identifier.as_deref().unwrap_or("-"),
            format_duration(track.duration_seconds),
            truncate(&track.artist, 28),
            track.title
        );
    }
    println!();
    println!("Total: {} result(s) from {}", tracks.len(), provider);
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("Кино", 28), "Кино");
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("abcdef", 4).chars().count(), 4);
    }
}
