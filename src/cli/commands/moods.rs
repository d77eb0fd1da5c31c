//! Moods command - list the configured mood table

use crate::config::Config;
use crate::error::TunecastResult;
use crate::ui::{self, UiContext};

/// Execute the moods command
pub async fn execute(config: &Config) -> TunecastResult<()> {
    let ctx = UiContext::detect();

    if config.library.moods.is_empty() {
        println!("No moods configured.");
        return Ok(());
    }

    ui::section(&ctx, "Moods");
    for (mood, genres) in &config.library.moods {
        let total: u32 = genres.iter().map(|g| g.weight).sum();
        let mix = genres
            .iter()
            .map(|g| format!("{} {}%", g.genre, percent(g.weight, total)))
            .collect::<Vec<_>>()
            .join(", ");
        ui::key_value(&ctx, mood, &mix);
    }
    Ok(())
}

fn percent(weight: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    ((u64::from(weight) * 100 + u64::from(total) / 2) / u64::from(total)) as u32
}
