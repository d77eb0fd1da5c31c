//! Cache command - inspect and prune the result cache

use super::open_cache;
use crate::cache::ResultCache;
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::error::TunecastResult;
use crate::ui::{self, UiContext};
use std::io::{self, Write};

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> TunecastResult<()> {
    let cache = open_cache(config, true).await?;

    match args.action {
        CacheAction::Stats { format } => show_stats(&cache, config, format).await,
        CacheAction::Sweep => sweep(&cache, config).await,
        CacheAction::Clear { yes } => clear(&cache, yes).await,
    }
}

async fn show_stats(
    cache: &ResultCache,
    config: &Config,
    format: OutputFormat,
) -> TunecastResult<()> {
    let entries = cache.entry_count().await;
    let dir = ConfigManager::cache_dir(config);

    match format {
        OutputFormat::Json => {
            let stats = serde_json::json!({
                "entries": entries,
                "ttl_days": config.cache.ttl_days,
                "dir": dir,
            });
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        OutputFormat::Table => {
            let ctx = UiContext::detect();
            ui::section(&ctx, "Result cache");
            ui::key_value(&ctx, "entries", &entries.to_string());
            ui::key_value(&ctx, "ttl", &format!("{} days", config.cache.ttl_days));
            ui::key_value(&ctx, "location", &dir.display().to_string());
        }
    }
    Ok(())
}

async fn sweep(cache: &ResultCache, config: &Config) -> TunecastResult<()> {
    let ctx = UiContext::detect();
    let removed = cache.sweep().await;
    ui::step_ok(
        &ctx,
        &format!(
            "Removed {} entr{} older than {} days",
            removed,
            if removed == 1 { "y" } else { "ies" },
            config.cache.ttl_days
        ),
    );
    Ok(())
}

async fn clear(cache: &ResultCache, skip_confirm: bool) -> TunecastResult<()> {
    let ctx = UiContext::detect();
    let entries = cache.entry_count().await;

    if entries == 0 {
        println!("Cache is already empty.");
        return Ok(());
    }

    if !skip_confirm {
        print!("Remove all {} cache entries? [y/N] ", entries);
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            println!("Failed to read input, aborting.");
            return Ok(());
        }

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let removed = cache.clear().await;
    ui::step_ok(&ctx, &format!("Cleared {} cache entries", removed));
    Ok(())
}
