//! Fetch command - download one track on demand

use super::{build_pipeline, ensure_provider_available, open_cache};
use crate::cli::args::{FetchArgs, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::error::{TunecastError, TunecastResult};
use crate::retrieval::validate_query;
use crate::scheduler::format_duration;
use crate::ui::{self, UiContext};

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> TunecastResult<()> {
    let query = validate_query(&args.query.join(" "), config.retrieval.max_query_chars)?;

    ConfigManager::ensure_state_dirs(config).await?;
    ensure_provider_available(config).await?;

    let cache = open_cache(config, !args.no_cache).await?;
    let pipeline = build_pipeline(config, cache);

    let ctx = UiContext::detect();
    if matches!(args.format, OutputFormat::Table) {
        ui::step_info(&ctx, &format!("Fetching '{}' via {}", query, pipeline.provider_name()));
    }

    let result = pipeline.download_with_retry(&query).await;
    let (Some(path), Some(track)) = (result.artifact_path(), result.track()) else {
        let reason = result
            .error()
            .map(|e| e.message.clone())
            .unwrap_or_else(|| format!("nothing downloaded for '{}'", query));
        return Err(TunecastError::DownloadFailed(reason));
    };

    match args.format {
        OutputFormat::Table => {
            ui::step_ok(&ctx, &track.display_name());
            ui::key_value(&ctx, "length", &format_duration(track.duration_seconds));
            ui::key_value(&ctx, "source", &track.source.to_string());
            if let Some(id) = &track.identifier {
                ui::key_value(&ctx, "id", id);
            }
            ui::key_value(&ctx, "file", &path.display().to_string());
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
    }
    Ok(())
}
