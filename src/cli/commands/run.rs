//! Run command - drive one station from the terminal

use super::{build_pipeline, ensure_provider_available, open_cache};
use crate::cli::args::RunArgs;
use crate::cli::operator::OperatorCommand;
use crate::config::{Config, ConfigManager};
use crate::error::{TunecastError, TunecastResult};
use crate::mode::ModeController;
use crate::scheduler::{format_duration, ConsolePresenter, PlaybackScheduler, StationStatus};
use crate::ui::{self, UiContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Execute the run command
pub async fn execute(args: RunArgs, config: &Config) -> TunecastResult<()> {
    let ctx = UiContext::detect();
    ConfigManager::ensure_state_dirs(config).await?;

    let cache = open_cache(config, !args.no_cache).await?;
    let pipeline = Arc::new(build_pipeline(config, cache.clone()));
    debug!(provider = pipeline.provider_name(), "Using provider");

    let scheduler = PlaybackScheduler::new(
        pipeline,
        Arc::new(ConsolePresenter::new(ctx)),
        ModeController::new(&config.library),
        config.scheduler.clone(),
        config.voting.clone(),
    );

    if let Some(genre) = &args.genre {
        scheduler.set_genre(genre).await?;
    } else if let Some(mood) = &args.mood {
        scheduler.set_mood(mood).await?;
    } else if let Some(artist) = &args.artist {
        scheduler.set_artist(artist).await?;
    }

    ensure_provider_available(config).await?;

    scheduler.start(&args.channel).await?;

    let sweeper_token = CancellationToken::new();
    let sweeper = (config.cache.sweep_interval_secs > 0).then(|| {
        cache.spawn_sweeper(
            Duration::from_secs(config.cache.sweep_interval_secs),
            sweeper_token.clone(),
        )
    });

    ui::section(&ctx, &format!("Station {}", args.channel));
    ui::remark(&ctx, "Type 'help' for commands, 'stop' or Ctrl-C to quit");

    let outcome = operate(&scheduler, &ctx).await;

    let status = scheduler.status().await;
    if let Err(e) = scheduler.stop().await {
        debug!(error = %e, "Stop after loop end");
    }
    sweeper_token.cancel();
    if let Some(sweeper) = sweeper {
        if let Err(e) = sweeper.await {
            warn!(error = %e, "Cache sweeper ended abnormally");
        }
    }

    outcome?;
    if status.consecutive_failures >= status.error_budget {
        return Err(TunecastError::ErrorBudgetExhausted(status.consecutive_failures));
    }
    Ok(())
}

/// Feed stdin lines to the scheduler until stop, Ctrl-C or the loop ends
async fn operate(scheduler: &PlaybackScheduler, ctx: &UiContext) -> TunecastResult<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = scheduler.finished() => return Ok(()),
            _ = tokio::signal::ctrl_c() => {
                ui::step_info(ctx, "Interrupted");
                return Ok(());
            }
            line = lines.next_line(), if stdin_open => {
                let line = line.map_err(|e| TunecastError::io("reading operator input", e))?;
                let Some(line) = line else {
                    debug!("Operator input closed");
                    stdin_open = false;
                    continue;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<OperatorCommand>() {
                    Ok(OperatorCommand::Stop) => return Ok(()),
                    Ok(command) => apply(scheduler, ctx, command).await,
                    Err(e) => ui::step_warn(ctx, &e.to_string()),
                }
            }
        }
    }
}

async fn apply(scheduler: &PlaybackScheduler, ctx: &UiContext, command: OperatorCommand) {
    let result = match command {
        OperatorCommand::Skip => {
            if !scheduler.skip().await {
                ui::step_warn(ctx, "Station is not running");
            }
            Ok(())
        }
        OperatorCommand::Genre(genre) => scheduler
            .set_genre(&genre)
            .await
            .map(|()| ui::step_ok(ctx, &format!("Genre set to {}", genre))),
        OperatorCommand::Mood(mood) => scheduler
            .set_mood(&mood)
            .await
            .map(|()| ui::step_ok(ctx, &format!("Mood set to {}", mood))),
        OperatorCommand::Artist(artist) => scheduler
            .set_artist(&artist)
            .await
            .map(|()| ui::step_ok(ctx, &format!("Playing {}", artist))),
        OperatorCommand::Vote { genre, voter } => {
            if scheduler.register_vote(&genre, voter).await {
                ui::step_ok(ctx, &format!("Vote for {} counted", genre));
            } else {
                ui::step_warn(ctx, &format!("'{}' is not on the ballot", genre));
            }
            Ok(())
        }
        OperatorCommand::Finish => scheduler
            .finish_vote()
            .await
            .map(|winner| ui::step_ok(ctx, &format!("Vote closed, {} wins", winner))),
        OperatorCommand::Force(genre) => scheduler
            .force_vote(&genre)
            .await
            .map(|()| ui::step_ok(ctx, &format!("Vote decided for {}", genre))),
        OperatorCommand::Status => {
            print_status(ctx, &scheduler.status().await);
            Ok(())
        }
        OperatorCommand::Help => {
            for line in OperatorCommand::USAGE {
                ui::remark(ctx, line);
            }
            Ok(())
        }
        OperatorCommand::Stop => Ok(()),
    };

    if let Err(e) = result {
        ui::step_warn(ctx, &e.to_string());
        if let Some(hint) = e.hint() {
            ui::remark(ctx, hint);
        }
    }
}

fn print_status(ctx: &UiContext, status: &StationStatus) {
    ui::section(ctx, "Status");
    ui::key_value(ctx, "running", if status.running { "yes" } else { "no" });
    if let Some(channel) = &status.channel {
        ui::key_value(ctx, "channel", channel);
    }
    match &status.mode {
        Some(mode) => ui::key_value(
            ctx,
            "mode",
            &format!(
                "{} {} (until {})",
                mode.kind,
                mode.value,
                mode.expires_at.format("%H:%M:%S")
            ),
        ),
        None => ui::key_value(ctx, "mode", "none"),
    }
    if let Some(track) = &status.now_playing {
        ui::key_value(
            ctx,
            "now playing",
            &format!(
                "{} ({})",
                track.display_name(),
                format_duration(track.duration_seconds)
            ),
        );
    }
    ui::key_value(
        ctx,
        "failures",
        &format!("{}/{}", status.consecutive_failures, status.error_budget),
    );
    if let Some(vote) = &status.vote {
        ui::key_value(
            ctx,
            "vote closes",
            &vote.deadline.format("%H:%M:%S").to_string(),
        );
        for (genre, ballots) in &vote.tally {
            ui::remark(ctx, &format!("{:<24} {}", genre, ballots));
        }
    }
}
