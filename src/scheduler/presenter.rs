//! Audience-facing output
//!
//! The scheduler hands finished artifacts and status lines to a
//! `Presenter`; formatting, pinning and delivery belong to the
//! implementation.

use crate::error::TunecastResult;
use crate::mode::{ModeKind, ModeState};
use crate::model::{Source, TrackRef};
use crate::ui::{self, UiContext};
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;

/// What the station was doing when a track was published
#[derive(Debug, Clone, Serialize)]
pub struct CaptionContext {
    pub channel: String,
    pub mode: Option<ModeState>,
    pub source: Source,
}

impl CaptionContext {
    /// Short caption header, e.g. "Radio | Jazz" or "Radio | mood: chill"
    pub fn headline(&self) -> String {
        match &self.mode {
            Some(ModeState {
                kind: ModeKind::Genre,
                value,
                ..
            }) => format!("Radio | {}", capitalize(value)),
            Some(state) => format!("Radio | {}: {}", state.kind, state.value),
            None => "Radio".to_string(),
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Formats `m:ss`
pub fn format_duration(secs: u32) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[async_trait]
pub trait Presenter: Send + Sync {
    /// Deliver one track to the audience
    async fn publish(
        &self,
        artifact: &Path,
        track: &TrackRef,
        context: &CaptionContext,
    ) -> TunecastResult<()>;

    /// Deliver a status line
    async fn notify(&self, text: &str) -> TunecastResult<()>;
}

/// Prints to the terminal
pub struct ConsolePresenter {
    ctx: UiContext,
}

impl ConsolePresenter {
    pub fn new(ctx: UiContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Presenter for ConsolePresenter {
    async fn publish(
        &self,
        artifact: &Path,
        track: &TrackRef,
        context: &CaptionContext,
    ) -> TunecastResult<()> {
        ui::now_playing(
            &self.ctx,
            &context.headline(),
            &track.display_name(),
            &format_duration(track.duration_seconds),
        );
        ui::remark(&self.ctx, &artifact.display().to_string());
        Ok(())
    }

    async fn notify(&self, text: &str) -> TunecastResult<()> {
        ui::step_info(&self.ctx, text);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn context(kind: ModeKind, value: &str) -> CaptionContext {
        CaptionContext {
            channel: "test".to_string(),
            mode: Some(ModeState {
                kind,
                value: value.to_string(),
                expires_at: Utc::now(),
            }),
            source: Source::YouTube,
        }
    }

    #[test]
    fn headline_per_mode() {
        assert_eq!(context(ModeKind::Genre, "jazz").headline(), "Radio | Jazz");
        assert_eq!(context(ModeKind::Genre, "рок").headline(), "Radio | Рок");
        assert_eq!(context(ModeKind::Mood, "chill").headline(), "Radio | mood: chill");
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(225), "3:45");
        assert_eq!(format_duration(59), "0:59");
    }

    #[tokio::test]
    async fn console_presenter_never_fails() {
        let presenter = ConsolePresenter::new(UiContext::non_interactive());
        let track = TrackRef::new("Take Five", "Dave Brubeck", 324, Source::YouTube, None);
        presenter
            .publish(Path::new("/tmp/x.mp3"), &track, &context(ModeKind::Genre, "jazz"))
            .await
            .unwrap();
        presenter.notify("hello").await.unwrap();
    }
}
