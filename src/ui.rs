//! Terminal output helpers
//!
//! Styled output on an interactive terminal, bracketed plain tags when
//! piped or running under CI.

use console::style;
use std::io::IsTerminal;

/// Decides between styled and plain output
#[derive(Debug, Clone, Copy)]
pub struct UiContext {
    fancy: bool,
}

impl UiContext {
    /// Detect the current environment
    pub fn detect() -> Self {
        let ci = ["CI", "GITHUB_ACTIONS", "GITLAB_CI", "BUILDKITE"]
            .iter()
            .any(|var| std::env::var_os(var).is_some());
        Self {
            fancy: std::io::stdout().is_terminal() && !ci,
        }
    }

    /// Plain output regardless of terminal (tests, `--json` callers)
    pub fn non_interactive() -> Self {
        Self { fancy: false }
    }

    pub fn use_fancy_output(&self) -> bool {
        self.fancy
    }
}

/// Display a section header
pub fn section(ctx: &UiContext, title: &str) {
    println!();
    if ctx.use_fancy_output() {
        println!("{}", style(title).bold().cyan());
    } else {
        println!("{}", title);
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        println!("  {} {}", style("✓").green(), message);
    } else {
        println!("  [OK] {}", message);
    }
}

pub fn step_warn(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        println!("  {} {}", style("!").yellow(), message);
    } else {
        println!("  [WARN] {}", message);
    }
}

pub fn step_info(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        println!("  {} {}", style("•").cyan(), message);
    } else {
        println!("  [INFO] {}", message);
    }
}

/// Display a dimmed remark
pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        println!("    {}", style(message).dim());
    } else {
        println!("    {}", message);
    }
}

/// Print a key-value pair
pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// Announce a published track
pub fn now_playing(ctx: &UiContext, headline: &str, track: &str, duration: &str) {
    if ctx.use_fancy_output() {
        println!(
            "{} {}  {} {}",
            style("▶").green().bold(),
            style(headline).bold(),
            track,
            style(format!("({})", duration)).dim()
        );
    } else {
        println!("[PLAY] {}: {} ({})", headline, track, duration);
    }
}

/// Print an error and optional hint to stderr
pub fn error(message: &str, hint: Option<&str>) {
    eprintln!("{} {}", style("Error:").red().bold(), message);
    if let Some(hint) = hint {
        eprintln!("{} {}", style("Hint:").yellow(), hint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_output_does_not_panic() {
        let ctx = UiContext::non_interactive();
        assert!(!ctx.use_fancy_output());
        section(&ctx, "Station");
        step_ok(&ctx, "ok");
        step_warn(&ctx, "warn");
        step_info(&ctx, "info");
        key_value(&ctx, "mode", "genre jazz");
        now_playing(&ctx, "Radio | Jazz", "Band - Song", "3:45");
    }
}
